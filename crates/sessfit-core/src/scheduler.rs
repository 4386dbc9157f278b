use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::analysis::{AnalysisContext, AnalysisRegistry};
use crate::config::PipelineConfig;
use crate::job::JobDescriptor;
use crate::logcap::JobLog;
use crate::tracker::{StatusTracker, TrackedJob};
use crate::types::JobStatus;
use crate::uploader::ResultUploader;
use crate::wrapper::execute_job;

/// Run-mode switches, mapped straight from the CLI flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// True: run jobs concurrently with single-threaded optimizers.
    /// False: run jobs one at a time, each with the full worker budget.
    pub parallel_on_jobs: bool,

    /// Truncate the batch to a handful of jobs for a quick smoke run.
    pub debug_mode: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Success => self.succeeded += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Drives a batch of jobs to completion.
///
/// Two-level parallelism with a single budget: either many jobs at once with
/// one optimizer thread each, or one job at a time with a multi-threaded
/// optimizer. The budget is never multiplied at both levels, so a run uses
/// at most `worker_budget` CPU-bound threads.
///
/// One bad job never stops the batch. Unhandled analysis errors are caught,
/// recorded as failed, and the remaining jobs keep going.
pub struct Scheduler {
    registry: Arc<AnalysisRegistry>,
    uploader: ResultUploader,
    tracker: StatusTracker,
    config: PipelineConfig,
}

impl Scheduler {
    pub fn new(
        registry: Arc<AnalysisRegistry>,
        uploader: ResultUploader,
        tracker: StatusTracker,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            uploader,
            tracker,
            config,
        }
    }

    pub async fn run_batch(&self, mut jobs: Vec<JobDescriptor>, opts: RunOptions) -> RunSummary {
        if opts.debug_mode {
            let limit = self.config.debug_job_limit.max(1);
            if jobs.len() > limit {
                info!("debug mode: truncating batch from {} to {limit} job(s)", jobs.len());
                jobs.truncate(limit);
            }
        }
        if jobs.is_empty() {
            info!("no jobs to run");
            return RunSummary::default();
        }

        let budget = self.config.worker_budget();
        let started = Instant::now();
        let statuses = if opts.parallel_on_jobs {
            info!(
                "running {} job(s) in parallel, pool size {budget}, 1 optimizer worker each",
                jobs.len()
            );
            stream::iter(jobs)
                .map(|job| self.run_one(job, 1))
                .buffer_unordered(budget)
                .collect::<Vec<_>>()
                .await
        } else {
            info!(
                "running {} job(s) serially, {budget} optimizer worker(s) each",
                jobs.len()
            );
            let mut statuses = Vec::new();
            for job in jobs {
                statuses.push(self.run_one(job, budget).await);
            }
            statuses
        };

        let mut summary = RunSummary::default();
        for status in statuses {
            summary.record(status);
        }
        info!(
            "batch finished in {:.1}s: {} succeeded, {} failed, {} skipped",
            started.elapsed().as_secs_f64(),
            summary.succeeded,
            summary.failed,
            summary.skipped
        );
        summary
    }

    /// Runs one job through its whole lifecycle and reports the terminal
    /// status. Never returns an error: every failure mode ends up in the
    /// status record instead.
    async fn run_one(&self, job: JobDescriptor, inner_workers: usize) -> JobStatus {
        let log = JobLog::new();

        let tracked = match self.tracker.mark_running(&job).await {
            Ok(tracked) => tracked,
            Err(err) => {
                error!(
                    "could not record pickup of job {}: {err:#}; continuing untracked",
                    job.job_hash
                );
                TrackedJob::untracked()
            }
        };

        let analysis = match self.registry.get(&job.analysis_spec.analysis_name) {
            Ok(analysis) => analysis,
            Err(err) => {
                log.error(format!("cannot dispatch job {}: {err:#}", job.job_hash));
                return self.finish_failed(&tracked, &job, &log).await;
            }
        };

        let ctx = AnalysisContext {
            inner_workers,
            data_root: self.config.data_root.clone(),
            results_root: self.config.results_root.clone(),
            skip_existing: self.config.skip_existing,
            log: log.clone(),
        };
        let job_for_worker = job.clone();
        let handle =
            tokio::task::spawn_blocking(move || execute_job(analysis.as_ref(), &job_for_worker, &ctx));

        let outcome = match handle.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(failure)) => {
                log.error(format!(
                    "unhandled analysis failure for job {}: {:#}",
                    job.job_hash, failure.error
                ));
                return self.finish_failed(&tracked, &job, &log).await;
            }
            Err(join_err) => {
                log.error(format!("analysis panicked for job {}: {join_err}", job.job_hash));
                return self.finish_failed(&tracked, &job, &log).await;
            }
        };

        let upload = self.uploader.upload(&job.job_hash, &outcome.result).await;
        match self
            .tracker
            .complete(&tracked, &job, &outcome.result, &upload, &outcome.captured_log)
            .await
        {
            Ok(final_upload) => info!(
                "job {} recorded as {} (docDB id {:?})",
                job.job_hash,
                outcome.result.status,
                final_upload.docdb_id
            ),
            Err(err) => error!(
                "failed to record terminal status for job {}: {err:#}",
                job.job_hash
            ),
        }
        outcome.result.status
    }

    /// Terminal write for the unhandled-failure paths. A tracker that is
    /// itself down only costs us the record, not the batch.
    async fn finish_failed(
        &self,
        tracked: &TrackedJob,
        job: &JobDescriptor,
        log: &JobLog,
    ) -> JobStatus {
        if let Err(err) = self
            .tracker
            .mark_failed(tracked, job, &log.contents())
            .await
        {
            error!(
                "failed to record failure of job {}: {err:#}",
                job.job_hash
            );
        }
        JobStatus::Failed
    }
}
