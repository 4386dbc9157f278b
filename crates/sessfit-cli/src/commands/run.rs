use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use sessfit_analyses::default_registry;
use sessfit_core::config::PipelineConfig;
use sessfit_core::discover::discover_jobs;
use sessfit_core::scheduler::{RunOptions, Scheduler};
use sessfit_core::tracker::StatusTracker;
use sessfit_core::uploader::ResultUploader;

#[derive(Args)]
pub struct Run {
    /// 1 = one worker per job across the whole batch,
    /// 0 = jobs in series with the full worker budget inside each job
    #[arg(long = "parallel_on_jobs", default_value_t = 0)]
    pub parallel_on_jobs: u8,

    /// 1 = truncate the batch to a handful of jobs for a quick smoke pass
    #[arg(long = "debug_mode", default_value_t = 0)]
    pub debug_mode: u8,
}

impl Run {
    pub async fn execute(self) -> Result<()> {
        let config = PipelineConfig::default();
        self.execute_with_config(config).await
    }

    pub async fn execute_with_config(self, config: PipelineConfig) -> Result<()> {
        let object_store = super::build_object_store(&config).await;
        let doc_store = super::build_doc_store(&config).await?;

        let jobs = discover_jobs(&config.data_root).await?;
        info!(
            "discovered {} job file(s) under {}",
            jobs.len(),
            config.data_root.display()
        );

        let uploader = ResultUploader::new(
            object_store,
            config.results_root.clone(),
            config.keep_local_copy,
        );
        let tracker = StatusTracker::new(doc_store, config.docdb_collection.clone());
        let scheduler = Scheduler::new(Arc::new(default_registry()), uploader, tracker, config);

        let summary = scheduler
            .run_batch(
                jobs,
                RunOptions {
                    parallel_on_jobs: self.parallel_on_jobs != 0,
                    debug_mode: self.debug_mode != 0,
                },
            )
            .await;

        // Job failures are recorded, not propagated; the command itself only
        // fails when the batch could not be set up at all.
        println!(
            "✓ Batch finished: {} job(s), {} succeeded, {} failed, {} skipped",
            summary.total, summary.succeeded, summary.failed, summary.skipped
        );
        Ok(())
    }
}
