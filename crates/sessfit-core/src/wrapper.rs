use crate::analysis::{Analysis, AnalysisContext};
use crate::job::JobDescriptor;
use crate::types::JobResult;

/// A completed analysis call, with everything it logged while running.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub result: JobResult,
    pub captured_log: String,
}

/// An unhandled analysis failure. The captured log holds whatever the
/// analysis managed to write before it bailed out.
#[derive(Debug)]
pub struct ExecutionFailure {
    pub error: anyhow::Error,
    pub captured_log: String,
}

/// Runs one analysis against one job, capturing its log on every exit path.
///
/// Synchronous on purpose: analyses are CPU-bound and the scheduler calls
/// this through `spawn_blocking`. Panics are not caught here; the scheduler
/// recovers the log through its own clone of `ctx.log` in that case.
pub fn execute_job(
    analysis: &dyn Analysis,
    job: &JobDescriptor,
    ctx: &AnalysisContext,
) -> Result<ExecutionOutcome, ExecutionFailure> {
    ctx.log.info(format!(
        "starting {} for {} (job {})",
        analysis.name().as_str(),
        job.input_ref,
        job.job_hash
    ));

    match analysis.run(job, ctx) {
        Ok(result) => {
            ctx.log.info(format!(
                "finished {} for {} with status {}",
                analysis.name().as_str(),
                job.input_ref,
                result.status
            ));
            Ok(ExecutionOutcome {
                result,
                captured_log: ctx.log.contents(),
            })
        }
        Err(error) => Err(ExecutionFailure {
            error,
            captured_log: ctx.log.contents(),
        }),
    }
}
