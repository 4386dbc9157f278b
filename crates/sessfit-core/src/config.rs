use std::path::PathBuf;

/// Pipeline configuration, resolved from `SESSFIT_*` environment variables
/// with sensible local defaults. Leaving `s3_bucket` or `docdb_uri` unset
/// selects the in-memory backend for that side, which is how tests and
/// offline runs work.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory scanned for job JSON files and session inputs.
    pub data_root: PathBuf,

    /// Local directory where per-job results are mirrored, one
    /// subdirectory per job hash.
    pub results_root: PathBuf,

    /// Object-storage bucket for fitted artifacts. `None` disables S3.
    pub s3_bucket: Option<String>,

    /// Key prefix inside the bucket, ahead of `{job_hash}/{filename}`.
    pub s3_prefix: String,

    /// Document-store connection string. `None` disables the remote store.
    pub docdb_uri: Option<String>,

    pub docdb_database: String,
    pub docdb_collection: String,

    /// Keep a local copy of every uploaded artifact.
    pub keep_local_copy: bool,

    /// Return early with a skipped status when a job's results already
    /// exist locally.
    pub skip_existing: bool,

    /// Worker budget for the whole run. 0 means one per CPU.
    pub workers: usize,

    /// How many jobs a debug run processes.
    pub debug_job_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: std::env::var("SESSFIT_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            results_root: std::env::var("SESSFIT_RESULTS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("results")),
            s3_bucket: std::env::var("SESSFIT_S3_BUCKET").ok().filter(|v| !v.is_empty()),
            s3_prefix: std::env::var("SESSFIT_S3_PREFIX")
                .unwrap_or_else(|_| "session_fits/v1".to_string()),
            docdb_uri: std::env::var("SESSFIT_DOCDB_URI").ok().filter(|v| !v.is_empty()),
            docdb_database: std::env::var("SESSFIT_DOCDB_DATABASE")
                .unwrap_or_else(|_| "behavior_analysis".to_string()),
            docdb_collection: std::env::var("SESSFIT_DOCDB_COLLECTION")
                .unwrap_or_else(|_| "mle_fitting".to_string()),
            keep_local_copy: std::env::var("SESSFIT_KEEP_LOCAL_COPY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            skip_existing: std::env::var("SESSFIT_SKIP_EXISTING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            workers: std::env::var("SESSFIT_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            debug_job_limit: std::env::var("SESSFIT_DEBUG_JOB_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }
}

impl PipelineConfig {
    /// Effective worker budget: the configured value, or one per CPU.
    pub fn worker_budget(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            num_cpus::get().max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_budget_falls_back_to_cpu_count() {
        let mut config = PipelineConfig {
            workers: 0,
            ..PipelineConfig::default()
        };
        assert!(config.worker_budget() >= 1);
        config.workers = 3;
        assert_eq!(config.worker_budget(), 3);
    }
}
