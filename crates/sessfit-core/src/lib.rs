pub mod analysis;
pub mod config;
pub mod discover;
pub mod docstore;
pub mod error;
pub mod job;
pub mod logcap;
pub mod object_store;
pub mod retry;
pub mod scheduler;
pub mod tracker;
pub mod types;
pub mod uploader;
pub mod wrapper;

pub use analysis::{Analysis, AnalysisContext, AnalysisName, AnalysisRegistry};
pub use config::PipelineConfig;
pub use docstore::DocStore;
pub use error::{SessfitError, SessfitResult};
pub use job::{canonical_json, sha256_hex, AnalysisSpec, JobDescriptor};
pub use logcap::JobLog;
pub use object_store::ObjectStore;
pub use scheduler::{RunOptions, RunSummary, Scheduler};
pub use tracker::{StatusTracker, TrackedJob};
pub use types::{Artifact, JobResult, JobStatus, UploadStatus};
pub use uploader::{local_record_exists, ResultUploader};
pub use wrapper::{execute_job, ExecutionFailure, ExecutionOutcome};
