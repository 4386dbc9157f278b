use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use tracing::warn;

use sessfit_core::config::PipelineConfig;
use sessfit_core::docstore::DocStore;
use sessfit_core::object_store::ObjectStore;
use sessfit_state::{MemoryDocStore, MemoryObjectStore, MongoDocStore, S3ObjectStore};

pub mod generate_jobs;
pub mod run;
pub mod status;

pub use generate_jobs::GenerateJobs;
pub use run::Run;
pub use status::Status;

#[derive(Subcommand)]
pub enum Commands {
    /// Run every job file under the data root and record the results
    Run(Run),

    /// Write stock job files for a list of session inputs
    GenerateJobs(GenerateJobs),

    /// Show the document-store records for a job hash
    Status(Status),
}

/// Object storage for artifacts. Without a configured bucket the batch still
/// runs; artifacts only land under the local results root.
pub async fn build_object_store(config: &PipelineConfig) -> Arc<dyn ObjectStore> {
    match &config.s3_bucket {
        Some(bucket) => {
            Arc::new(S3ObjectStore::from_env(bucket.clone(), config.s3_prefix.clone()).await)
        }
        None => {
            warn!("SESSFIT_S3_BUCKET is not set; artifacts stay on the local results root only");
            Arc::new(MemoryObjectStore::new())
        }
    }
}

/// Document store for job records. Without a configured URI records live in
/// process memory and vanish when the batch exits.
pub async fn build_doc_store(config: &PipelineConfig) -> Result<Arc<dyn DocStore>> {
    match &config.docdb_uri {
        Some(uri) => {
            let store = MongoDocStore::connect(uri, &config.docdb_database).await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("SESSFIT_DOCDB_URI is not set; job records are kept in process memory");
            Ok(Arc::new(MemoryDocStore::new()))
        }
    }
}
