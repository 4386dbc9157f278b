use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::fs;
use tracing::{error, info};

use crate::error::{SessfitError, SessfitResult};
use crate::object_store::ObjectStore;
use crate::types::{JobResult, JobStatus, UploadStatus};

/// Pushes a finished job's artifacts to object storage and mirrors them to
/// local disk.
///
/// Uploads are best-effort per artifact: one failed put is logged and the
/// rest still go out, because a missing figure should never cost us the
/// fitted record. Skipped jobs upload nothing.
pub struct ResultUploader {
    store: Arc<dyn ObjectStore>,
    results_root: PathBuf,
    keep_local_copy: bool,
}

impl ResultUploader {
    pub fn new(store: Arc<dyn ObjectStore>, results_root: impl Into<PathBuf>, keep_local_copy: bool) -> Self {
        Self {
            store,
            results_root: results_root.into(),
            keep_local_copy,
        }
    }

    pub async fn upload(&self, job_hash: &str, result: &JobResult) -> UploadStatus {
        if result.status == JobStatus::Skipped {
            return UploadStatus::default();
        }

        let status = UploadStatus {
            s3_location: Some(format!("{}/{}", self.store.location(), job_hash)),
            ..UploadStatus::default()
        };

        let total = result.artifacts_to_upload.len();
        let mut uploaded = 0usize;
        for (name, artifact) in &result.artifacts_to_upload {
            let bytes = match artifact.to_bytes() {
                Ok(bytes) => bytes,
                Err(err) => {
                    error!("cannot serialize artifact {name} for job {job_hash}: {err}");
                    continue;
                }
            };
            if self.put_object(job_hash, name, bytes.clone()).await {
                uploaded += 1;
            }
            if self.keep_local_copy {
                if let Err(err) = self.write_local(job_hash, name, &bytes).await {
                    error!("failed to mirror artifact {name} for job {job_hash}: {err}");
                }
            }
        }

        // The record body goes out as its own JSON object and always lands
        // on local disk, so the run leaves a durable trace of what was (or
        // would have been) inserted even when the stores are unreachable.
        match serde_json::to_vec_pretty(&Value::Object(result.record.clone())) {
            Ok(bytes) => {
                self.put_object(job_hash, "record.json", bytes.clone()).await;
                if let Err(err) = self.write_local(job_hash, "record.json", &bytes).await {
                    error!("failed to write local record for job {job_hash}: {err}");
                }
            }
            Err(err) => error!("cannot serialize record for job {job_hash}: {err}"),
        }

        info!("uploaded {uploaded}/{total} artifacts for job {job_hash}");
        status
    }

    /// Where a job's local results live.
    pub fn local_dir(&self, job_hash: &str) -> PathBuf {
        self.results_root.join(job_hash)
    }

    async fn put_object(&self, job_hash: &str, name: &str, bytes: Vec<u8>) -> bool {
        let key = format!("{job_hash}/{name}");
        match self.store.put(&key, bytes).await {
            Ok(()) => true,
            Err(err) => {
                error!("failed to upload {key}: {err:#}");
                false
            }
        }
    }

    async fn write_local(&self, job_hash: &str, name: &str, bytes: &[u8]) -> SessfitResult<()> {
        let dir = self.local_dir(job_hash);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| SessfitError::WriteFile {
                path: dir.clone(),
                source,
            })?;
        let path = dir.join(name);
        fs::write(&path, bytes)
            .await
            .map_err(|source| SessfitError::WriteFile { path, source })
    }
}

/// True when a job already has a local record under `results_root`, which is
/// what the skip-existing mode checks before refitting.
pub fn local_record_exists(results_root: &Path, job_hash: &str) -> bool {
    results_root.join(job_hash).join("record.json").is_file()
}
