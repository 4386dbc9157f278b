use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::docstore::DocStore;
use crate::job::JobDescriptor;
use crate::types::{JobResult, JobStatus, UploadStatus};

/// Handle for one job's lifecycle document, created at pickup.
#[derive(Debug, Clone, Default)]
pub struct TrackedJob {
    pub doc_id: Option<String>,
    pub duplicate_detected: bool,
}

impl TrackedJob {
    /// Used when the running insert itself failed; terminal writes then fall
    /// back to a fresh insert.
    pub fn untracked() -> Self {
        Self::default()
    }
}

/// Writes each job's status lifecycle into the document store.
///
/// One document per job run: inserted with status `running` at pickup and
/// patched to its terminal status afterwards. Re-running a job therefore
/// leaves one document per run, with the duplicate flagged, never an
/// overwrite of history.
pub struct StatusTracker {
    docs: Arc<dyn DocStore>,
    collection: String,
}

impl StatusTracker {
    pub fn new(docs: Arc<dyn DocStore>, collection: impl Into<String>) -> Self {
        Self {
            docs,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Records pickup. The duplicate probe is best-effort: a failed count
    /// must not block the run, so probe errors degrade to "not a duplicate".
    pub async fn mark_running(&self, job: &JobDescriptor) -> anyhow::Result<TrackedJob> {
        let duplicate_detected = match self
            .docs
            .count_by_job_hash(&self.collection, &job.job_hash)
            .await
        {
            Ok(0) => false,
            Ok(n) => {
                warn!(
                    "job hash {} already has {n} record(s) in {}; recording this run as well",
                    job.job_hash, self.collection
                );
                true
            }
            Err(err) => {
                warn!("duplicate probe failed for job {}: {err:#}", job.job_hash);
                false
            }
        };

        let doc = json!({
            "job_hash": job.job_hash,
            "input_ref": job.input_ref,
            "analysis_spec": job.analysis_spec,
            "status": "running",
            "started_at": Utc::now().to_rfc3339(),
        });
        let doc_id = self.docs.insert_one(&self.collection, doc).await?;
        Ok(TrackedJob {
            doc_id: Some(doc_id),
            duplicate_detected,
        })
    }

    /// Records a terminal status for a job whose analysis returned a result
    /// (success, expected failure, or skip). Returns the finalized upload
    /// status with the document reference filled in.
    pub async fn complete(
        &self,
        tracked: &TrackedJob,
        job: &JobDescriptor,
        result: &JobResult,
        upload: &UploadStatus,
        captured_log: &str,
    ) -> anyhow::Result<UploadStatus> {
        let mut upload = upload.clone();
        upload.duplicate_detected |= tracked.duplicate_detected;
        if result.status != JobStatus::Skipped {
            upload.collection_name = Some(self.collection.clone());
            upload.docdb_id = tracked.doc_id.clone();
        }

        let mut doc = result.record.clone();
        self.write_terminal_fields(&mut doc, job, result.status, captured_log, &upload);

        match &tracked.doc_id {
            Some(id) => {
                self.docs
                    .update_one(&self.collection, id, Value::Object(doc))
                    .await?;
            }
            None => {
                let id = self
                    .docs
                    .insert_one(&self.collection, Value::Object(doc))
                    .await?;
                if result.status != JobStatus::Skipped {
                    upload.docdb_id = Some(id);
                }
            }
        }
        Ok(upload)
    }

    /// Records an unhandled failure. The document keeps a null database
    /// reference and the full captured trace.
    pub async fn mark_failed(
        &self,
        tracked: &TrackedJob,
        job: &JobDescriptor,
        captured_log: &str,
    ) -> anyhow::Result<()> {
        let mut doc = Map::new();
        self.write_terminal_fields(
            &mut doc,
            job,
            JobStatus::Failed,
            captured_log,
            &UploadStatus {
                duplicate_detected: tracked.duplicate_detected,
                ..UploadStatus::default()
            },
        );

        match &tracked.doc_id {
            Some(id) => {
                self.docs
                    .update_one(&self.collection, id, Value::Object(doc))
                    .await
            }
            None => self
                .docs
                .insert_one(&self.collection, Value::Object(doc))
                .await
                .map(|_| ()),
        }
    }

    fn write_terminal_fields(
        &self,
        doc: &mut Map<String, Value>,
        job: &JobDescriptor,
        status: JobStatus,
        captured_log: &str,
        upload: &UploadStatus,
    ) {
        // Identity fields come from the descriptor, not the analysis record,
        // so a malformed record can never misfile the document.
        doc.insert("job_hash".to_string(), Value::String(job.job_hash.clone()));
        doc.insert(
            "input_ref".to_string(),
            Value::String(job.input_ref.clone()),
        );
        doc.insert(
            "analysis_spec".to_string(),
            serde_json::to_value(&job.analysis_spec).unwrap_or(Value::Null),
        );
        doc.insert(
            "status".to_string(),
            Value::String(status.as_str().to_string()),
        );
        doc.insert("log".to_string(), Value::String(captured_log.to_string()));
        doc.insert(
            "finished_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        doc.insert(
            "docDB_id".to_string(),
            upload
                .docdb_id
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        doc.insert(
            "collection_name".to_string(),
            upload
                .collection_name
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        doc.insert(
            "s3_location".to_string(),
            upload
                .s3_location
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        doc.insert(
            "duplicate_detected".to_string(),
            Value::Bool(upload.duplicate_detected),
        );
    }
}
