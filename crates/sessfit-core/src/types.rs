use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SessfitError, SessfitResult};

/// Terminal status of one job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-memory result file produced by an analysis, keyed by its upload
/// filename. Figures are already encoded; structured results are serialized
/// to pretty JSON at upload time.
#[derive(Debug, Clone)]
pub enum Artifact {
    Figure(Vec<u8>),
    Model(Value),
}

impl Artifact {
    pub fn to_bytes(&self) -> SessfitResult<Vec<u8>> {
        match self {
            Artifact::Figure(bytes) => Ok(bytes.clone()),
            Artifact::Model(value) => serde_json::to_vec_pretty(value).map_err(|source| {
                SessfitError::JsonEncode {
                    context: "artifact".to_string(),
                    source,
                }
            }),
        }
    }
}

/// What an analysis hands back on a non-panicking exit.
///
/// `record` is the JSON document body destined for the document store. The
/// tracker layers status and upload fields on top before persisting it.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub status: JobStatus,
    pub artifacts_to_upload: IndexMap<String, Artifact>,
    pub record: serde_json::Map<String, Value>,
}

impl JobResult {
    pub fn success() -> Self {
        Self {
            status: JobStatus::Success,
            artifacts_to_upload: IndexMap::new(),
            record: serde_json::Map::new(),
        }
    }

    /// An expected analysis failure (bad data, degenerate fit). Recorded,
    /// never retried.
    pub fn failed(reason: impl Into<String>) -> Self {
        let mut result = Self {
            status: JobStatus::Failed,
            ..Self::success()
        };
        result
            .record
            .insert("failure_reason".to_string(), Value::String(reason.into()));
        result
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        let mut result = Self {
            status: JobStatus::Skipped,
            ..Self::success()
        };
        result
            .record
            .insert("skip_reason".to_string(), Value::String(reason.into()));
        result
    }

    pub fn with_artifact(mut self, name: impl Into<String>, artifact: Artifact) -> Self {
        self.artifacts_to_upload.insert(name.into(), artifact);
        self
    }
}

/// Where a finished job's outputs ended up. Appended into the persisted
/// database record; for skipped jobs every field stays at its empty default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadStatus {
    #[serde(rename = "docDB_id")]
    pub docdb_id: Option<String>,
    pub collection_name: Option<String>,
    pub s3_location: Option<String>,
    pub duplicate_detected: bool,
}
