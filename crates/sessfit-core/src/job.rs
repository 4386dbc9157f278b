use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::{SessfitError, SessfitResult};

/// What to run against an input session: a named analysis plus its arguments.
///
/// `analysis_args` is deliberately schemaless at this layer. Each analysis
/// implementation parses the arguments it understands and rejects the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSpec {
    pub analysis_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_ver: Option<String>,
    #[serde(default)]
    pub analysis_libs_to_track_ver: Vec<String>,
    pub analysis_args: Value,
}

/// One unit of work: fit one analysis spec against one recorded session.
///
/// `job_hash` is derived from the semantic fields and is the job's identity
/// everywhere downstream: object-store layout, database lookups, log lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(default)]
    pub job_hash: String,
    pub input_ref: String,
    pub analysis_spec: AnalysisSpec,
}

impl JobDescriptor {
    pub fn new(input_ref: impl Into<String>, analysis_spec: AnalysisSpec) -> Self {
        let mut job = Self {
            job_hash: String::new(),
            input_ref: input_ref.into(),
            analysis_spec,
        };
        job.job_hash = job.content_hash();
        job
    }

    /// Identity hash over the semantic fields, excluding `job_hash` itself.
    ///
    /// Uses canonical JSON (sorted keys, compact separators) so that two
    /// descriptors with the same content always hash the same regardless of
    /// how their JSON was originally formatted.
    pub fn content_hash(&self) -> String {
        let body = serde_json::json!({
            "input_ref": self.input_ref,
            "analysis_spec": self.analysis_spec,
        });
        sha256_hex(canonical_json(&body).as_bytes())
    }

    /// Replaces a stale or missing `job_hash` with the computed one.
    ///
    /// Returns the previously recorded value when it disagreed with the
    /// computed hash, so callers can log the mismatch.
    pub fn reconcile_hash(&mut self) -> Option<String> {
        let computed = self.content_hash();
        let stale = if self.job_hash.is_empty() || self.job_hash == computed {
            None
        } else {
            Some(std::mem::take(&mut self.job_hash))
        };
        self.job_hash = computed;
        stale
    }

    /// Writes the descriptor as `{job_hash}.json` under `dir`.
    pub async fn write_to_dir(&self, dir: &Path) -> SessfitResult<PathBuf> {
        let path = dir.join(format!("{}.json", self.job_hash));
        let bytes =
            serde_json::to_vec_pretty(self).map_err(|source| SessfitError::JsonEncode {
                context: format!("job {}", self.job_hash),
                source,
            })?;
        fs::create_dir_all(dir)
            .await
            .map_err(|source| SessfitError::WriteFile {
                path: dir.to_path_buf(),
                source,
            })?;
        fs::write(&path, bytes)
            .await
            .map_err(|source| SessfitError::WriteFile {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Canonical JSON rendering: object keys sorted, compact separators.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}
