use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;

use crate::error::{SessfitError, SessfitResult};
use crate::job::JobDescriptor;

/// Recursively collects job descriptors from every `.json` file under `root`.
///
/// A file that fails to read or parse is logged and skipped so one bad drop
/// never sinks the batch. An unreadable root is an error, since that means
/// there is no batch at all.
pub async fn discover_jobs(root: impl AsRef<Path>) -> SessfitResult<Vec<JobDescriptor>> {
    let root = root.as_ref();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    let mut jobs = Vec::new();
    let mut first_dir = true;

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(source) if first_dir => {
                return Err(SessfitError::JobRoot {
                    path: dir,
                    source,
                })
            }
            Err(source) => {
                warn!("skipping unreadable directory {}: {source}", dir.display());
                continue;
            }
        };
        first_dir = false;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    warn!("stopping scan of {}: {source}", dir.display());
                    break;
                }
            };
            let path = entry.path();
            match entry.file_type().await {
                Ok(ftype) if ftype.is_dir() => pending.push(path),
                Ok(_) => {
                    if path.extension().and_then(|e| e.to_str()) != Some("json") {
                        continue;
                    }
                    match load_job_file(&path).await {
                        Ok(job) => jobs.push(job),
                        Err(err) => warn!("skipping job file {}: {err}", path.display()),
                    }
                }
                Err(source) => warn!("skipping {}: {source}", path.display()),
            }
        }
    }

    Ok(jobs)
}

/// Reads one job file, recomputing the content hash. A recorded hash that
/// disagrees with the canonical content is replaced and logged; the computed
/// value is authoritative.
pub async fn load_job_file(path: &Path) -> SessfitResult<JobDescriptor> {
    let bytes = fs::read(path).await.map_err(|source| SessfitError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut job: JobDescriptor =
        serde_json::from_slice(&bytes).map_err(|source| SessfitError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;
    if let Some(stale) = job.reconcile_hash() {
        warn!(
            "job file {} recorded hash {} but content hashes to {}; using the computed value",
            path.display(),
            stale,
            job.job_hash
        );
    }
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::AnalysisSpec;

    fn sample_job(input_ref: &str) -> JobDescriptor {
        JobDescriptor::new(
            input_ref,
            AnalysisSpec {
                analysis_name: "MLE fitting".to_string(),
                analysis_ver: None,
                analysis_libs_to_track_ver: vec![],
                analysis_args: serde_json::json!({"agent_class": "ForagerQLearning"}),
            },
        )
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("sessfit-discover-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_discovers_nested_job_files() {
        let root = scratch_dir();
        let nested = root.join("batch_a").join("deep");
        sample_job("s1.json").write_to_dir(&root).await.expect("write");
        sample_job("s2.json").write_to_dir(&nested).await.expect("write");

        let mut jobs = discover_jobs(&root).await.expect("discover");
        jobs.sort_by(|a, b| a.input_ref.cmp(&b.input_ref));
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].input_ref, "s1.json");
        assert_eq!(jobs[1].input_ref, "s2.json");

        fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn test_skips_unparseable_and_non_json_files() {
        let root = scratch_dir();
        sample_job("good.json").write_to_dir(&root).await.expect("write");
        fs::write(root.join("broken.json"), b"{ not json")
            .await
            .expect("write broken");
        fs::write(root.join("notes.txt"), b"ignore me")
            .await
            .expect("write txt");

        let jobs = discover_jobs(&root).await.expect("discover");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].input_ref, "good.json");

        fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let root = scratch_dir();
        let err = discover_jobs(&root).await.expect_err("no root");
        assert!(matches!(err, SessfitError::JobRoot { .. }));
    }

    #[tokio::test]
    async fn test_load_job_file_replaces_stale_hash() {
        let root = scratch_dir();
        fs::create_dir_all(&root).await.expect("mkdir");
        let mut job = sample_job("s.json");
        let good = job.job_hash.clone();
        job.job_hash = "0000".to_string();
        let path = root.join("stale.json");
        fs::write(&path, serde_json::to_vec(&job).expect("encode"))
            .await
            .expect("write");

        let loaded = load_job_file(&path).await.expect("load");
        assert_eq!(loaded.job_hash, good);

        fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn test_load_job_file_fills_missing_hash() {
        let root = scratch_dir();
        fs::create_dir_all(&root).await.expect("mkdir");
        let path = root.join("nohash.json");
        fs::write(
            &path,
            serde_json::to_vec(&serde_json::json!({
                "input_ref": "s.json",
                "analysis_spec": {
                    "analysis_name": "MLE fitting",
                    "analysis_args": {"agent_class": "ForagerQLearning"}
                }
            }))
            .expect("encode"),
        )
        .await
        .expect("write");

        let loaded = load_job_file(&path).await.expect("load");
        assert_eq!(loaded.job_hash, sample_job("s.json").job_hash);

        fs::remove_dir_all(&root).await.ok();
    }
}
