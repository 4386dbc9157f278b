use std::sync::Arc;

use serde_json::json;

use sessfit_core::docstore::DocStore;
use sessfit_core::job::{AnalysisSpec, JobDescriptor};
use sessfit_core::tracker::{StatusTracker, TrackedJob};
use sessfit_core::types::{JobResult, UploadStatus};
use sessfit_state::MemoryDocStore;

const COLLECTION: &str = "mle_fitting";

fn job() -> JobDescriptor {
    JobDescriptor::new(
        "713377_2024-07-30.json",
        AnalysisSpec {
            analysis_name: "MLE fitting".to_string(),
            analysis_ver: Some("first version @ 0.3.0".to_string()),
            analysis_libs_to_track_ver: vec![],
            analysis_args: json!({"agent_class": "ForagerQLearning"}),
        },
    )
}

fn setup() -> (Arc<MemoryDocStore>, StatusTracker) {
    let docs = Arc::new(MemoryDocStore::new());
    let tracker = StatusTracker::new(docs.clone(), COLLECTION);
    (docs, tracker)
}

#[tokio::test]
async fn test_lifecycle_patches_the_running_document_to_terminal() {
    let (docs, tracker) = setup();
    let job = job();

    let tracked = tracker.mark_running(&job).await.expect("mark running");
    assert!(tracked.doc_id.is_some());
    assert!(!tracked.duplicate_detected);

    let running = docs.documents(COLLECTION).await;
    assert_eq!(running.len(), 1);
    assert_eq!(running[0]["status"], "running");
    assert!(running[0]["started_at"].is_string());

    let mut result = JobResult::success();
    result
        .record
        .insert("analysis_results".to_string(), json!({"ll": -30.0}));
    let upload = UploadStatus {
        s3_location: Some("bucket/prefix/hash".to_string()),
        ..UploadStatus::default()
    };

    let final_upload = tracker
        .complete(&tracked, &job, &result, &upload, "captured output\n")
        .await
        .expect("complete");
    assert_eq!(final_upload.docdb_id, tracked.doc_id);
    assert_eq!(final_upload.collection_name.as_deref(), Some(COLLECTION));

    let records = docs.documents(COLLECTION).await;
    assert_eq!(records.len(), 1, "terminal write patches, never inserts");
    let doc = &records[0];
    assert_eq!(doc["status"], "success");
    assert_eq!(doc["job_hash"], job.job_hash.as_str());
    assert_eq!(doc["input_ref"], job.input_ref.as_str());
    assert_eq!(doc["analysis_results"]["ll"], -30.0);
    assert_eq!(doc["log"], "captured output\n");
    assert_eq!(doc["s3_location"], "bucket/prefix/hash");
    assert_eq!(doc["docDB_id"], tracked.doc_id.clone().expect("id").as_str());
}

#[tokio::test]
async fn test_skipped_jobs_keep_null_store_references() {
    let (docs, tracker) = setup();
    let job = job();

    let tracked = tracker.mark_running(&job).await.expect("mark running");
    let final_upload = tracker
        .complete(
            &tracked,
            &job,
            &JobResult::skipped("results already present"),
            &UploadStatus::default(),
            "",
        )
        .await
        .expect("complete");

    assert!(final_upload.docdb_id.is_none());
    assert!(final_upload.collection_name.is_none());

    let doc = &docs.documents(COLLECTION).await[0];
    assert_eq!(doc["status"], "skipped");
    assert_eq!(doc["skip_reason"], "results already present");
    assert!(doc["docDB_id"].is_null());
    assert!(doc["collection_name"].is_null());
    assert!(doc["s3_location"].is_null());
}

#[tokio::test]
async fn test_untracked_jobs_fall_back_to_a_fresh_insert() {
    let (docs, tracker) = setup();
    let job = job();

    let final_upload = tracker
        .complete(
            &TrackedJob::untracked(),
            &job,
            &JobResult::success(),
            &UploadStatus::default(),
            "",
        )
        .await
        .expect("complete");
    assert!(
        final_upload.docdb_id.is_some(),
        "fallback insert still reports where the record went"
    );

    let records = docs.documents(COLLECTION).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "success");
}

#[tokio::test]
async fn test_duplicate_probe_flags_reruns() {
    let (docs, tracker) = setup();
    let job = job();

    docs.insert_one(
        COLLECTION,
        json!({"job_hash": job.job_hash, "status": "success"}),
    )
    .await
    .expect("seed earlier record");

    let tracked = tracker.mark_running(&job).await.expect("mark running");
    assert!(tracked.duplicate_detected);

    let final_upload = tracker
        .complete(
            &tracked,
            &job,
            &JobResult::success(),
            &UploadStatus::default(),
            "",
        )
        .await
        .expect("complete");
    assert!(final_upload.duplicate_detected);

    let records = docs
        .find_by_job_hash(COLLECTION, &job.job_hash)
        .await
        .expect("find");
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_mark_failed_records_the_captured_log() {
    let (docs, tracker) = setup();
    let job = job();

    let tracked = tracker.mark_running(&job).await.expect("mark running");
    tracker
        .mark_failed(&tracked, &job, "ERROR - optimizer blew up\n")
        .await
        .expect("mark failed");

    let doc = &docs.documents(COLLECTION).await[0];
    assert_eq!(doc["status"], "failed");
    assert!(doc["docDB_id"].is_null());
    assert!(doc["s3_location"].is_null());
    assert_eq!(doc["log"], "ERROR - optimizer blew up\n");
}
