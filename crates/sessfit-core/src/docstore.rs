use async_trait::async_trait;
use serde_json::Value;

/// Document-store interface for job records.
///
/// This trait abstracts over the real document database and the in-memory
/// backend used by tests and offline runs. Writes are never retried by
/// callers; only probes and lookups are safe to replay.
#[async_trait]
pub trait DocStore: Send + Sync {
    /// Inserts a document and returns its store-assigned id.
    async fn insert_one(&self, collection: &str, doc: Value) -> anyhow::Result<String>;

    /// Sets the given top-level fields on the document with id `id`.
    /// Errors when no such document exists.
    async fn update_one(&self, collection: &str, id: &str, fields: Value) -> anyhow::Result<()>;

    /// How many documents already carry this job hash.
    async fn count_by_job_hash(&self, collection: &str, job_hash: &str) -> anyhow::Result<u64>;

    async fn find_by_job_hash(
        &self,
        collection: &str,
        job_hash: &str,
    ) -> anyhow::Result<Vec<Value>>;
}
