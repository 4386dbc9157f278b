use async_trait::async_trait;

/// Object-storage interface for fitted artifacts.
///
/// Keys are relative paths of the form `{job_hash}/{filename}`; the backend
/// prepends whatever bucket and prefix it was configured with.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable location of the store root, recorded into job
    /// documents as the base of `s3_location`.
    fn location(&self) -> String;

    async fn put(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()>;
}
