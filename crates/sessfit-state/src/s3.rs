use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use sessfit_core::object_store::ObjectStore;

/// Object store backed by an S3 bucket. Credentials and region come from the
/// ambient AWS environment (env vars, profile, instance role).
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3ObjectStore {
    pub async fn from_env(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let store = Self::new(aws_sdk_s3::Client::new(&aws_config), bucket, prefix);
        info!("using object store at {}", store.location());
        store
    }

    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{key}", self.prefix)
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn location(&self) -> String {
        if self.prefix.is_empty() {
            self.bucket.clone()
        } else {
            format!("{}/{}", self.bucket, self.prefix)
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(ByteStream::from(bytes))
            .send()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(prefix: &str) -> S3ObjectStore {
        let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        S3ObjectStore::new(aws_sdk_s3::Client::new(&aws_config), "fits-bucket", prefix)
    }

    #[tokio::test]
    async fn test_location_and_keys_include_prefix() {
        let store = store("session_fits/v1/").await;
        assert_eq!(store.location(), "fits-bucket/session_fits/v1");
        assert_eq!(store.object_key("abc/fitted.svg"), "session_fits/v1/abc/fitted.svg");
    }

    #[tokio::test]
    async fn test_empty_prefix_keys_are_bare() {
        let store = store("").await;
        assert_eq!(store.location(), "fits-bucket");
        assert_eq!(store.object_key("abc/record.json"), "abc/record.json");
    }
}
