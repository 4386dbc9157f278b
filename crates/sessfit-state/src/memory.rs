use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use sessfit_core::docstore::DocStore;
use sessfit_core::object_store::ObjectStore;

/// Document store held entirely in memory. The default backend for offline
/// runs and tests; one instance shared via clone behaves like one database.
#[derive(Debug, Default, Clone)]
pub struct MemoryDocStore {
    collections: Arc<RwLock<HashMap<String, Vec<(String, Value)>>>>,
}

impl MemoryDocStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every document in a collection, in insertion order. Test hook.
    pub async fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.iter().map(|(_, doc)| doc.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocStore for MemoryDocStore {
    async fn insert_one(&self, collection: &str, doc: Value) -> anyhow::Result<String> {
        let id = format!("mem-{}", Uuid::new_v4());
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), doc));
        Ok(id)
    }

    async fn update_one(&self, collection: &str, id: &str, fields: Value) -> anyhow::Result<()> {
        let fields = match fields {
            Value::Object(map) => map,
            other => bail!("update fields must be an object, got {other}"),
        };
        let mut collections = self.collections.write().await;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("no collection {collection}"))?;
        let (_, doc) = docs
            .iter_mut()
            .find(|(doc_id, _)| doc_id == id)
            .ok_or_else(|| anyhow!("no document with id {id} in {collection}"))?;
        let body = doc
            .as_object_mut()
            .ok_or_else(|| anyhow!("document {id} is not an object"))?;
        for (key, value) in fields {
            body.insert(key, value);
        }
        Ok(())
    }

    async fn count_by_job_hash(&self, collection: &str, job_hash: &str) -> anyhow::Result<u64> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| doc.get("job_hash").and_then(Value::as_str) == Some(job_hash))
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn find_by_job_hash(
        &self,
        collection: &str,
        job_hash: &str,
    ) -> anyhow::Result<Vec<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| doc.get("job_hash").and_then(Value::as_str) == Some(job_hash))
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Object store held in memory, with a failure hook so tests can make
/// individual puts fail and watch the rest of an upload survive.
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_keys_containing: Arc<RwLock<Option<String>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every put whose key contains `fragment` fail until cleared.
    pub async fn fail_puts_containing(&self, fragment: impl Into<String>) {
        *self.fail_keys_containing.write().await = Some(fragment.into());
    }

    pub async fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        if let Some(fragment) = self.fail_keys_containing.read().await.as_deref() {
            if key.contains(fragment) {
                bail!("injected put failure for key {key}");
            }
        }
        self.objects
            .write()
            .await
            .insert(key.to_string(), bytes);
        Ok(())
    }
}
