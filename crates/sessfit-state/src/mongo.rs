use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::Client;
use serde_json::Value;
use tracing::info;

use sessfit_core::docstore::DocStore;
use sessfit_core::retry::{with_retries, RetryPolicy};

/// Document store backed by MongoDB (or a compatible document database).
///
/// Connects and probes are retried; inserts and updates run exactly once so
/// a retry can never double-write a job record.
pub struct MongoDocStore {
    db: mongodb::Database,
    read_retry: RetryPolicy,
}

impl MongoDocStore {
    pub async fn connect(uri: &str, database: &str) -> anyhow::Result<Self> {
        let client = with_retries(RetryPolicy::default(), "document store connect", || {
            let uri = uri.to_string();
            async move {
                let mut client_options = ClientOptions::parse(&uri).await?;
                let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
                client_options.server_api = Some(server_api);
                client_options.app_name = Some("sessfit".to_string());
                let client = Client::with_options(client_options)?;
                // Ping to confirm the connection before any job starts.
                client
                    .database("admin")
                    .run_command(doc! { "ping": 1 })
                    .await?;
                Ok(client)
            }
        })
        .await?;
        info!("connected to document store, database {database}");
        Ok(Self {
            db: client.database(database),
            read_retry: RetryPolicy::default(),
        })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

/// Documents are addressed by ObjectId hex when the id parses as one, and by
/// a plain string `_id` otherwise (the in-memory store and some fixtures use
/// string ids).
fn id_filter(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": oid },
        Err(_) => doc! { "_id": id },
    }
}

fn render_id(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DocStore for MongoDocStore {
    async fn insert_one(&self, collection: &str, doc: Value) -> anyhow::Result<String> {
        let doc = bson::to_document(&doc)?;
        let result = self.collection(collection).insert_one(doc).await?;
        Ok(render_id(&result.inserted_id))
    }

    async fn update_one(&self, collection: &str, id: &str, fields: Value) -> anyhow::Result<()> {
        let fields = bson::to_document(&fields)?;
        let result = self
            .collection(collection)
            .update_one(id_filter(id), doc! { "$set": fields })
            .await?;
        anyhow::ensure!(
            result.matched_count > 0,
            "no document with id {id} in {collection}"
        );
        Ok(())
    }

    async fn count_by_job_hash(&self, collection: &str, job_hash: &str) -> anyhow::Result<u64> {
        let col = self.collection(collection);
        with_retries(self.read_retry, "job hash count", || {
            let col = col.clone();
            let filter = doc! { "job_hash": job_hash };
            async move { Ok(col.count_documents(filter).await?) }
        })
        .await
    }

    async fn find_by_job_hash(
        &self,
        collection: &str,
        job_hash: &str,
    ) -> anyhow::Result<Vec<Value>> {
        let col = self.collection(collection);
        let docs: Vec<Document> = with_retries(self.read_retry, "job hash lookup", || {
            let col = col.clone();
            let filter = doc! { "job_hash": job_hash };
            async move {
                let cursor = col.find(filter).await?;
                Ok(cursor.try_collect().await?)
            }
        })
        .await?;
        docs.into_iter()
            .map(|doc| Ok(serde_json::to_value(doc)?))
            .collect()
    }
}
