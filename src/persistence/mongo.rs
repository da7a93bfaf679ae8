//! MongoDB Snapshot Backend
//!
//! Stores snapshot documents in a single collection through the official
//! driver. The collection is dropped wholesale on reset; dropping a
//! collection that does not exist is a no-op.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection};
use tracing::info;

use super::{PersistError, SnapshotBackend, SnapshotDocument};

/// Snapshot backend writing to a MongoDB collection.
pub struct MongoBackend {
    collection: Collection<SnapshotDocument>,
}

impl MongoBackend {
    /// Connect to MongoDB and bind to the snapshot collection.
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
    ) -> Result<Self, PersistError> {
        let client = Client::with_uri_str(uri).await?;
        info!(database, collection, "connected to mongodb");
        Ok(Self {
            collection: client.database(database).collection(collection),
        })
    }
}

#[async_trait]
impl SnapshotBackend for MongoBackend {
    async fn reset(&self) -> Result<(), PersistError> {
        self.collection.drop().await?;
        Ok(())
    }

    async fn write_batch(&self, docs: Vec<SnapshotDocument>) -> Result<(), PersistError> {
        if docs.is_empty() {
            return Ok(());
        }
        self.collection.insert_many(docs).await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<SnapshotDocument>, PersistError> {
        let mut cursor = self.collection.find(doc! {}).await?;
        let mut docs = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            docs.push(document);
        }
        Ok(docs)
    }
}
