//! Persistence Module
//!
//! Bulk snapshotting of engine state to an external document store, with
//! residual TTL preserved across a save/restore round trip.

mod memory;
mod mongo;
mod snapshot;

pub use memory::MemoryBackend;
pub use mongo::MongoBackend;
pub use snapshot::{restore, save, SnapshotDocument, SNAPSHOT_BATCH_SIZE};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by snapshot backends.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
}

/// A destination for snapshot documents.
///
/// The engine-side protocol (enumeration, batching, residual-TTL math) lives
/// in [`save`] and [`restore`]; backends only move documents.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Drop any previously written snapshot. An absent destination is
    /// success, not an error.
    async fn reset(&self) -> Result<(), PersistError>;

    /// Append a batch of documents to the snapshot.
    async fn write_batch(&self, docs: Vec<SnapshotDocument>) -> Result<(), PersistError>;

    /// Read back every document in the snapshot.
    async fn read_all(&self) -> Result<Vec<SnapshotDocument>, PersistError>;
}
