//! In-Memory Snapshot Backend
//!
//! Keeps snapshot documents in process memory. Used by the test suite and by
//! embedded setups that have no document store at hand.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{PersistError, SnapshotBackend, SnapshotDocument};

/// Snapshot backend backed by a plain in-memory buffer.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    batches: Mutex<Vec<Vec<SnapshotDocument>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches written since the last reset.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Number of documents currently held.
    pub fn len(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    async fn reset(&self) -> Result<(), PersistError> {
        self.batches.lock().clear();
        Ok(())
    }

    async fn write_batch(&self, docs: Vec<SnapshotDocument>) -> Result<(), PersistError> {
        self.batches.lock().push(docs);
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<SnapshotDocument>, PersistError> {
        Ok(self.batches.lock().iter().flatten().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ValueKind;
    use serde_json::json;

    fn doc(key: &str) -> SnapshotDocument {
        SnapshotDocument {
            key: key.to_string(),
            value: json!(1),
            kind: ValueKind::General,
            ttl: 0,
        }
    }

    #[tokio::test]
    async fn test_write_read_reset() {
        let backend = MemoryBackend::new();
        backend.write_batch(vec![doc("a"), doc("b")]).await.unwrap();
        backend.write_batch(vec![doc("c")]).await.unwrap();

        assert_eq!(backend.batch_count(), 2);
        assert_eq!(backend.read_all().await.unwrap().len(), 3);

        backend.reset().await.unwrap();
        assert!(backend.is_empty());
        assert!(backend.read_all().await.unwrap().is_empty());
    }
}
