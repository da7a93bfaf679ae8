//! Snapshot Protocol
//!
//! Serializes every live record into `{key, value, type, ttl}` documents and
//! installs them back with the TTL that remains at restore time.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{PersistError, SnapshotBackend};
use crate::storage::{unix_now, Engine, Value, ValueKind};

/// Documents are flushed to the backend in groups of this size.
pub const SNAPSHOT_BATCH_SIZE: usize = 100;

/// One persisted record.
///
/// `ttl` is the absolute expiration second (0 = no expiration), so the
/// snapshot stays wall-clock-portable regardless of how long the restore is
/// delayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub key: String,
    pub value: serde_json::Value,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub ttl: i64,
}

impl SnapshotDocument {
    fn from_record(key: String, value: Value, expires_at: i64) -> Self {
        Self {
            key,
            kind: value.kind(),
            value: value.into_json(),
            ttl: expires_at,
        }
    }

    /// Rebuild the stored variant from the wire form.
    ///
    /// The type tag drives the reconstruction; dictionary documents come
    /// back as string-keyed maps even when the driver decoded them into an
    /// opaque document shape. A tag that contradicts the value's own shape
    /// is logged and resolved by shape.
    pub fn into_value(self) -> Value {
        let SnapshotDocument { key, value, kind, .. } = self;
        match (kind, value) {
            (ValueKind::List, serde_json::Value::Array(items)) => Value::List(items),
            (ValueKind::Dict, serde_json::Value::Object(map)) => Value::Dict(map),
            (ValueKind::General, value) if !value.is_array() && !value.is_object() => {
                Value::Scalar(value)
            }
            (kind, value) => {
                warn!(%kind, key = %key, "snapshot value does not match its type tag");
                Value::from_json(value)
            }
        }
    }
}

/// Write a snapshot of the whole engine to the backend.
///
/// The destination is reset first. Keys are enumerated once; records that
/// vanish between enumeration and read are skipped. Concurrent writers are
/// not frozen out, so the snapshot is a fuzzy point-in-time that is only
/// consistent per record.
pub async fn save(engine: &Engine, backend: &dyn SnapshotBackend) -> Result<(), PersistError> {
    backend.reset().await?;
    let mut batch = Vec::with_capacity(SNAPSHOT_BATCH_SIZE);
    for key in engine.keys() {
        if let Some((value, expires_at)) = engine.get_with_ttl(&key) {
            batch.push(SnapshotDocument::from_record(key, value, expires_at));
            if batch.len() == SNAPSHOT_BATCH_SIZE {
                backend.write_batch(std::mem::take(&mut batch)).await?;
            }
        }
    }
    if !batch.is_empty() {
        backend.write_batch(batch).await?;
    }
    Ok(())
}

/// Install a snapshot into the engine.
///
/// Non-expiring documents load as-is; documents whose expiration is still
/// ahead load with the residual duration; already-expired documents are
/// dropped rather than installed with no TTL.
pub async fn restore(engine: &Engine, backend: &dyn SnapshotBackend) -> Result<(), PersistError> {
    let now = unix_now();
    for doc in backend.read_all().await? {
        if doc.ttl != 0 && doc.ttl <= now {
            debug!(key = %doc.key, "skipped expired snapshot record");
            continue;
        }
        let ttl_secs = if doc.ttl == 0 { 0 } else { doc.ttl - now };
        let key = doc.key.clone();
        engine.set(&key, doc.into_value(), ttl_secs);
        debug!(key = %key, "loaded snapshot record");
    }
    Ok(())
}
