//! Engine
//!
//! Owns the data map and the TTL index, and drives background expiration.
//!
//! Writes with a positive TTL record the key in a bucket keyed by the
//! absolute expiration second. Buckets are advisory: a later write may move a
//! key's expiration without chasing the old bucket entry, so the sweep
//! re-checks the record itself before removing anything.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::chunked_map::ChunkedMap;
use super::error::StorageError;
use super::reaper::{self, ReaperHandle};
use super::unix_now;
use super::value::{Record, Value};

/// How often the reaper sweeps expired buckets.
pub const REAPER_PERIOD: Duration = Duration::from_secs(60);

/// A TTL index bucket: the keys scheduled to expire at one absolute second.
/// May hold duplicates and stale entries; the sweep resolves both against
/// the data map.
#[derive(Debug, Default)]
struct Bucket {
    keys: Mutex<Vec<String>>,
}

#[derive(Debug)]
struct EngineInner {
    data: ChunkedMap<Record>,
    ttl_index: ChunkedMap<Arc<Bucket>>,
    /// Serializes bucket creation so two writers expiring at the same second
    /// never race to overwrite each other's bucket.
    bucket_guard: Mutex<()>,
    /// Last second (exclusive) up to which buckets have been swept. Owned by
    /// the reaper after construction.
    last_cleared: AtomicI64,
    reaper: Mutex<Option<ReaperHandle>>,
    period: Duration,
}

/// Sharded key/value engine with TTL expiration.
///
/// Cheap to clone; all clones share the same maps and reaper.
#[derive(Debug, Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine with the given chunk count, optionally starting the
    /// background reaper. When the reaper is started, a tokio runtime must
    /// be active.
    pub fn new(chunks: u32, start_reaper: bool) -> Self {
        Self::with_reaper_period(chunks, start_reaper, REAPER_PERIOD)
    }

    pub(crate) fn with_reaper_period(chunks: u32, start_reaper: bool, period: Duration) -> Self {
        let engine = Self {
            inner: Arc::new(EngineInner {
                data: ChunkedMap::new(chunks),
                ttl_index: ChunkedMap::new(chunks),
                bucket_guard: Mutex::new(()),
                // One second back so a record expiring just before startup
                // is still caught by the first sweep.
                last_cleared: AtomicI64::new(unix_now() - 1),
                reaper: Mutex::new(None),
                period,
            }),
        };
        if start_reaper {
            engine.start_ttl_processing();
        }
        engine
    }

    /// Store a value under a key.
    ///
    /// `ttl_secs > 0` schedules expiration `ttl_secs` whole seconds from now;
    /// `ttl_secs == 0` stores without expiration; `ttl_secs < 0` stores and
    /// immediately removes (a defined insert-then-delete, not an error).
    pub fn set(&self, key: &str, value: Value, ttl_secs: i64) {
        let expires_at = if ttl_secs > 0 {
            unix_now() + ttl_secs
        } else {
            0
        };
        self.inner
            .data
            .put(key.to_string(), Record::new(value, expires_at));
        if ttl_secs > 0 {
            let bucket_key = expires_at.to_string();
            let bucket = match self.inner.ttl_index.get(&bucket_key) {
                Some(bucket) => bucket,
                None => self.ensure_bucket(&bucket_key),
            };
            bucket.keys.lock().push(key.to_string());
        } else if ttl_secs < 0 {
            self.inner.data.remove(key);
        }
    }

    /// Replace value and TTL for an existing key.
    ///
    /// Fails with `KeyNotFound` when the key is absent. A concurrent remove
    /// between the existence check and the store may resurrect the key; that
    /// race is accepted.
    pub fn update(&self, key: &str, value: Value, ttl_secs: i64) -> Result<(), StorageError> {
        if !self.inner.data.exists(key) {
            return Err(StorageError::KeyNotFound);
        }
        self.set(key, value, ttl_secs);
        Ok(())
    }

    /// Delete a key, returning whether it was present. The TTL index is left
    /// alone; any entry for the key simply goes stale.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.data.remove(key)
    }

    /// Get the value for a key.
    ///
    /// Expiration is not checked here: a record past its expiration second
    /// remains visible until the next sweep removes it.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.data.get(key).map(|record| record.value)
    }

    /// Get the value and absolute expiration second (0 = none) for a key.
    pub fn get_with_ttl(&self, key: &str) -> Option<(Value, i64)> {
        self.inner
            .data
            .get(key)
            .map(|record| (record.value, record.expires_at))
    }

    /// Get the `index`-th element of the list stored under `key`.
    pub fn get_list_element(
        &self,
        key: &str,
        index: i64,
    ) -> Result<serde_json::Value, StorageError> {
        let value = self.get(key).ok_or(StorageError::KeyNotFound)?;
        let Value::List(mut items) = value else {
            return Err(StorageError::NotAList);
        };
        if index < 0 || index as usize >= items.len() {
            return Err(StorageError::OutOfBound);
        }
        Ok(items.swap_remove(index as usize))
    }

    /// Get the member `dict_key` of the dictionary stored under `key`.
    pub fn get_dict_element(
        &self,
        key: &str,
        dict_key: &str,
    ) -> Result<serde_json::Value, StorageError> {
        let value = self.get(key).ok_or(StorageError::KeyNotFound)?;
        let Value::Dict(mut map) = value else {
            return Err(StorageError::NotADict);
        };
        map.remove(dict_key).ok_or(StorageError::DictKeyNotFound)
    }

    /// Snapshot of all live keys. Order unspecified; may tear across chunks.
    pub fn keys(&self) -> Vec<String> {
        self.inner.data.keys()
    }

    /// Spawn the background reaper. No-op when it is already running.
    pub fn start_ttl_processing(&self) {
        let mut slot = self.inner.reaper.lock();
        if slot.is_none() {
            *slot = Some(reaper::spawn(self.clone(), self.inner.period));
        }
    }

    /// Stop the background reaper and wait for it to exit. No-op when it is
    /// not running; a later `start_ttl_processing` may restart it.
    pub async fn stop_ttl_processing(&self) {
        let handle = self.inner.reaper.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    /// Get or create the bucket for an expiration second. Creation is
    /// double-checked under the engine-wide guard.
    fn ensure_bucket(&self, bucket_key: &str) -> Arc<Bucket> {
        let _guard = self.inner.bucket_guard.lock();
        match self.inner.ttl_index.get(bucket_key) {
            Some(bucket) => bucket,
            None => {
                let bucket = Arc::new(Bucket::default());
                self.inner.ttl_index.put(bucket_key.to_string(), bucket.clone());
                bucket
            }
        }
    }

    /// Sweep every bucket from the last cleared second up to (excluding) the
    /// current one, removing records whose own expiration has passed.
    ///
    /// Bucket entries whose record was overwritten, removed, or pushed to a
    /// later expiration are skipped; the record is authoritative. Processed
    /// buckets are always dropped so the index cannot leak.
    pub(crate) fn clear_expired(&self) {
        let now = unix_now();
        let start = self.inner.last_cleared.load(Ordering::Relaxed);
        let mut removed = 0usize;
        for second in start..now {
            let bucket_key = second.to_string();
            let Some(bucket) = self.inner.ttl_index.get(&bucket_key) else {
                continue;
            };
            let keys = bucket.keys.lock().clone();
            for key in keys {
                let Some(record) = self.inner.data.get(&key) else {
                    continue;
                };
                if record.expires_at > 0 && record.expires_at <= now {
                    self.inner.data.remove(&key);
                    removed += 1;
                }
            }
            self.inner.ttl_index.remove(&bucket_key);
        }
        self.inner.last_cleared.store(now, Ordering::Relaxed);
        if removed > 0 {
            debug!(removed, "removed expired records");
        }
    }

    #[cfg(test)]
    fn ttl_bucket_exists(&self, second: i64) -> bool {
        self.inner.ttl_index.exists(&second.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    fn engine() -> Engine {
        Engine::new(10, false)
    }

    #[test]
    fn test_set_then_get() {
        let engine = engine();
        engine.set("t1", Value::scalar("v1"), 0);
        assert_eq!(engine.get("t1"), Some(Value::scalar("v1")));
        assert_eq!(engine.get_with_ttl("t1"), Some((Value::scalar("v1"), 0)));
    }

    #[test]
    fn test_get_absent() {
        assert_eq!(engine().get("missing"), None);
    }

    #[test]
    fn test_set_with_ttl_records_expiration() {
        let engine = engine();
        let before = unix_now();
        engine.set("t1", Value::scalar("v1"), 3600);
        let (_, expires_at) = engine.get_with_ttl("t1").unwrap();
        assert!(expires_at >= before + 3600);
        assert!(expires_at <= unix_now() + 3600);
        assert!(engine.ttl_bucket_exists(expires_at));
    }

    #[test]
    fn test_set_negative_ttl_inserts_then_deletes() {
        let engine = engine();
        engine.set("t1", Value::scalar("v1"), -5);
        assert_eq!(engine.get("t1"), None);
    }

    #[test]
    fn test_remove() {
        let engine = engine();
        engine.set("t1", Value::scalar("v1"), 0);
        assert!(engine.remove("t1"));
        assert_eq!(engine.get("t1"), None);
        assert!(!engine.remove("t1"));
    }

    #[test]
    fn test_update_absent_fails() {
        let engine = engine();
        assert_eq!(
            engine.update("t1", Value::scalar("v1"), 0),
            Err(StorageError::KeyNotFound)
        );
    }

    #[test]
    fn test_update_replaces_value() {
        let engine = engine();
        engine.set("t1", Value::scalar("v1"), 0);
        engine.update("t1", Value::scalar("vupdated"), 0).unwrap();
        assert_eq!(engine.get("t1"), Some(Value::scalar("vupdated")));
    }

    #[test]
    fn test_keys_contains_all() {
        let engine = engine();
        engine.set("k1", Value::scalar(1), 0);
        engine.set("k2", Value::scalar(2), 0);
        let keys = engine.keys();
        assert!(keys.contains(&"k1".to_string()));
        assert!(keys.contains(&"k2".to_string()));
    }

    #[test]
    fn test_list_element() {
        let engine = engine();
        engine.set("list", Value::from_json(json!([1, 2, 3])), 0);

        assert_eq!(engine.get_list_element("list", 1).unwrap(), json!(2));
        assert_eq!(
            engine.get_list_element("list", 100),
            Err(StorageError::OutOfBound)
        );
        assert_eq!(
            engine.get_list_element("list", -1),
            Err(StorageError::OutOfBound)
        );
        assert_eq!(
            engine.get_list_element("absent", 0),
            Err(StorageError::KeyNotFound)
        );

        engine.set("scalar", Value::scalar("x"), 0);
        assert_eq!(
            engine.get_list_element("scalar", 0),
            Err(StorageError::NotAList)
        );
    }

    #[test]
    fn test_dict_element() {
        let engine = engine();
        engine.set(
            "dict",
            Value::from_json(json!({"k1": 1, "k2": {"t1": 1, "t2": 2}})),
            0,
        );

        assert_eq!(
            engine.get_dict_element("dict", "k2").unwrap(),
            json!({"t1": 1, "t2": 2})
        );
        assert_eq!(
            engine.get_dict_element("dict", "absent"),
            Err(StorageError::DictKeyNotFound)
        );
        assert_eq!(
            engine.get_dict_element("absent", "k1"),
            Err(StorageError::KeyNotFound)
        );

        engine.set("scalar", Value::scalar("x"), 0);
        assert_eq!(
            engine.get_dict_element("scalar", "k1"),
            Err(StorageError::NotADict)
        );
    }

    #[test]
    fn test_sweep_removes_expired() {
        let engine = engine();
        engine.set("gone", Value::scalar("v"), 1);
        engine.set("kept", Value::scalar("v"), 0);
        let (_, expires_at) = engine.get_with_ttl("gone").unwrap();

        // The sweep range is half-open, so the expiration bucket is only
        // covered once the clock has passed a full second beyond it.
        thread::sleep(Duration::from_millis(2100));
        engine.clear_expired();

        assert_eq!(engine.get("gone"), None);
        assert_eq!(engine.get("kept"), Some(Value::scalar("v")));
        assert!(!engine.ttl_bucket_exists(expires_at));
    }

    #[test]
    fn test_sweep_skips_stale_bucket_entry() {
        let engine = engine();
        // First write schedules expiration; the second clears it. The old
        // bucket entry is now stale and must not remove the record.
        engine.set("t1", Value::scalar("old"), 1);
        engine.set("t1", Value::scalar("new"), 0);

        thread::sleep(Duration::from_millis(2100));
        engine.clear_expired();

        assert_eq!(engine.get("t1"), Some(Value::scalar("new")));
    }

    #[test]
    fn test_sweep_skips_extended_expiration() {
        let engine = engine();
        engine.set("t1", Value::scalar("v"), 1);
        engine.set("t1", Value::scalar("v"), 3600);

        thread::sleep(Duration::from_millis(2100));
        engine.clear_expired();

        assert_eq!(engine.get("t1"), Some(Value::scalar("v")));
    }

    #[test]
    fn test_concurrent_set_distinct_keys() {
        let engine = engine();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for j in 0..100 {
                        engine.set(&format!("key-{}-{}", i, j), Value::scalar(j), 0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(engine.keys().len(), 800);
    }

    #[test]
    fn test_concurrent_set_same_expiration_second() {
        let engine = engine();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        engine.set(&format!("key-{}-{}", i, j), Value::scalar(j), 3600);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Every key must survive the racing bucket creation.
        assert_eq!(engine.keys().len(), 400);
    }

    #[tokio::test]
    async fn test_reaper_removes_expired_records() {
        let engine = Engine::with_reaper_period(4, true, Duration::from_millis(100));
        engine.set("gone", Value::scalar("v"), 1);
        engine.set("kept", Value::scalar("v"), 0);

        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(engine.get("gone"), None);
        assert_eq!(engine.get("kept"), Some(Value::scalar("v")));
        engine.stop_ttl_processing().await;
    }

    #[tokio::test]
    async fn test_reaper_stop_is_idempotent_and_restartable() {
        let engine = Engine::with_reaper_period(4, true, Duration::from_millis(50));
        engine.stop_ttl_processing().await;
        engine.stop_ttl_processing().await;

        engine.start_ttl_processing();
        engine.stop_ttl_processing().await;
    }
}
