//! Chunked Concurrent Map
//!
//! Hash-partitioned map with one lock per chunk, so operations on different
//! keys rarely contend.

use hashbrown::HashMap;
use parking_lot::RwLock;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Concurrent map partitioned into independently locked chunks.
///
/// A chunk is selected by hashing the key modulo the chunk count, so every
/// single-key operation locks exactly one chunk. There are no compound
/// primitives (no update-if-present, no compare-and-swap); callers compose
/// the single-key operations and tolerate the races that implies.
#[derive(Debug)]
pub struct ChunkedMap<V> {
    chunks: Vec<RwLock<HashMap<String, V>>>,
}

impl<V> ChunkedMap<V> {
    /// Create a map with the given number of chunks (at least one).
    pub fn new(chunks: u32) -> Self {
        let chunks = chunks.max(1) as usize;
        Self {
            chunks: (0..chunks).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn chunk(&self, key: &str) -> &RwLock<HashMap<String, V>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.chunks[(hasher.finish() % self.chunks.len() as u64) as usize]
    }

    /// Insert or replace the value for a key.
    pub fn put(&self, key: String, value: V) {
        self.chunk(&key).write().insert(key, value);
    }

    /// Check whether a key is present.
    pub fn exists(&self, key: &str) -> bool {
        self.chunk(key).read().contains_key(key)
    }

    /// Delete a key, returning whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.chunk(key).write().remove(key).is_some()
    }

    /// Number of keys across all chunks.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.read().len()).sum()
    }

    /// Check whether the map holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all keys. Consistent per chunk; the snapshot may tear
    /// across chunks under concurrent writes. Order is unspecified.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for chunk in &self.chunks {
            keys.extend(chunk.read().keys().cloned());
        }
        keys
    }
}

impl<V: Clone> ChunkedMap<V> {
    /// Get the value for a key as a single-shot read.
    pub fn get(&self, key: &str) -> Option<V> {
        self.chunk(key).read().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_operations() {
        let map = ChunkedMap::new(8);

        map.put("key".to_string(), 42);
        assert_eq!(map.get("key"), Some(42));
        assert!(map.exists("key"));

        map.put("key".to_string(), 43);
        assert_eq!(map.get("key"), Some(43));

        assert!(map.remove("key"));
        assert!(!map.exists("key"));
        assert_eq!(map.get("key"), None);
    }

    #[test]
    fn test_remove_reports_presence() {
        let map: ChunkedMap<u32> = ChunkedMap::new(4);
        assert!(!map.remove("absent"));
        map.put("present".to_string(), 1);
        assert!(map.remove("present"));
        assert!(!map.remove("present"));
    }

    #[test]
    fn test_keys_snapshot() {
        let map = ChunkedMap::new(16);
        for i in 0..100 {
            map.put(format!("key{}", i), i);
        }
        let mut keys = map.keys();
        keys.sort();
        assert_eq!(keys.len(), 100);
        assert!(keys.contains(&"key0".to_string()));
        assert!(keys.contains(&"key99".to_string()));
        assert_eq!(map.len(), 100);
    }

    #[test]
    fn test_single_chunk() {
        let map = ChunkedMap::new(1);
        map.put("a".to_string(), "x");
        map.put("b".to_string(), "y");
        assert_eq!(map.get("a"), Some("x"));
        assert_eq!(map.get("b"), Some("y"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_zero_chunks_clamped() {
        let map = ChunkedMap::new(0);
        map.put("a".to_string(), 1);
        assert_eq!(map.get("a"), Some(1));
    }

    #[test]
    fn test_concurrent_writes() {
        let map = Arc::new(ChunkedMap::new(8));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let map = map.clone();
                thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("key-{}-{}", i, j);
                        map.put(key.clone(), j);
                        assert!(map.exists(&key));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(map.len(), 1000);
    }
}
