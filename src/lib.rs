//! CHUNKV - Sharded In-Memory JSON Key/Value Store
//!
//! An in-process key/value store for JSON-shaped values (scalars, lists,
//! dictionaries) with per-key TTL expiration, an HTTP/JSON API and optional
//! snapshotting to MongoDB.

pub mod persistence;
pub mod server;
pub mod storage;

pub use persistence::{
    restore, save, MemoryBackend, MongoBackend, PersistError, SnapshotBackend, SnapshotDocument,
};
pub use server::{AppState, Config, Resp, Server};
pub use storage::{ChunkedMap, Engine, Record, StorageError, Value, ValueKind};
