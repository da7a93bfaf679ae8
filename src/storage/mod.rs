//! Storage Engine
//!
//! Sharded in-memory key-value store with TTL-indexed background expiration.

mod chunked_map;
mod engine;
mod error;
mod reaper;
mod value;

pub use chunked_map::ChunkedMap;
pub use engine::Engine;
pub use error::StorageError;
pub use value::{Record, Value, ValueKind};

/// Current wall-clock time as whole seconds since the Unix epoch.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
