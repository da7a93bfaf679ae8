//! Storage Errors
//!
//! The error strings are part of the HTTP contract and must stay stable.

use thiserror::Error;

/// Errors returned by engine lookups and element accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Key not found")]
    KeyNotFound,

    #[error("Value not List")]
    NotAList,

    #[error("Value not Dictionary")]
    NotADict,

    #[error("Out of bound")]
    OutOfBound,

    #[error("Key in dictionary not found")]
    DictKeyNotFound,
}
