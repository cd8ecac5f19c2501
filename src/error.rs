//! Error taxonomy for the storage core.
//!
//! Each layer has its own error type so callers can tell payload corruption
//! apart from backend failures: [`CodecError`] (compression),
//! [`DecodeError`] (malformed entity payload), [`KeyError`] (non-encodable
//! node), [`StoreError`] (backend/transaction), and [`BuildError`] (bulk
//! pipeline).

use thiserror::Error;

/// Compression or decompression failure. Distinct from storage errors;
/// on the decode side it indicates payload corruption.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{codec} encode failed: {source}")]
    Encode {
        codec: &'static str,
        source: std::io::Error,
    },
    #[error("{codec} decode failed: {source}")]
    Decode {
        codec: &'static str,
        source: std::io::Error,
    },
}

/// Malformed entity payload. Always a programming or corruption error,
/// never expected in normal operation.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload truncated at offset {0}")]
    Truncated(usize),
    #[error("invalid utf-8 in {0}")]
    Utf8(&'static str),
    #[error("unknown term kind {0}")]
    UnknownKind(u8),
}

/// A node that cannot be encoded into a storage key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("blank node is not addressable: {0}")]
    BlankNode(String),
    #[error("term is not an IRI: {0}")]
    NotAnIri(String),
    #[error("IRI contains control characters: {0}")]
    InvalidIri(String),
    #[error("malformed key: {0}")]
    Malformed(String),
}

/// Backend I/O or transaction failure, or an invalid operation against the
/// store lifecycle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,
    #[error("transaction already open")]
    NestedTransaction,
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure in the bulk index build pipeline. Any of these is fatal to the
/// build; a half-written index must be discarded by the caller.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("run spill failed: {0}")]
    Spill(std::io::Error),
    #[error("run merge failed: {0}")]
    Merge(std::io::Error),
    #[error("keys appended out of order")]
    OutOfOrder,
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("index write failed: {0}")]
    IndexWrite(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
