//! entitydb — per-subject entity description (CBD) storage core for RDF
//! quads.
//!
//! A store keeps, for each subject, the union of all statements made about
//! it across any number of graphs. Physically that is two ordered indexes:
//! a forward index `subject TAB graph -> payload` holding the compressed
//! predicate/object pairs of one entity description, and an inverse index
//! `graph TAB subject -> storage key` for graph-addressed enumeration and
//! deletion. This crate owns the byte-level key scheme, the payload
//! marshalling and codec pipeline, the CBD aggregation logic, and a bulk
//! loader that builds both indexes from one pre-sorted quad stream using an
//! external merge sort. Concrete storage engines plug in behind
//! [`kv::KvIndex`] (live stores) and [`bulk::IndexWriter`] (bulk-built
//! artifacts); an in-memory reference backend is included.
//!
//! Quick start: store and read back an entity
//!
//! ```
//! use entitydb::{EntityStore, Marshaller, MemoryEntityDatabase, Quad, Term};
//!
//! let mut db = MemoryEntityDatabase::memory(Marshaller::plain());
//! let s = Term::iri("http://example.org/alice");
//! let g = Term::iri("http://example.org/graph");
//! let quads = vec![Quad::new(
//!     s.clone(),
//!     Term::iri("http://xmlns.com/foaf/0.1/name"),
//!     Term::literal("Alice"),
//!     g.clone(),
//! )];
//!
//! db.put(&s, &g, &quads).expect("put");
//! assert_eq!(db.get(&s).expect("get"), quads);
//! ```
//!
//! Bulk-load a sorted quad stream into finished indexes
//!
//! ```no_run
//! use entitydb::bulk::{CancellationToken, DatabaseBuilder, MemoryIndexWriter};
//! use entitydb::{KvEntityDatabase, Marshaller};
//!
//! # let sorted_quads: Vec<entitydb::Quad> = Vec::new();
//! let builder = DatabaseBuilder::new(Marshaller::plain());
//! let mut forward = MemoryIndexWriter::new();
//! let mut inverse = MemoryIndexWriter::new();
//! let token = CancellationToken::new();
//! builder
//!     .build(sorted_quads, &mut forward, &mut inverse, "/tmp/spill".as_ref(), &token)
//!     .expect("build");
//! let db = KvEntityDatabase::from_indexes(
//!     forward.into_index(),
//!     inverse.into_index(),
//!     Marshaller::plain(),
//! );
//! # let _ = db;
//! ```

pub mod bulk;
pub mod codec;
pub mod db;
pub mod error;
pub mod keys;
pub mod kv;
pub mod model;
pub mod payload;
pub mod sort;
pub mod store;
mod varint;

pub use crate::bulk::{
    BuildStats, BuilderOptions, CancellationToken, DatabaseBuilder, EntitySink, IndexWriter,
    MemoryIndexWriter, StorageSink,
};
pub use crate::codec::{Codec, CodecChain, Gzip, Identity, Snappy, Zstd};
pub use crate::db::{KvEntityDatabase, MemoryEntityDatabase};
pub use crate::error::{BuildError, CodecError, DecodeError, KeyError, StoreError};
pub use crate::kv::{KvIndex, MemoryIndex};
pub use crate::model::{Quad, Term};
pub use crate::payload::{EntityDesc, Marshaller};
pub use crate::sort::{ExternalSortIterator, ExternalSortWriter, SortOptions};
pub use crate::store::{BlankNodePolicy, EntityStore};

/// Crate-level result type using the store error.
pub type Result<T> = std::result::Result<T, StoreError>;
