//! The operation contract every backend-facing store exposes.

use crate::error::StoreError;
use crate::model::{Quad, Term};

/// What to do with a blank-node subject or graph at the storage boundary.
///
/// Historically blank subjects were silently excluded from persistence;
/// that stays the default, with strict rejection available for callers that
/// prefer an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlankNodePolicy {
    /// Treat the operation as a no-op (historical behavior).
    #[default]
    Skip,
    /// Fail with `KeyError::BlankNode`.
    Reject,
}

/// Iterator over `(subject, quads-for-subject)` groups in subject order.
pub type EntityEntries<'a> =
    Box<dyn Iterator<Item = Result<(Term, Vec<Quad>), StoreError>> + 'a>;

/// A store of entity descriptions, addressable by subject and by graph.
///
/// Per-entity writes are expected to be serialized by the caller at
/// (subject, graph) granularity; the core provides no cross-entity atomicity
/// beyond what the backend's transaction primitives offer.
pub trait EntityStore {
    /// Replace whatever exists at (`subject`, `graph`) with `quads`.
    fn put(&mut self, subject: &Term, graph: &Term, quads: &[Quad]) -> Result<(), StoreError>;

    /// Remove one entity description. No error if absent.
    fn delete(&mut self, subject: &Term, graph: &Term) -> Result<(), StoreError>;

    /// Remove every entity description under `graph`.
    fn delete_graph(&mut self, graph: &Term) -> Result<(), StoreError>;

    /// True if any entity description exists for `subject`.
    fn exists(&self, subject: &Term) -> Result<bool, StoreError>;

    /// The union of all statements about `subject` across every graph
    /// (its concise bounded description).
    fn get(&self, subject: &Term) -> Result<Vec<Quad>, StoreError>;

    /// Every quad stored under `graph`.
    fn get_graph(&self, graph: &Term) -> Result<Vec<Quad>, StoreError>;

    /// Lazy single pass over all subjects in order, each with its full quad
    /// set. Restartable only by calling `all` again. Iterating while the
    /// store is concurrently mutated is undefined behavior.
    fn all(&self) -> Result<EntityEntries<'_>, StoreError>;

    /// Discard all data.
    fn clear(&mut self) -> Result<(), StoreError>;

    /// Open a transaction bracket. Backends without a native transaction
    /// concept treat this as a no-op, but a nested `begin` is always an
    /// error.
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Safe to call with no open transaction (no-op).
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Safe to call with no open transaction (no-op).
    fn abort(&mut self) -> Result<(), StoreError>;

    /// Release resources. Further calls fail with `StoreError::Closed`.
    fn close(&mut self) -> Result<(), StoreError>;
}
