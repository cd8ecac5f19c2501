//! Backend-generic entity database over a pair of ordered indexes.
//!
//! [`KvEntityDatabase`] implements the full [`EntityStore`] contract on top
//! of any [`KvIndex`] backend: the forward index maps
//! `subject TAB graph -> payload` and the inverse index maps
//! `graph TAB subject -> storage key`, so graph-addressed operations never
//! touch payload storage twice.

use log::{debug, info, warn};

use crate::error::{KeyError, StoreError};
use crate::keys::{inverse_key, key_prefix, split_key, storage_key};
use crate::kv::{KvEntries, KvIndex, MemoryIndex};
use crate::model::{Quad, Term};
use crate::payload::{EntityDesc, Marshaller};
use crate::store::{BlankNodePolicy, EntityEntries, EntityStore};

pub struct KvEntityDatabase<I: KvIndex> {
    forward: I,
    inverse: I,
    marshaller: Marshaller,
    policy: BlankNodePolicy,
    in_txn: bool,
    closed: bool,
}

/// The in-memory reference store.
pub type MemoryEntityDatabase = KvEntityDatabase<MemoryIndex>;

impl MemoryEntityDatabase {
    pub fn memory(marshaller: Marshaller) -> Self {
        KvEntityDatabase::new(MemoryIndex::new(), MemoryIndex::new(), marshaller)
    }
}

impl<I: KvIndex> KvEntityDatabase<I> {
    pub fn new(forward: I, inverse: I, marshaller: Marshaller) -> Self {
        KvEntityDatabase {
            forward,
            inverse,
            marshaller,
            policy: BlankNodePolicy::default(),
            in_txn: false,
            closed: false,
        }
    }

    pub fn with_policy(mut self, policy: BlankNodePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register a pair of bulk-built indexes as a live store. This is the
    /// commit step of a bulk build: both indexes must come from the same
    /// build.
    pub fn from_indexes(forward: I, inverse: I, marshaller: Marshaller) -> Self {
        info!(
            "registering bulk-built indexes ({} forward, {} inverse entries)",
            forward.len(),
            inverse.len()
        );
        KvEntityDatabase::new(forward, inverse, marshaller)
    }

    /// Entry counts of (forward, inverse) index.
    pub fn index_sizes(&self) -> (usize, usize) {
        (self.forward.len(), self.inverse.len())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Returns false when the operation should be skipped under the
    /// configured blank-node policy.
    fn check_addressable(&self, subject: &Term, graph: &Term) -> Result<bool, StoreError> {
        if subject.is_blank() || graph.is_blank() {
            return match self.policy {
                BlankNodePolicy::Skip => {
                    debug!("skipping blank-node entity {} {}", subject, graph);
                    Ok(false)
                }
                BlankNodePolicy::Reject => {
                    let label = if subject.is_blank() { subject } else { graph };
                    Err(KeyError::BlankNode(label.to_string()).into())
                }
            };
        }
        Ok(true)
    }
}

impl<I: KvIndex> EntityStore for KvEntityDatabase<I> {
    fn put(&mut self, subject: &Term, graph: &Term, quads: &[Quad]) -> Result<(), StoreError> {
        self.ensure_open()?;
        if !self.check_addressable(subject, graph)? {
            return Ok(());
        }
        debug!("storing entity {} {} ({} quads)", subject, graph, quads.len());
        let skey = storage_key(subject, graph)?;
        let ikey = inverse_key(subject, graph)?;
        let desc = self.marshaller.to_desc(subject, graph, quads)?;
        self.forward.insert(skey.clone(), desc.bytes)?;
        self.inverse.insert(ikey, skey)?;
        Ok(())
    }

    fn delete(&mut self, subject: &Term, graph: &Term) -> Result<(), StoreError> {
        self.ensure_open()?;
        if !self.check_addressable(subject, graph)? {
            return Ok(());
        }
        let skey = storage_key(subject, graph)?;
        let ikey = inverse_key(subject, graph)?;
        self.forward.remove(&skey)?;
        self.inverse.remove(&ikey)?;
        Ok(())
    }

    fn delete_graph(&mut self, graph: &Term) -> Result<(), StoreError> {
        self.ensure_open()?;
        let prefix = key_prefix(graph)?;
        // Collect first: the scan borrows the inverse index.
        let mut doomed: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for entry in self.inverse.scan_prefix(&prefix)? {
            let (ikey, skey) = entry?;
            let (g, _) = split_key(&ikey)?;
            if g != *graph {
                continue;
            }
            doomed.push((ikey, skey));
        }
        debug!("deleting {} entities under graph {}", doomed.len(), graph);
        for (ikey, skey) in doomed {
            self.forward.remove(&skey)?;
            self.inverse.remove(&ikey)?;
        }
        Ok(())
    }

    fn exists(&self, subject: &Term) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let prefix = key_prefix(subject)?;
        let mut scan = self.forward.scan_prefix(&prefix)?;
        match scan.next() {
            Some(Err(e)) => Err(e),
            other => Ok(other.is_some()),
        }
    }

    fn get(&self, subject: &Term) -> Result<Vec<Quad>, StoreError> {
        self.ensure_open()?;
        let prefix = key_prefix(subject)?;
        let mut quads = Vec::new();
        for entry in self.forward.scan_prefix(&prefix)? {
            let (key, value) = entry?;
            let (s, graph) = split_key(&key)?;
            if s != *subject {
                // Defensive: a prefix hit whose decoded subject differs.
                continue;
            }
            let desc = EntityDesc {
                subject: subject.clone(),
                graph,
                bytes: value,
            };
            quads.extend(self.marshaller.to_quads(&desc)?);
        }
        Ok(quads)
    }

    fn get_graph(&self, graph: &Term) -> Result<Vec<Quad>, StoreError> {
        self.ensure_open()?;
        let prefix = key_prefix(graph)?;
        let mut quads = Vec::new();
        for entry in self.inverse.scan_prefix(&prefix)? {
            let (ikey, skey) = entry?;
            let (g, subject) = split_key(&ikey)?;
            if g != *graph {
                continue;
            }
            // The payload lives in the forward index under the storage key
            // carried as this entry's value.
            let bytes = self.forward.get(&skey)?.ok_or_else(|| {
                warn!("dangling inverse entry for {} {}", subject, graph);
                StoreError::Backend(format!(
                    "inverse entry without forward payload: {} {}",
                    subject, graph
                ))
            })?;
            let desc = EntityDesc {
                subject,
                graph: graph.clone(),
                bytes,
            };
            quads.extend(self.marshaller.to_quads(&desc)?);
        }
        Ok(quads)
    }

    fn all(&self) -> Result<EntityEntries<'_>, StoreError> {
        self.ensure_open()?;
        let scan = self.forward.scan_prefix(&[])?;
        Ok(Box::new(AllEntities {
            scan: scan.peekable(),
            marshaller: &self.marshaller,
        }))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        info!("clearing entity database");
        self.forward.clear()?;
        self.inverse.clear()?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.in_txn {
            return Err(StoreError::NestedTransaction);
        }
        self.in_txn = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.in_txn = false;
        Ok(())
    }

    fn abort(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.in_txn = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }
}

/// Lazy grouping of a full forward-index scan by subject. One group per
/// contiguous run of keys sharing a subject, in key order.
struct AllEntities<'a> {
    scan: std::iter::Peekable<KvEntries<'a>>,
    marshaller: &'a Marshaller,
}

impl Iterator for AllEntities<'_> {
    type Item = Result<(Term, Vec<Quad>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = match self.scan.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        let (subject, graph) = match split_key(&key) {
            Ok(pair) => pair,
            Err(e) => return Some(Err(e.into())),
        };
        let mut quads = Vec::new();
        let desc = EntityDesc {
            subject: subject.clone(),
            graph,
            bytes: value,
        };
        match self.marshaller.to_quads(&desc) {
            Ok(q) => quads.extend(q),
            Err(e) => return Some(Err(e)),
        }

        // Absorb every following entry with the same subject.
        loop {
            let peeked: Option<Result<Term, ()>> = match self.scan.peek() {
                None => None,
                Some(Err(_)) => Some(Err(())),
                Some(Ok((k, _))) => match split_key(k) {
                    Ok((s, g)) if s == subject => Some(Ok(g)),
                    Ok(_) => None,
                    Err(e) => return Some(Err(e.into())),
                },
            };
            match peeked {
                None => break,
                Some(Err(())) => match self.scan.next() {
                    Some(Err(e)) => return Some(Err(e)),
                    _ => break,
                },
                Some(Ok(graph)) => {
                    let (_, value) = match self.scan.next() {
                        Some(Ok(entry)) => entry,
                        _ => break,
                    };
                    let desc = EntityDesc {
                        subject: subject.clone(),
                        graph,
                        bytes: value,
                    };
                    match self.marshaller.to_quads(&desc) {
                        Ok(q) => quads.extend(q),
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
        }
        Some(Ok((subject, quads)))
    }
}
