//! Bulk construction of both indexes from a sorted quad stream.
//!
//! The input must already be sorted by (subject, then graph). One linear
//! pass groups contiguous quads into entity descriptions and appends
//! `(storage key, payload)` to the forward index writer in arrival order —
//! arrival order equals final key order because the input and the forward
//! key share the (subject, graph) sort key. The inverse key of each entity
//! follows a different total order, so it is pushed into the external sort
//! engine instead; once the input is exhausted the sorted inverse keys are
//! drained into the inverse index writer. This builds two differently
//! ordered indexes from one pass without random-access inserts and without
//! holding the dataset in memory.
//!
//! Mis-sorted input silently splits groups; sorting is a precondition the
//! builder does not detect.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};

use crate::error::{BuildError, KeyError};
use crate::keys::{inverse_key, invert_key, storage_key};
use crate::kv::{KvIndex, MemoryIndex};
use crate::model::{Quad, Term};
use crate::payload::Marshaller;
use crate::sort::{ExternalSortWriter, SortOptions};
use crate::store::{BlankNodePolicy, EntityStore};

/// Cooperative cancellation for bulk builds.
///
/// Cloneable handle over a shared flag; checked at every input-consumption
/// point. Cancelling degrades the stream to "no more items" so concurrent
/// builds sharing one token stop cleanly instead of raising in every
/// pipeline. Once set it stays set until [`CancellationToken::clear`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        info!("cancellation requested for all builds sharing this token");
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sequential sink for one finished index artifact. The builder calls
/// `append` in nondecreasing key order; `finish` seals the artifact.
/// Concrete backends implement this over their native on-disk index format.
pub trait IndexWriter {
    fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), BuildError>;
    fn finish(&mut self) -> Result<(), BuildError>;
}

/// Reference [`IndexWriter`] producing a [`MemoryIndex`]. Enforces the
/// append-order contract so backend writers can rely on it.
#[derive(Debug, Default)]
pub struct MemoryIndexWriter {
    index: MemoryIndex,
    last: Option<Vec<u8>>,
    finished: bool,
}

impl MemoryIndexWriter {
    pub fn new() -> Self {
        MemoryIndexWriter::default()
    }

    /// The built index. Meaningful only after `finish`.
    pub fn into_index(self) -> MemoryIndex {
        debug_assert!(self.finished, "into_index before finish");
        self.index
    }
}

impl IndexWriter for MemoryIndexWriter {
    fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), BuildError> {
        if let Some(last) = &self.last {
            if last.as_slice() > key {
                return Err(BuildError::OutOfOrder);
            }
        }
        self.last = Some(key.to_vec());
        self.index
            .insert(key.to_vec(), value.to_vec())
            .map_err(BuildError::IndexWrite)
    }

    fn finish(&mut self) -> Result<(), BuildError> {
        self.finished = true;
        Ok(())
    }
}

/// Groups a stream of quads sorted by (subject, graph) into entity
/// descriptions. A change in either subject or graph closes the current
/// group.
#[derive(Debug, Default)]
pub struct EntitySink {
    buffer: Vec<Quad>,
    current: Option<(Term, Term)>,
    quad_count: u64,
}

/// One completed (subject, graph) group.
pub struct EntityGroup {
    pub subject: Term,
    pub graph: Term,
    pub quads: Vec<Quad>,
}

impl EntitySink {
    pub fn new() -> Self {
        EntitySink::default()
    }

    /// Accept one quad; returns the previous group when this quad starts a
    /// new one.
    pub fn send(&mut self, quad: Quad) -> Option<EntityGroup> {
        self.quad_count += 1;
        if self.quad_count % 100_000 == 0 {
            info!("quads processed: {}", self.quad_count);
        }
        let boundary = match &self.current {
            Some((s, g)) => *s != quad.subject || *g != quad.graph,
            None => true,
        };
        let finished = if boundary { self.take_group() } else { None };
        if boundary {
            self.current = Some((quad.subject.clone(), quad.graph.clone()));
        }
        self.buffer.push(quad);
        finished
    }

    /// Close and return the final group, if any.
    pub fn flush(&mut self) -> Option<EntityGroup> {
        self.take_group()
    }

    pub fn quad_count(&self) -> u64 {
        self.quad_count
    }

    fn take_group(&mut self) -> Option<EntityGroup> {
        let (subject, graph) = self.current.take()?;
        if self.buffer.is_empty() {
            return None;
        }
        Some(EntityGroup {
            subject,
            graph,
            quads: std::mem::take(&mut self.buffer),
        })
    }
}

/// Incremental loading sink: groups a sorted quad stream and `put`s each
/// finished entity into a live store. Per-entity failures are logged and
/// skipped so one bad entity does not abort a whole load.
pub struct StorageSink<'a, S: EntityStore> {
    store: &'a mut S,
    sink: EntitySink,
    flush_count: u64,
}

impl<'a, S: EntityStore> StorageSink<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        StorageSink {
            store,
            sink: EntitySink::new(),
            flush_count: 0,
        }
    }

    pub fn send(&mut self, quad: Quad) {
        if let Some(group) = self.sink.send(quad) {
            self.store_group(group);
        }
    }

    pub fn flush(&mut self) {
        if let Some(group) = self.sink.flush() {
            self.store_group(group);
        }
        debug!("sink flushed to storage {} times", self.flush_count);
    }

    pub fn quad_count(&self) -> u64 {
        self.sink.quad_count()
    }

    fn store_group(&mut self, group: EntityGroup) {
        self.flush_count += 1;
        if let Err(e) = self
            .store
            .put(&group.subject, &group.graph, &group.quads)
        {
            error!(
                "error storing entity for {} {}: {}",
                group.subject, group.graph, e
            );
        }
    }
}

/// Options for a bulk build.
#[derive(Debug, Clone, Default)]
pub struct BuilderOptions {
    pub sort: SortOptions,
    pub policy: BlankNodePolicy,
}

/// Outcome counters for a bulk build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Quads consumed from the input stream.
    pub quads: u64,
    /// Entity descriptions written to the forward index.
    pub entities: u64,
    /// Entities dropped (blank-node subject/graph under the skip policy, or
    /// per-entity encoding failures).
    pub skipped: u64,
    /// True when the build stopped early because the token was cancelled.
    /// The output is a clean but incomplete pair of indexes; the caller
    /// should discard it.
    pub cancelled: bool,
}

/// Builds a forward and an inverse index from one sorted quad stream.
pub struct DatabaseBuilder {
    marshaller: Marshaller,
    opts: BuilderOptions,
}

impl DatabaseBuilder {
    pub fn new(marshaller: Marshaller) -> Self {
        DatabaseBuilder {
            marshaller,
            opts: BuilderOptions::default(),
        }
    }

    pub fn with_options(marshaller: Marshaller, opts: BuilderOptions) -> Self {
        DatabaseBuilder { marshaller, opts }
    }

    /// Run the build: stream `quads` (sorted by subject, then graph) into
    /// `forward` while spilling inverse keys under `spill_dir`, then drain
    /// the sorted inverse keys into `inverse`.
    ///
    /// Writer and sort failures are fatal; per-entity encoding failures are
    /// logged, counted in [`BuildStats::skipped`], and do not abort the
    /// build. On cancellation the remaining input is abandoned but both
    /// writers are still finished so the stop is clean.
    pub fn build<Q, F, V>(
        &self,
        quads: Q,
        forward: &mut F,
        inverse: &mut V,
        spill_dir: &Path,
        token: &CancellationToken,
    ) -> Result<BuildStats, BuildError>
    where
        Q: IntoIterator<Item = Quad>,
        F: IndexWriter,
        V: IndexWriter,
    {
        info!("starting bulk index build");
        let mut sorter = ExternalSortWriter::new(spill_dir, self.opts.sort.clone())?;
        let mut sink = EntitySink::new();
        let mut stats = BuildStats::default();

        for quad in quads {
            if token.is_cancelled() {
                info!("bulk build cancelled after {} quads", stats.quads);
                stats.cancelled = true;
                break;
            }
            stats.quads += 1;
            if let Some(group) = sink.send(quad) {
                self.write_group(group, forward, &mut sorter, &mut stats)?;
            }
        }
        if !stats.cancelled {
            if let Some(group) = sink.flush() {
                self.write_group(group, forward, &mut sorter, &mut stats)?;
            }
        }
        forward.finish()?;
        debug!(
            "forward index complete: {} entities, {} runs spilled",
            stats.entities,
            sorter.run_count()
        );

        let sorted = sorter.into_sorted_iter()?;
        for item in sorted {
            let ikey = item?;
            let skey = invert_key(&ikey)?;
            inverse.append(&ikey, &skey)?;
        }
        inverse.finish()?;
        info!(
            "bulk build done: {} quads, {} entities, {} skipped{}",
            stats.quads,
            stats.entities,
            stats.skipped,
            if stats.cancelled { " (cancelled)" } else { "" }
        );
        Ok(stats)
    }

    fn write_group<F: IndexWriter>(
        &self,
        group: EntityGroup,
        forward: &mut F,
        sorter: &mut ExternalSortWriter,
        stats: &mut BuildStats,
    ) -> Result<(), BuildError> {
        if group.subject.is_blank() || group.graph.is_blank() {
            match self.opts.policy {
                BlankNodePolicy::Skip => {
                    debug!(
                        "skipping blank-node entity {} {}",
                        group.subject, group.graph
                    );
                    stats.skipped += 1;
                    return Ok(());
                }
                BlankNodePolicy::Reject => {
                    let label = if group.subject.is_blank() {
                        &group.subject
                    } else {
                        &group.graph
                    };
                    return Err(KeyError::BlankNode(label.to_string()).into());
                }
            }
        }
        let keys = storage_key(&group.subject, &group.graph)
            .and_then(|skey| inverse_key(&group.subject, &group.graph).map(|ikey| (skey, ikey)));
        let (skey, ikey) = match keys {
            Ok(pair) => pair,
            Err(e) => {
                error!(
                    "skipping unencodable entity {} {}: {}",
                    group.subject, group.graph, e
                );
                stats.skipped += 1;
                return Ok(());
            }
        };
        let desc = match self
            .marshaller
            .to_desc(&group.subject, &group.graph, &group.quads)
        {
            Ok(desc) => desc,
            Err(e) => {
                error!(
                    "skipping unserializable entity {} {}: {}",
                    group.subject, group.graph, e
                );
                stats.skipped += 1;
                return Ok(());
            }
        };
        forward.append(&skey, &desc.bytes)?;
        sorter.send(ikey)?;
        stats.entities += 1;
        Ok(())
    }
}
