//! Bounded-memory external sort over raw byte items.
//!
//! [`ExternalSortWriter`] buffers items, sorts each full batch by raw
//! byte-lexicographic comparison, and spills it to a numbered run file on a
//! background thread. [`ExternalSortIterator`] then merges all runs through
//! a min-heap, yielding every item in fully sorted order while holding at
//! most one record per run in memory. Duplicates are preserved.
//!
//! Byte order on encoded keys equals IRI order on the decoded pairs because
//! the key encoding is monotone (see [`crate::keys`]), which is what lets
//! the bulk builder sort inverse keys without decoding them.
//!
//! Run files are uvarint length-prefixed records, whole-file zstd-compressed
//! when [`SortOptions::compress_runs`] is set.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use log::{debug, trace};

use crate::error::BuildError;
use crate::varint::{push_uvarint, read_uvarint_from};

/// Tuning for the sort engine. Defaults follow the original pipeline:
/// 100k-item batches, two concurrent spill threads, compressed runs.
#[derive(Debug, Clone)]
pub struct SortOptions {
    /// Items buffered before a batch is sorted and spilled.
    pub batch_size: usize,
    /// zstd-compress run files.
    pub compress_runs: bool,
    /// Maximum spill threads in flight.
    pub max_spill_threads: usize,
}

impl Default for SortOptions {
    fn default() -> Self {
        SortOptions {
            batch_size: 100_000,
            compress_runs: true,
            max_spill_threads: 2,
        }
    }
}

/// Accepts items in arbitrary order and spills sorted runs to `dir`.
pub struct ExternalSortWriter {
    dir: PathBuf,
    opts: SortOptions,
    buffer: Vec<Vec<u8>>,
    runs: Vec<PathBuf>,
    pending: Vec<JoinHandle<io::Result<()>>>,
    next_run: usize,
}

impl ExternalSortWriter {
    /// `dir` holds the temporary run files; it is created if missing and the
    /// caller owns its lifetime (a `tempfile::TempDir` works well).
    pub fn new(dir: impl Into<PathBuf>, opts: SortOptions) -> Result<Self, BuildError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(BuildError::Spill)?;
        Ok(ExternalSortWriter {
            dir,
            opts,
            buffer: Vec::new(),
            runs: Vec::new(),
            pending: Vec::new(),
            next_run: 0,
        })
    }

    /// Buffer one item, spilling a sorted run when the batch fills.
    pub fn send(&mut self, item: Vec<u8>) -> Result<(), BuildError> {
        self.buffer.push(item);
        if self.buffer.len() >= self.opts.batch_size {
            self.spill()?;
        }
        Ok(())
    }

    /// Spill whatever remains in the buffer, if anything.
    pub fn flush(&mut self) -> Result<(), BuildError> {
        if !self.buffer.is_empty() {
            self.spill()?;
        }
        Ok(())
    }

    /// Join every outstanding spill thread, surfacing the first failure.
    pub fn wait_for_completion(&mut self) -> Result<(), BuildError> {
        let mut first_err = None;
        for handle in self.pending.drain(..) {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(_) => {
                    if first_err.is_none() {
                        first_err =
                            Some(io::Error::new(io::ErrorKind::Other, "spill thread panicked"));
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(BuildError::Spill(e)),
            None => Ok(()),
        }
    }

    /// Finish spilling and merge all runs into one sorted stream.
    pub fn into_sorted_iter(mut self) -> Result<ExternalSortIterator, BuildError> {
        self.flush()?;
        self.wait_for_completion()?;
        debug!("merging {} sorted runs", self.runs.len());
        ExternalSortIterator::open(&self.runs, self.opts.compress_runs)
    }

    /// Number of runs spilled so far.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    fn spill(&mut self) -> Result<(), BuildError> {
        let mut batch = std::mem::take(&mut self.buffer);
        batch.sort_unstable();
        let path = self.dir.join(format!("run-{:05}.bin", self.next_run));
        self.next_run += 1;
        trace!("spilling {} items to {}", batch.len(), path.display());
        self.runs.push(path.clone());
        if self.pending.len() >= self.opts.max_spill_threads {
            // Bound concurrency by joining the oldest spill first.
            let handle = self.pending.remove(0);
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(BuildError::Spill(e)),
                Err(_) => {
                    return Err(BuildError::Spill(io::Error::new(
                        io::ErrorKind::Other,
                        "spill thread panicked",
                    )))
                }
            }
        }
        let compress = self.opts.compress_runs;
        self.pending
            .push(std::thread::spawn(move || write_run(&path, &batch, compress)));
        Ok(())
    }
}

fn write_records<W: Write>(w: &mut W, items: &[Vec<u8>]) -> io::Result<()> {
    let mut frame = Vec::with_capacity(10);
    for item in items {
        frame.clear();
        push_uvarint(item.len() as u64, &mut frame);
        w.write_all(&frame)?;
        w.write_all(item)?;
    }
    Ok(())
}

fn write_run(path: &Path, items: &[Vec<u8>], compress: bool) -> io::Result<()> {
    let file = File::create(path)?;
    if compress {
        let mut enc = zstd::stream::write::Encoder::new(file, 0)?;
        write_records(&mut enc, items)?;
        enc.finish()?;
    } else {
        let mut w = BufWriter::new(file);
        write_records(&mut w, items)?;
        w.flush()?;
    }
    Ok(())
}

fn open_run(path: &Path, compressed: bool) -> io::Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    if compressed {
        Ok(Box::new(zstd::stream::read::Decoder::new(file)?))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn next_record(r: &mut dyn Read) -> io::Result<Option<Vec<u8>>> {
    match read_uvarint_from(&mut *r)? {
        None => Ok(None),
        Some(len) => {
            let mut item = vec![0u8; len as usize];
            r.read_exact(&mut item)?;
            Ok(Some(item))
        }
    }
}

/// K-way merge across sorted run files. Yields items in nondecreasing byte
/// order; a merge error is fatal and ends the iteration.
pub struct ExternalSortIterator {
    readers: Vec<Box<dyn Read + Send>>,
    heap: BinaryHeap<Reverse<(Vec<u8>, usize)>>,
    failed: bool,
}

impl ExternalSortIterator {
    fn open(runs: &[PathBuf], compressed: bool) -> Result<Self, BuildError> {
        let mut readers = Vec::with_capacity(runs.len());
        let mut heap = BinaryHeap::with_capacity(runs.len());
        for (idx, path) in runs.iter().enumerate() {
            let mut reader = open_run(path, compressed).map_err(BuildError::Merge)?;
            if let Some(item) = next_record(reader.as_mut()).map_err(BuildError::Merge)? {
                heap.push(Reverse((item, idx)));
            }
            readers.push(reader);
        }
        Ok(ExternalSortIterator {
            readers,
            heap,
            failed: false,
        })
    }
}

impl Iterator for ExternalSortIterator {
    type Item = Result<Vec<u8>, BuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let Reverse((item, idx)) = self.heap.pop()?;
        match next_record(self.readers[idx].as_mut()) {
            Ok(Some(next)) => self.heap.push(Reverse((next, idx))),
            Ok(None) => {}
            Err(e) => {
                self.failed = true;
                return Some(Err(BuildError::Merge(e)));
            }
        }
        Some(Ok(item))
    }
}
