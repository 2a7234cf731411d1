//! Compute functions and the reader access they get
//!
//! A compute function turns one chunk into exactly one value per base. It
//! reads its inputs through a [`ComputeContext`], which applies the
//! per-reader locking policy.

use crate::core::error::{TrackError, TrackResult};
use crate::core::interval::{Chunk, Interval};
use crate::core::track::TrackReader;
use std::sync::Mutex;

struct ReaderSlot {
    reader: Box<dyn TrackReader>,
    /// Present only for readers that cannot serve concurrent queries
    lock: Option<Mutex<()>>,
}

/// The input tracks of a job, with per-reader query serialization
pub struct ReaderSet {
    slots: Vec<ReaderSlot>,
}

impl ReaderSet {
    pub fn new(readers: Vec<Box<dyn TrackReader>>) -> Self {
        let slots = readers
            .into_iter()
            .map(|reader| {
                let lock = if reader.supports_concurrent_queries() {
                    None
                } else {
                    Some(Mutex::new(()))
                };
                ReaderSlot { reader, lock }
            })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|s| s.reader.name())
    }

    /// Borrow every reader, in input order
    pub fn readers(&self) -> Vec<&dyn TrackReader> {
        self.slots.iter().map(|s| s.reader.as_ref()).collect()
    }

    /// Query reader `index`, serializing if the reader requires it.
    ///
    /// Panics if `index` is out of bounds.
    pub fn query(&self, index: usize, interval: &Interval) -> TrackResult<Vec<f32>> {
        let slot = &self.slots[index];
        // A poisoned lock only means another query panicked; the reader
        // itself holds no state guarded by it.
        let _guard = slot
            .lock
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
        slot.reader
            .query(interval.chrom(), interval.start(), interval.stop())
    }

    /// Close every reader, returning the first error.
    ///
    /// All readers are closed even if an earlier one fails.
    pub fn close_all(&mut self) -> TrackResult<()> {
        let mut first_err = None;
        for slot in &mut self.slots {
            if let Err(e) = slot.reader.close() {
                log::warn!("Failed to close track {}: {}", slot.reader.name(), e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// What a compute function may look at while processing a chunk
pub struct ComputeContext<'a> {
    readers: &'a ReaderSet,
}

impl<'a> ComputeContext<'a> {
    pub fn new(readers: &'a ReaderSet) -> Self {
        Self { readers }
    }

    /// Number of input tracks
    pub fn readers(&self) -> usize {
        self.readers.len()
    }

    pub fn reader_name(&self, index: usize) -> Option<&str> {
        self.readers.name(index)
    }

    pub fn query(&self, index: usize, interval: &Interval) -> TrackResult<Vec<f32>> {
        self.readers.query(index, interval)
    }

    /// Like [`ComputeContext::query`], but a track lacking the chromosome
    /// yields all-NaN values instead of an error. Union domains rely on it.
    pub fn query_or_missing(&self, index: usize, interval: &Interval) -> TrackResult<Vec<f32>> {
        match self.readers.query(index, interval) {
            Err(TrackError::UnknownChromosome(_)) => Ok(vec![f32::NAN; interval.len() as usize]),
            other => other,
        }
    }

    /// Query every input track over `interval`, in input order
    pub fn query_all(&self, interval: &Interval) -> TrackResult<Vec<Vec<f32>>> {
        (0..self.readers.len())
            .map(|i| self.query_or_missing(i, interval))
            .collect()
    }
}

/// Per-chunk transformation producing one value per base
///
/// Implementations must be deterministic: the engine never retries a
/// failed chunk.
pub trait ComputeFunction: Send + Sync {
    fn compute(&self, chunk: &Chunk, ctx: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>>;
}

impl<F> ComputeFunction for F
where
    F: Fn(&Chunk, &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> + Send + Sync,
{
    fn compute(&self, chunk: &Chunk, ctx: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> {
        self(chunk, ctx)
    }
}

/// Adapter for functions of the first input track only
pub struct SingleTrack<F>(pub F);

impl<F> ComputeFunction for SingleTrack<F>
where
    F: Fn(&Chunk, &[f32]) -> anyhow::Result<Vec<f32>> + Send + Sync,
{
    fn compute(&self, chunk: &Chunk, ctx: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> {
        let values = ctx.query(0, chunk.interval())?;
        (self.0)(chunk, &values)
    }
}

/// Adapter for functions of every input track
pub struct MultiTrack<F>(pub F);

impl<F> ComputeFunction for MultiTrack<F>
where
    F: Fn(&Chunk, &[Vec<f32>]) -> anyhow::Result<Vec<f32>> + Send + Sync,
{
    fn compute(&self, chunk: &Chunk, ctx: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> {
        let values = ctx.query_all(chunk.interval())?;
        (self.0)(chunk, &values)
    }
}
