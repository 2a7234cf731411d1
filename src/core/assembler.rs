//! Ordered result assembly
//!
//! Chunks finish in whatever order the workers get to them, but track
//! writers need strictly increasing positions. The assembler holds back
//! results that arrive early and releases them as soon as every earlier
//! chunk of the chromosome has been written.

use crate::core::error::{EngineError, EngineResult};
use crate::core::interval::Chunk;
use crate::core::track::TrackWriter;
use std::collections::BTreeMap;

/// What happened to one chunk
#[derive(Debug)]
pub enum ChunkOutcome {
    /// Values computed and validated
    Completed(Vec<f32>),
    /// Compute, validation or reader failure
    Failed(EngineError),
    /// Not started because the job was stopping
    Skipped,
}

/// Result of one chunk, produced exactly once by the scheduler
#[derive(Debug)]
pub struct ChunkResult {
    pub chunk: Chunk,
    pub outcome: ChunkOutcome,
}

impl ChunkResult {
    pub fn completed(chunk: Chunk, values: Vec<f32>) -> Self {
        Self {
            chunk,
            outcome: ChunkOutcome::Completed(values),
        }
    }

    pub fn failed(chunk: Chunk, error: EngineError) -> Self {
        Self {
            chunk,
            outcome: ChunkOutcome::Failed(error),
        }
    }

    pub fn skipped(chunk: Chunk) -> Self {
        Self {
            chunk,
            outcome: ChunkOutcome::Skipped,
        }
    }
}

/// Reorders the results of one chromosome and streams them to a writer
#[derive(Debug)]
pub struct ResultAssembler {
    chrom: String,
    next_expected: usize,
    held: BTreeMap<usize, (Chunk, Vec<f32>)>,
    max_held: usize,
    bases_written: u64,
}

impl ResultAssembler {
    pub fn new(chrom: impl Into<String>) -> Self {
        Self {
            chrom: chrom.into(),
            next_expected: 0,
            held: BTreeMap::new(),
            max_held: 0,
            bases_written: 0,
        }
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    /// Sequence number of the next chunk to be written; equals the number
    /// of chunks written so far.
    pub fn next_expected(&self) -> usize {
        self.next_expected
    }

    /// Results currently held back
    pub fn pending(&self) -> usize {
        self.held.len()
    }

    /// High-water mark of [`ResultAssembler::pending`]
    pub fn max_pending(&self) -> usize {
        self.max_held
    }

    pub fn bases_written(&self) -> u64 {
        self.bases_written
    }

    /// Take one result and write everything that has become writable.
    ///
    /// Failed results are returned as errors, skipped ones as
    /// [`EngineError::Cancelled`]. Returns the number of records written.
    pub fn accept<W: TrackWriter + ?Sized>(
        &mut self,
        result: ChunkResult,
        writer: &mut W,
    ) -> EngineResult<usize> {
        let ChunkResult { chunk, outcome } = result;
        let values = match outcome {
            ChunkOutcome::Completed(values) => values,
            ChunkOutcome::Failed(err) => return Err(err),
            ChunkOutcome::Skipped => return Err(EngineError::Cancelled),
        };

        let sequence = chunk.sequence();
        if chunk.chrom() != self.chrom
            || sequence < self.next_expected
            || self.held.contains_key(&sequence)
        {
            return Err(EngineError::DuplicateChunk {
                chrom: chunk.chrom().to_string(),
                sequence,
            });
        }

        self.held.insert(sequence, (chunk, values));
        self.max_held = self.max_held.max(self.held.len());

        let mut written = 0;
        while let Some((chunk, values)) = self.held.remove(&self.next_expected) {
            log::trace!("Writing chunk {}", chunk);
            writer.write_record(chunk.interval(), &values)?;
            self.bases_written += chunk.len();
            self.next_expected += 1;
            written += 1;
        }
        Ok(written)
    }

    /// Check that nothing is left behind once all results were delivered
    pub fn finish(self) -> EngineResult<()> {
        if self.held.is_empty() {
            Ok(())
        } else {
            Err(EngineError::IncompleteChromosome {
                chrom: self.chrom,
                pending: self.held.len(),
                next_expected: self.next_expected,
            })
        }
    }
}
