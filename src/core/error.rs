//! Error types for FastTracks
//!
//! Defines the engine error taxonomy and the track I/O errors raised by
//! the format layer.

use crate::core::job::{JobId, JobState};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of engine failures
///
/// Callers that only need to decide "retry / discard / ignore" can match on
/// this instead of the full [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoInputs,
    EmptyDomain,
    LengthMismatch,
    ComputeFailure,
    IoFailure,
    Cancelled,
    Config,
    Internal,
}

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// No track readers were supplied to the job
    #[error("No input tracks supplied")]
    NoInputs,

    /// The resolved processing domain has no chromosomes
    #[error("Resolved processing domain is empty")]
    EmptyDomain,

    /// A compute function returned the wrong number of values
    #[error("Compute function returned {actual} values for chunk {chunk}, expected {expected}")]
    LengthMismatch {
        chunk: String,
        expected: u64,
        actual: usize,
    },

    /// A compute function raised an error
    #[error("Compute function failed on chunk {chunk}: {source}")]
    ComputeFailure {
        chunk: String,
        #[source]
        source: anyhow::Error,
    },

    /// Reader or writer failure
    #[error("Track I/O error: {0}")]
    Io(#[from] TrackError),

    /// The job was cancelled before it finished
    #[error("Job cancelled")]
    Cancelled,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Interval starting at 0 or with start after stop
    #[error("Invalid interval {start}-{stop}: expected 1 <= start <= stop")]
    InvalidInterval { start: u64, stop: u64 },

    /// A chunk result was delivered twice
    #[error("Duplicate result for chunk {sequence} of {chrom}")]
    DuplicateChunk { chrom: String, sequence: usize },

    /// A chromosome was closed while results were still held back
    #[error("Chromosome {chrom} finished with {pending} unwritten chunk(s), next expected {next_expected}")]
    IncompleteChromosome {
        chrom: String,
        pending: usize,
        next_expected: usize,
    },

    /// Operation attempted on a job in a terminal state
    #[error("Job already finished in state {0}")]
    JobFinished(JobState),

    /// Worker pool could not be created
    #[error("Failed to create worker pool: {0}")]
    ThreadPool(String),

    /// Job id not present in the registry
    #[error("Unknown job: {0}")]
    UnknownJob(JobId),

    /// Job id already registered
    #[error("Job {0} is already registered")]
    DuplicateJob(JobId),

    /// Attempt to forget a job that has not finished
    #[error("Job {0} is still active")]
    JobActive(JobId),
}

impl EngineError {
    /// Map this error onto the coarse taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NoInputs => ErrorKind::NoInputs,
            EngineError::EmptyDomain => ErrorKind::EmptyDomain,
            EngineError::LengthMismatch { .. } => ErrorKind::LengthMismatch,
            EngineError::ComputeFailure { .. } => ErrorKind::ComputeFailure,
            EngineError::Io(_) => ErrorKind::IoFailure,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::InvalidConfig(_) | EngineError::InvalidInterval { .. } => ErrorKind::Config,
            EngineError::DuplicateChunk { .. }
            | EngineError::IncompleteChromosome { .. }
            | EngineError::JobFinished(_)
            | EngineError::ThreadPool(_)
            | EngineError::UnknownJob(_)
            | EngineError::DuplicateJob(_)
            | EngineError::JobActive(_) => ErrorKind::Internal,
        }
    }

    /// Classify an error coming out of a compute function.
    ///
    /// Reader failures travel through `anyhow` inside the compute function;
    /// they are reported as I/O failures rather than compute failures.
    pub(crate) fn from_compute(chunk: String, err: anyhow::Error) -> Self {
        match err.downcast::<TrackError>() {
            Ok(track_err) => EngineError::Io(track_err),
            Err(err) => EngineError::ComputeFailure { chunk, source: err },
        }
    }
}

/// Errors raised by track readers and writers
#[derive(Debug, Error)]
pub enum TrackError {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed track file content
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Track file not found
    #[error("Track file not found: {0}")]
    FileNotFound(PathBuf),

    /// Chromosome not present in the track
    #[error("Chromosome not found in track: {0}")]
    UnknownChromosome(String),

    /// Query outside the addressable range
    #[error("Query {chrom}:{start}-{stop} is out of range")]
    OutOfRange { chrom: String, start: u64, stop: u64 },

    /// Writer received a record out of genomic order
    #[error("Record {chrom}:{start}-{stop} written out of order (last written: {last})")]
    OutOfOrder {
        chrom: String,
        start: u64,
        stop: u64,
        last: String,
    },

    /// Writer received values that do not match the record length
    #[error("Record {chrom}:{start}-{stop} has {actual} values")]
    LengthMismatch {
        chrom: String,
        start: u64,
        stop: u64,
        actual: usize,
    },

    /// BigWig backend error
    #[error("BigWig error: {0}")]
    BigWig(String),

    /// Writer already closed
    #[error("Track writer already closed")]
    Closed,
}

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for track I/O operations
pub type TrackResult<T> = std::result::Result<T, TrackError>;
