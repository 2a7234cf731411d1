//! Core track computation engine
//!
//! Extent resolution, chunking, parallel scheduling, ordered result
//! assembly and job orchestration. File formats live in
//! [`crate::formats`].

mod assembler;
mod chunker;
mod compute;
pub mod config;
mod error;
mod extent;
pub mod io;
mod interval;
mod job;
mod scheduler;
mod track;

pub use assembler::{ChunkOutcome, ChunkResult, ResultAssembler};
pub use chunker::Chunker;
pub use compute::{ComputeContext, ComputeFunction, MultiTrack, ReaderSet, SingleTrack};
pub use config::{EngineConfig, OptionKind, OptionSpec, DEFAULT_CHUNK_SIZE, OPTIONS};
pub use error::{EngineError, EngineResult, ErrorKind, TrackError, TrackResult};
pub use extent::{resolve_domain, ExtentMode, ProcessingDomain};
pub use interval::{Chunk, Interval, Strand};
pub use job::{Job, JobId, JobRegistry, JobReport, JobState};
pub use scheduler::{CancellationToken, ChromosomeStats, Scheduler, LOOKAHEAD};
pub use track::{TrackExtent, TrackReader, TrackWriter};
pub(crate) use track::RecordOrder;
