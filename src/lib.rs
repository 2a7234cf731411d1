//! FastTracks - chunked parallel computation over genome tracks
//!
//! Takes one or more base-pair resolution signal tracks, resolves the
//! region they cover, splits it into fixed-size chunks, runs a compute
//! function on every chunk in parallel and writes the results back out in
//! genomic order.
//!
//! # Features
//!
//! - Intersection or union of input extents
//! - Bounded memory: at most `threads + 2` chunks in flight
//! - Deterministic output order regardless of completion order
//! - Wiggle, bedGraph (plain, gzip, bzip2) and BigWig input
//!
//! # Example
//!
//! ```ignore
//! use fast_tracks::core::{EngineConfig, Job};
//! use fast_tracks::formats::{open_reader, open_writer};
//! use fast_tracks::kernels::Scale;
//!
//! let readers = vec![open_reader("signal.wig".as_ref())?];
//! let writer = open_writer("scaled.bedGraph".as_ref())?;
//! let mut job = Job::new(EngineConfig::default().with_threads(4), readers, writer)?;
//! let report = job.run(&Scale(2.0))?;
//! ```

pub mod core;
pub mod formats;
pub mod kernels;

// Re-export commonly used types
pub use core::{
    Chunk, ComputeContext, ComputeFunction, EngineConfig, EngineError, ExtentMode, Interval, Job,
    JobRegistry, JobReport, JobState, MultiTrack, SingleTrack, Strand, TrackError, TrackReader,
    TrackWriter,
};
pub use formats::{open_reader, open_writer};
