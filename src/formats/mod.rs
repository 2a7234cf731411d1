//! Track file adapters
//!
//! Readers and writers for Wiggle, bedGraph and BigWig, plus in-memory
//! tracks. [`open_reader`] and [`open_writer`] pick an adapter from the
//! file name.

pub mod bedgraph;
pub mod bigwig;
pub mod memory;
pub mod wig;

pub use bedgraph::{BedGraphRecord, BedGraphWriter};
pub use bigwig::BigWigTrack;
pub use memory::{MemoryTrack, MemoryWriter, QueryStats, WrittenRecords};
pub use wig::{WigDataPoint, WigDeclaration, WigFormat, WigReader, WigTrack, WigWriter};

use crate::core::{TrackReader, TrackResult, TrackWriter};
use std::path::Path;

/// Lower-cased extension, ignoring a trailing `.gz`
fn format_extension(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_string(),
        None => String::new(),
    }
}

/// Open an input track: BigWig for `.bw`/`.bigwig`, Wiggle/bedGraph otherwise
pub fn open_reader(path: &Path) -> TrackResult<Box<dyn TrackReader>> {
    match format_extension(path).as_str() {
        "bw" | "bigwig" => Ok(Box::new(BigWigTrack::open(path)?)),
        _ => Ok(Box::new(WigTrack::open(path)?)),
    }
}

/// Create an output track: bedGraph for `.bedGraph`/`.bg`/`.bdg`, Wiggle otherwise
pub fn open_writer(path: &Path) -> TrackResult<Box<dyn TrackWriter>> {
    match format_extension(path).as_str() {
        "bedgraph" | "bg" | "bdg" => Ok(Box::new(BedGraphWriter::create(path)?)),
        _ => Ok(Box::new(WigWriter::create(path)?)),
    }
}
