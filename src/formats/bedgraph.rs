//! bedGraph output
//!
//! Runs of identical values are merged into one line, also across record
//! boundaries. NaN bases are not written.

use crate::core::io::TextWriter;
use crate::core::{Interval, RecordOrder, TrackError, TrackResult, TrackWriter};
use std::io::Write;
use std::path::Path;

/// bedGraph record (0-based, half-open)
#[derive(Debug, Clone, PartialEq)]
pub struct BedGraphRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub value: f32,
}

impl BedGraphRecord {
    /// Format as bedGraph line
    pub fn to_line(&self) -> String {
        format!("{}\t{}\t{}\t{}", self.chrom, self.start, self.end, self.value)
    }
}

pub struct BedGraphWriter {
    out: Option<TextWriter>,
    order: RecordOrder,
    run: Option<BedGraphRecord>,
    lines: u64,
}

impl BedGraphWriter {
    /// Create the output file; `.gz` paths are gzip-compressed
    pub fn create(path: &Path) -> TrackResult<Self> {
        Ok(Self {
            out: Some(TextWriter::create(path)?),
            order: RecordOrder::default(),
            run: None,
            lines: 0,
        })
    }

    /// Number of lines written so far
    pub fn lines(&self) -> u64 {
        self.lines
    }

    fn flush_run(&mut self) -> TrackResult<()> {
        if let Some(run) = self.run.take() {
            let out = self.out.as_mut().ok_or(TrackError::Closed)?;
            writeln!(out, "{}", run.to_line())?;
            self.lines += 1;
        }
        Ok(())
    }
}

impl TrackWriter for BedGraphWriter {
    fn write_record(&mut self, interval: &Interval, values: &[f32]) -> TrackResult<()> {
        if self.out.is_none() {
            return Err(TrackError::Closed);
        }
        self.order.check(interval, values)?;

        for (offset, &value) in values.iter().enumerate() {
            let pos = interval.start() - 1 + offset as u64; // 0-based
            if value.is_nan() {
                self.flush_run()?;
                continue;
            }
            let extends = matches!(
                &self.run,
                Some(run) if run.chrom == interval.chrom() && run.end == pos && run.value == value
            );
            if extends {
                if let Some(run) = self.run.as_mut() {
                    run.end += 1;
                }
            } else {
                self.flush_run()?;
                self.run = Some(BedGraphRecord {
                    chrom: interval.chrom().to_string(),
                    start: pos,
                    end: pos + 1,
                    value,
                });
            }
        }
        Ok(())
    }

    fn close(&mut self) -> TrackResult<()> {
        if self.out.is_none() {
            return Ok(());
        }
        self.flush_run()?;
        if let Some(out) = self.out.take() {
            out.finish()?;
        }
        Ok(())
    }
}
