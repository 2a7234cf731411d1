//! Track reader and writer contracts
//!
//! The engine only talks to track files through these two traits; the
//! concrete codecs live in [`crate::formats`].

use crate::core::error::TrackResult;
use crate::core::interval::Interval;

/// Per-chromosome bounds of the data held by one reader (1-based, inclusive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackExtent {
    pub chrom: String,
    pub start: u64,
    pub stop: u64,
}

impl TrackExtent {
    pub fn new(chrom: impl Into<String>, start: u64, stop: u64) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            stop,
        }
    }
}

/// Random-access source of per-base values
pub trait TrackReader: Send + Sync {
    /// Human readable name, used in logs
    fn name(&self) -> &str;

    /// Chromosomes held by this track, in file order
    fn chromosomes(&self) -> Vec<String>;

    /// Covered range for `chrom`, or `None` if the track lacks it
    fn extent(&self, chrom: &str) -> Option<TrackExtent>;

    /// Values for `start..=stop`; missing data is NaN.
    ///
    /// Must return exactly `stop - start + 1` values.
    fn query(&self, chrom: &str, start: u64, stop: u64) -> TrackResult<Vec<f32>>;

    /// Whether `query` may be called from several threads at once.
    /// The engine serializes queries to readers that return false.
    fn supports_concurrent_queries(&self) -> bool {
        false
    }

    fn close(&mut self) -> TrackResult<()> {
        Ok(())
    }
}

/// Append-only sink for computed values
///
/// Records must arrive in increasing, non-overlapping order within a
/// chromosome, one chromosome at a time.
pub trait TrackWriter: Send {
    fn write_record(&mut self, interval: &Interval, values: &[f32]) -> TrackResult<()>;

    fn close(&mut self) -> TrackResult<()>;
}

impl<W: TrackWriter + ?Sized> TrackWriter for Box<W> {
    fn write_record(&mut self, interval: &Interval, values: &[f32]) -> TrackResult<()> {
        (**self).write_record(interval, values)
    }

    fn close(&mut self) -> TrackResult<()> {
        (**self).close()
    }
}

/// Enforces the writer ordering contract
///
/// Shared by the concrete writers so every sink rejects the same records.
#[derive(Debug, Default)]
pub(crate) struct RecordOrder {
    current: Option<(String, u64)>,
    finished: std::collections::HashSet<String>,
}

impl RecordOrder {
    /// Validate `interval`/`values` against everything written so far and
    /// remember it as the new tail.
    pub(crate) fn check(&mut self, interval: &Interval, values: &[f32]) -> TrackResult<()> {
        use crate::core::error::TrackError;

        if values.len() as u64 != interval.len() {
            return Err(TrackError::LengthMismatch {
                chrom: interval.chrom().to_string(),
                start: interval.start(),
                stop: interval.stop(),
                actual: values.len(),
            });
        }

        let out_of_order = |last: String| TrackError::OutOfOrder {
            chrom: interval.chrom().to_string(),
            start: interval.start(),
            stop: interval.stop(),
            last,
        };

        match self.current.take() {
            Some((chrom, last_stop)) if chrom == interval.chrom() => {
                if interval.start() <= last_stop {
                    let last = format!("{}:{}", chrom, last_stop);
                    self.current = Some((chrom, last_stop));
                    return Err(out_of_order(last));
                }
            }
            Some((chrom, last_stop)) => {
                if self.finished.contains(interval.chrom()) {
                    let last = format!("{}:{}", chrom, last_stop);
                    self.current = Some((chrom, last_stop));
                    return Err(out_of_order(last));
                }
                self.finished.insert(chrom);
            }
            None => {}
        }

        self.current = Some((interval.chrom().to_string(), interval.stop()));
        Ok(())
    }

    /// True when `interval` directly continues the previous record
    pub(crate) fn is_contiguous(&self, interval: &Interval) -> bool {
        matches!(&self.current, Some((chrom, stop)) if chrom == interval.chrom() && stop + 1 == interval.start())
    }
}
