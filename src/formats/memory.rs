//! In-memory tracks
//!
//! `MemoryTrack` and `MemoryWriter` hold everything in RAM. They are handy
//! for embedding the engine in other tools and for tests.

use crate::core::{
    Interval, RecordOrder, TrackError, TrackExtent, TrackReader, TrackResult, TrackWriter,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Query counters shared between a [`MemoryTrack`] and its owner
#[derive(Debug, Default)]
pub struct QueryStats {
    queries: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl QueryStats {
    /// Total number of queries served
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Highest number of queries observed running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct Segment {
    start: u64,
    values: Vec<f32>,
}

impl Segment {
    fn stop(&self) -> u64 {
        self.start + self.values.len() as u64 - 1
    }
}

/// Track backed by per-chromosome value segments
#[derive(Debug)]
pub struct MemoryTrack {
    name: String,
    chroms: Vec<(String, Vec<Segment>)>,
    concurrent: bool,
    stats: Arc<QueryStats>,
}

impl MemoryTrack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chroms: Vec::new(),
            concurrent: true,
            stats: Arc::new(QueryStats::default()),
        }
    }

    /// Declare whether concurrent queries are allowed (default true)
    pub fn with_concurrent_queries(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn stats(&self) -> Arc<QueryStats> {
        Arc::clone(&self.stats)
    }

    /// Store `values` starting at 1-based position `start`
    pub fn insert_values(&mut self, chrom: &str, start: u64, values: Vec<f32>) {
        if values.is_empty() {
            return;
        }
        let segment = Segment { start, values };
        match self.chroms.iter_mut().find(|(c, _)| c == chrom) {
            Some((_, segments)) => segments.push(segment),
            None => self.chroms.push((chrom.to_string(), vec![segment])),
        }
    }

    /// Store a constant value over `start..=stop`
    pub fn insert_constant(&mut self, chrom: &str, start: u64, stop: u64, value: f32) {
        let len = (stop - start + 1) as usize;
        self.insert_values(chrom, start, vec![value; len]);
    }

    fn segments(&self, chrom: &str) -> Option<&[Segment]> {
        self.chroms
            .iter()
            .find(|(c, _)| c == chrom)
            .map(|(_, s)| s.as_slice())
    }
}

impl TrackReader for MemoryTrack {
    fn name(&self) -> &str {
        &self.name
    }

    fn chromosomes(&self) -> Vec<String> {
        self.chroms.iter().map(|(c, _)| c.clone()).collect()
    }

    fn extent(&self, chrom: &str) -> Option<TrackExtent> {
        let segments = self.segments(chrom)?;
        let start = segments.iter().map(|s| s.start).min()?;
        let stop = segments.iter().map(Segment::stop).max()?;
        Some(TrackExtent::new(chrom, start, stop))
    }

    fn query(&self, chrom: &str, start: u64, stop: u64) -> TrackResult<Vec<f32>> {
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(active, Ordering::SeqCst);
        self.stats.queries.fetch_add(1, Ordering::SeqCst);

        let result = (|| {
            if start > stop {
                return Err(TrackError::OutOfRange {
                    chrom: chrom.to_string(),
                    start,
                    stop,
                });
            }
            let segments = self
                .segments(chrom)
                .ok_or_else(|| TrackError::UnknownChromosome(chrom.to_string()))?;
            let mut out = vec![f32::NAN; (stop - start + 1) as usize];
            for seg in segments {
                let lo = seg.start.max(start);
                let hi = seg.stop().min(stop);
                if lo > hi {
                    continue;
                }
                let src = &seg.values[(lo - seg.start) as usize..=(hi - seg.start) as usize];
                out[(lo - start) as usize..=(hi - start) as usize].copy_from_slice(src);
            }
            Ok(out)
        })();

        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn supports_concurrent_queries(&self) -> bool {
        self.concurrent
    }
}

/// Records captured by a [`MemoryWriter`]
pub type WrittenRecords = Arc<Mutex<Vec<(Interval, Vec<f32>)>>>;

/// Writer that keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryWriter {
    records: WrittenRecords,
    closed: Arc<Mutex<bool>>,
    order: RecordOrder,
    fail_at: Option<usize>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with an I/O error when asked to write record number `n` (0-based)
    pub fn with_failure_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    /// Shared handle to the captured records
    pub fn records(&self) -> WrittenRecords {
        Arc::clone(&self.records)
    }

    /// Shared flag set once `close` has been called
    pub fn closed_flag(&self) -> Arc<Mutex<bool>> {
        Arc::clone(&self.closed)
    }

    fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl TrackWriter for MemoryWriter {
    fn write_record(&mut self, interval: &Interval, values: &[f32]) -> TrackResult<()> {
        if self.is_closed() {
            return Err(TrackError::Closed);
        }
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        if self.fail_at == Some(records.len()) {
            return Err(TrackError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated write failure",
            )));
        }
        self.order.check(interval, values)?;
        records.push((interval.clone(), values.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> TrackResult<()> {
        *self.closed.lock().unwrap_or_else(|p| p.into_inner()) = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_fills_gaps_with_nan() {
        let mut track = MemoryTrack::new("t");
        track.insert_values("chr1", 5, vec![1.0, 2.0]);
        track.insert_values("chr1", 10, vec![3.0]);

        let values = track.query("chr1", 4, 10).unwrap();
        assert_eq!(values.len(), 7);
        assert!(values[0].is_nan());
        assert_eq!(values[1], 1.0);
        assert_eq!(values[2], 2.0);
        assert!(values[3].is_nan());
        assert_eq!(values[6], 3.0);

        let extent = track.extent("chr1").unwrap();
        assert_eq!((extent.start, extent.stop), (5, 10));
        assert_eq!(track.stats().queries(), 1);
    }

    #[test]
    fn test_unknown_chromosome() {
        let track = MemoryTrack::new("t");
        assert!(matches!(
            track.query("chrX", 1, 2),
            Err(TrackError::UnknownChromosome(_))
        ));
        assert!(track.extent("chrX").is_none());
    }

    #[test]
    fn test_writer_records_and_close() {
        let mut writer = MemoryWriter::new();
        let records = writer.records();
        let closed = writer.closed_flag();
        let iv = Interval::new("chr1", 1, 2).unwrap();
        writer.write_record(&iv, &[1.0, 2.0]).unwrap();
        writer.close().unwrap();
        assert_eq!(records.lock().unwrap().len(), 1);
        assert!(*closed.lock().unwrap());
        assert!(matches!(
            writer.write_record(&Interval::new("chr1", 3, 3).unwrap(), &[0.0]),
            Err(TrackError::Closed)
        ));
    }

    #[test]
    fn test_writer_simulated_failure() {
        let mut writer = MemoryWriter::new().with_failure_at(1);
        writer
            .write_record(&Interval::new("chr1", 1, 1).unwrap(), &[0.0])
            .unwrap();
        assert!(matches!(
            writer.write_record(&Interval::new("chr1", 2, 2).unwrap(), &[0.0]),
            Err(TrackError::Io(_))
        ));
    }
}
