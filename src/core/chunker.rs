//! Fixed-size partitioning of an interval into chunks

use crate::core::interval::{Chunk, Interval};

/// Lazy iterator over the chunks of one interval
///
/// Cloning a `Chunker` restarts the sequence from its current position;
/// [`Chunker::new`] always starts from the first chunk.
#[derive(Debug, Clone)]
pub struct Chunker {
    interval: Interval,
    chunk_size: u64,
    next_start: Option<u64>,
    sequence: usize,
}

impl Chunker {
    /// Panics if `chunk_size` is zero; the config layer rejects it first.
    pub fn new(interval: Interval, chunk_size: u64) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        let next_start = Some(interval.start());
        Self {
            interval,
            chunk_size,
            next_start,
            sequence: 0,
        }
    }

    /// Total number of chunks the interval splits into
    pub fn num_chunks(&self) -> usize {
        self.interval.len().div_ceil(self.chunk_size) as usize
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }
}

impl Iterator for Chunker {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let start = self.next_start?;
        let stop = start
            .saturating_add(self.chunk_size - 1)
            .min(self.interval.stop());

        self.next_start = if stop >= self.interval.stop() {
            None
        } else {
            Some(stop + 1)
        };

        let chunk = Chunk::new(self.interval.sub(start, stop), self.sequence);
        self.sequence += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_chunks() - self.sequence;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunker {}

impl std::iter::FusedIterator for Chunker {}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(chunks: &[Chunk]) -> Vec<(u64, u64)> {
        chunks.iter().map(|c| (c.start(), c.stop())).collect()
    }

    #[test]
    fn test_last_chunk_truncated() {
        let iv = Interval::new("chrA", 500, 1000).unwrap();
        let chunks: Vec<_> = Chunker::new(iv, 400).collect();
        assert_eq!(bounds(&chunks), vec![(500, 899), (900, 1000)]);
        assert_eq!(chunks[0].sequence(), 0);
        assert_eq!(chunks[1].sequence(), 1);
    }

    #[test]
    fn test_chunk_size_larger_than_interval() {
        let iv = Interval::new("chr1", 1, 10).unwrap();
        let chunks: Vec<_> = Chunker::new(iv.clone(), 1_000).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].interval(), &iv);
    }

    #[test]
    fn test_exact_multiple() {
        let iv = Interval::new("chr1", 1, 30).unwrap();
        let chunker = Chunker::new(iv, 10);
        assert_eq!(chunker.num_chunks(), 3);
        assert_eq!(chunker.len(), 3);
        let chunks: Vec<_> = chunker.collect();
        assert_eq!(bounds(&chunks), vec![(1, 10), (11, 20), (21, 30)]);
    }

    #[test]
    fn test_restartable() {
        let iv = Interval::new("chr1", 1, 25).unwrap();
        let first: Vec<_> = Chunker::new(iv.clone(), 10).collect();
        let second: Vec<_> = Chunker::new(iv, 10).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_base() {
        let iv = Interval::new("chr1", 5, 5).unwrap();
        let chunks: Vec<_> = Chunker::new(iv, 1).collect();
        assert_eq!(bounds(&chunks), vec![(5, 5)]);
    }

    #[test]
    fn test_no_overflow_at_u64_max() {
        let iv = Interval::new("chr1", u64::MAX - 5, u64::MAX).unwrap();
        let chunks: Vec<_> = Chunker::new(iv, 4).collect();
        assert_eq!(
            bounds(&chunks),
            vec![(u64::MAX - 5, u64::MAX - 2), (u64::MAX - 1, u64::MAX)]
        );
    }
}
