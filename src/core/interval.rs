//! Genomic intervals and scheduling chunks
//!
//! All coordinates are 1-based and inclusive, following the Wiggle
//! convention: `length = stop - start + 1`.

use crate::core::error::{EngineError, EngineResult};
use std::fmt;

/// Strand orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Plus,
    Minus,
}

impl Strand {
    /// Parse strand from char
    ///
    /// # Examples
    /// ```
    /// use fast_tracks::core::Strand;
    /// assert_eq!(Strand::from_char('+'), Some(Strand::Plus));
    /// assert_eq!(Strand::from_char('-'), Some(Strand::Minus));
    /// assert_eq!(Strand::from_char('.'), None);
    /// ```
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Plus),
            '-' => Some(Strand::Minus),
            _ => None,
        }
    }

    /// Convert to char
    pub fn to_char(&self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// An immutable, inclusive genomic range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    chrom: String,
    start: u64,
    stop: u64,
    strand: Option<Strand>,
}

impl Interval {
    /// Create an unstranded interval, rejecting `start == 0` and `start > stop`
    pub fn new(chrom: impl Into<String>, start: u64, stop: u64) -> EngineResult<Self> {
        if start == 0 || start > stop {
            return Err(EngineError::InvalidInterval { start, stop });
        }
        Ok(Self {
            chrom: chrom.into(),
            start,
            stop,
            strand: None,
        })
    }

    /// Same as [`Interval::new`] with a strand attached
    pub fn with_strand(
        chrom: impl Into<String>,
        start: u64,
        stop: u64,
        strand: Strand,
    ) -> EngineResult<Self> {
        let mut interval = Self::new(chrom, start, stop)?;
        interval.strand = Some(strand);
        Ok(interval)
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn stop(&self) -> u64 {
        self.stop
    }

    pub fn strand(&self) -> Option<Strand> {
        self.strand
    }

    /// Number of bases covered
    pub fn len(&self) -> u64 {
        self.stop - self.start + 1
    }

    /// Always false: an interval covers at least one base
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Check whether `pos` lies inside the interval
    pub fn contains(&self, pos: u64) -> bool {
        pos >= self.start && pos <= self.stop
    }

    /// Sub-interval on the same chromosome; bounds must lie inside `self`
    pub(crate) fn sub(&self, start: u64, stop: u64) -> Self {
        debug_assert!(start <= stop && self.contains(start) && self.contains(stop));
        Self {
            chrom: self.chrom.clone(),
            start,
            stop,
            strand: self.strand,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.stop)?;
        if let Some(strand) = self.strand {
            write!(f, "({})", strand)?;
        }
        Ok(())
    }
}

/// One unit of parallel work: an interval plus its position within the chromosome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    interval: Interval,
    sequence: usize,
}

impl Chunk {
    pub(crate) fn new(interval: Interval, sequence: usize) -> Self {
        Self { interval, sequence }
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Zero-based index of this chunk within its chromosome
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn chrom(&self) -> &str {
        self.interval.chrom()
    }

    pub fn start(&self) -> u64 {
        self.interval.start()
    }

    pub fn stop(&self) -> u64 {
        self.interval.stop()
    }

    pub fn len(&self) -> u64 {
        self.interval.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.interval, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_length_is_inclusive() {
        let iv = Interval::new("chr1", 500, 1000).unwrap();
        assert_eq!(iv.len(), 501);
        assert!(iv.contains(500));
        assert!(iv.contains(1000));
        assert!(!iv.contains(1001));
    }

    #[test]
    fn test_single_base_interval() {
        let iv = Interval::new("chr1", 7, 7).unwrap();
        assert_eq!(iv.len(), 1);
    }

    #[test]
    fn test_reject_reversed_interval() {
        let result = Interval::new("chr1", 10, 9);
        assert!(matches!(
            result,
            Err(EngineError::InvalidInterval { start: 10, stop: 9 })
        ));
    }

    #[test]
    fn test_reject_zero_start() {
        assert!(matches!(
            Interval::new("chr1", 0, 5),
            Err(EngineError::InvalidInterval { start: 0, stop: 5 })
        ));
        assert!(Interval::new("chr1", 0, 0).is_err());
        assert!(Interval::new("chr1", 0, u64::MAX).is_err());
        assert_eq!(Interval::new("chr1", 1, u64::MAX).unwrap().len(), u64::MAX);
        assert!(Interval::with_strand("chr1", 0, 5, Strand::Plus).is_err());
        assert_eq!(Interval::new("chr1", 1, 5).unwrap().len(), 5);
    }

    #[test]
    fn test_display() {
        let iv = Interval::with_strand("chr2", 1, 100, Strand::Minus).unwrap();
        assert_eq!(iv.to_string(), "chr2:1-100(-)");
        let chunk = Chunk::new(Interval::new("chr2", 1, 100).unwrap(), 3);
        assert_eq!(chunk.to_string(), "chr2:1-100#3");
    }
}
