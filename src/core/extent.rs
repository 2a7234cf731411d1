//! Extent resolution
//!
//! Combines the per-chromosome coverage of several tracks into the single
//! processing domain a job iterates over.

use crate::core::error::{EngineError, EngineResult};
use crate::core::interval::Interval;
use crate::core::track::TrackReader;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Policy for combining the extents of several readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ExtentMode {
    /// Keep only what every reader covers
    #[default]
    Intersection,
    /// Keep what any reader covers
    Union,
}

impl FromStr for ExtentMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "intersection" | "intersect" => Ok(ExtentMode::Intersection),
            "union" => Ok(ExtentMode::Union),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown extent mode '{}' (expected intersection or union)",
                other
            ))),
        }
    }
}

impl fmt::Display for ExtentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtentMode::Intersection => write!(f, "intersection"),
            ExtentMode::Union => write!(f, "union"),
        }
    }
}

/// Ordered chromosome -> interval mapping processed by one job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingDomain {
    intervals: Vec<Interval>,
}

impl ProcessingDomain {
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.intervals.iter()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn get(&self, chrom: &str) -> Option<&Interval> {
        self.intervals.iter().find(|iv| iv.chrom() == chrom)
    }

    pub fn total_bases(&self) -> u64 {
        self.intervals.iter().map(Interval::len).sum()
    }
}

impl<'a> IntoIterator for &'a ProcessingDomain {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Chromosome names in first-seen order.
///
/// Intersection only ever keeps chromosomes of the first reader, so its
/// order is the first reader's order; union appends chromosomes first seen
/// in later readers.
fn candidate_chromosomes(readers: &[&dyn TrackReader], mode: ExtentMode) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    let sources = match mode {
        ExtentMode::Intersection => &readers[..1],
        ExtentMode::Union => readers,
    };
    for reader in sources {
        for chrom in reader.chromosomes() {
            if seen.insert(chrom.clone()) {
                ordered.push(chrom);
            }
        }
    }
    ordered
}

/// Resolve the processing domain for `readers`
///
/// Chromosomes whose intersected bounds do not overlap are dropped. An
/// empty result is not an error here; the job decides what to do with it.
pub fn resolve_domain(
    readers: &[&dyn TrackReader],
    mode: ExtentMode,
) -> EngineResult<ProcessingDomain> {
    if readers.is_empty() {
        return Err(EngineError::NoInputs);
    }

    let mut intervals = Vec::new();
    for chrom in candidate_chromosomes(readers, mode) {
        let extents: Vec<_> = readers.iter().map(|r| r.extent(&chrom)).collect();

        let bounds = match mode {
            ExtentMode::Intersection => {
                if extents.iter().any(Option::is_none) {
                    log::debug!("{} missing from at least one input, skipped", chrom);
                    continue;
                }
                extents
                    .iter()
                    .flatten()
                    .fold(None, |acc: Option<(u64, u64)>, e| match acc {
                        None => Some((e.start, e.stop)),
                        Some((s, t)) => Some((s.max(e.start), t.min(e.stop))),
                    })
            }
            ExtentMode::Union => extents
                .iter()
                .flatten()
                .fold(None, |acc: Option<(u64, u64)>, e| match acc {
                    None => Some((e.start, e.stop)),
                    Some((s, t)) => Some((s.min(e.start), t.max(e.stop))),
                }),
        };

        match bounds {
            Some((start, stop)) if start <= stop => {
                intervals.push(Interval::new(chrom, start, stop)?);
            }
            Some((start, stop)) => {
                log::debug!(
                    "{} has no overlapping extent ({} > {}), skipped",
                    chrom,
                    start,
                    stop
                );
            }
            None => {}
        }
    }

    Ok(ProcessingDomain { intervals })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::memory::MemoryTrack;

    fn track(name: &str, extents: &[(&str, u64, u64)]) -> MemoryTrack {
        let mut t = MemoryTrack::new(name);
        for (chrom, start, stop) in extents {
            t.insert_constant(chrom, *start, *stop, 1.0);
        }
        t
    }

    #[test]
    fn test_intersection_and_union_bounds() {
        let a = track("a", &[("chr1", 10, 100)]);
        let b = track("b", &[("chr1", 50, 200)]);
        let readers: Vec<&dyn TrackReader> = vec![&a, &b];

        let inter = resolve_domain(&readers, ExtentMode::Intersection).unwrap();
        let iv = inter.get("chr1").unwrap();
        assert_eq!((iv.start(), iv.stop()), (50, 100));

        let union = resolve_domain(&readers, ExtentMode::Union).unwrap();
        let iv = union.get("chr1").unwrap();
        assert_eq!((iv.start(), iv.stop()), (10, 200));
    }

    #[test]
    fn test_missing_chromosome() {
        let a = track("a", &[("chr1", 1, 100), ("chr2", 5, 50)]);
        let b = track("b", &[("chr1", 1, 100)]);
        let readers: Vec<&dyn TrackReader> = vec![&a, &b];

        let inter = resolve_domain(&readers, ExtentMode::Intersection).unwrap();
        assert_eq!(inter.len(), 1);
        assert!(inter.get("chr2").is_none());

        let union = resolve_domain(&readers, ExtentMode::Union).unwrap();
        let iv = union.get("chr2").unwrap();
        assert_eq!((iv.start(), iv.stop()), (5, 50));
    }

    #[test]
    fn test_disjoint_extents_are_dropped() {
        let a = track("a", &[("chr1", 1, 10)]);
        let b = track("b", &[("chr1", 20, 30)]);
        let readers: Vec<&dyn TrackReader> = vec![&a, &b];

        let inter = resolve_domain(&readers, ExtentMode::Intersection).unwrap();
        assert!(inter.is_empty());
    }

    #[test]
    fn test_no_inputs() {
        let readers: Vec<&dyn TrackReader> = vec![];
        let result = resolve_domain(&readers, ExtentMode::Union);
        assert!(matches!(result, Err(EngineError::NoInputs)));
    }

    #[test]
    fn test_union_order_is_first_seen() {
        let a = track("a", &[("chr2", 1, 10), ("chr1", 1, 10)]);
        let b = track("b", &[("chr3", 1, 10), ("chr1", 1, 10)]);
        let readers: Vec<&dyn TrackReader> = vec![&a, &b];

        let union = resolve_domain(&readers, ExtentMode::Union).unwrap();
        let order: Vec<_> = union.iter().map(|iv| iv.chrom().to_string()).collect();
        assert_eq!(order, vec!["chr2", "chr1", "chr3"]);
    }

    #[test]
    fn test_extent_mode_parse() {
        assert_eq!("UNION".parse::<ExtentMode>().unwrap(), ExtentMode::Union);
        assert_eq!(
            "intersection".parse::<ExtentMode>().unwrap(),
            ExtentMode::Intersection
        );
        assert!("both".parse::<ExtentMode>().is_err());
    }
}
