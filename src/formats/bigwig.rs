//! BigWig input via bigtools

use crate::core::{TrackError, TrackExtent, TrackReader, TrackResult};
use bigtools::utils::reopen::ReopenableFile;
use bigtools::BigWigRead;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct ChromInfo {
    name: String,
    length: u32,
    extent: Option<(u64, u64)>, // 1-based inclusive
}

/// Read-only BigWig track
///
/// The bigtools reader needs `&mut` access, so queries go through an
/// internal mutex and the track is safe to share between workers.
pub struct BigWigTrack {
    name: String,
    reader: Mutex<BigWigRead<ReopenableFile>>,
    chroms: Vec<ChromInfo>,
}

fn bigwig_error(e: impl std::fmt::Display) -> TrackError {
    TrackError::BigWig(e.to_string())
}

impl BigWigTrack {
    /// Open a BigWig file and scan its per-chromosome extents
    pub fn open(path: &Path) -> TrackResult<Self> {
        if !path.exists() {
            return Err(TrackError::FileNotFound(path.to_path_buf()));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| bigwig_error(format!("non UTF-8 path: {}", path.display())))?;
        let mut reader = BigWigRead::open_file(path_str).map_err(bigwig_error)?;

        let mut chroms = Vec::new();
        for info in reader.chroms().to_vec() {
            let mut extent: Option<(u64, u64)> = None;
            let intervals = reader
                .get_interval(&info.name, 0, info.length)
                .map_err(bigwig_error)?;
            for value in intervals {
                let value = value.map_err(bigwig_error)?;
                let (start, stop) = (value.start as u64 + 1, value.end as u64);
                extent = Some(match extent {
                    None => (start, stop),
                    Some((s, t)) => (s.min(start), t.max(stop)),
                });
            }
            chroms.push(ChromInfo {
                name: info.name.clone(),
                length: info.length,
                extent,
            });
        }
        log::debug!(
            "Opened BigWig {} ({} chromosome(s))",
            path.display(),
            chroms.len()
        );

        Ok(Self {
            name: path.display().to_string(),
            reader: Mutex::new(reader),
            chroms,
        })
    }

    fn chrom(&self, chrom: &str) -> Option<&ChromInfo> {
        self.chroms.iter().find(|c| c.name == chrom)
    }
}

impl TrackReader for BigWigTrack {
    fn name(&self) -> &str {
        &self.name
    }

    /// Chromosomes carrying data, in header order
    fn chromosomes(&self) -> Vec<String> {
        self.chroms
            .iter()
            .filter(|c| c.extent.is_some())
            .map(|c| c.name.clone())
            .collect()
    }

    fn extent(&self, chrom: &str) -> Option<TrackExtent> {
        let (start, stop) = self.chrom(chrom)?.extent?;
        Some(TrackExtent::new(chrom, start, stop))
    }

    fn query(&self, chrom: &str, start: u64, stop: u64) -> TrackResult<Vec<f32>> {
        let info = self
            .chrom(chrom)
            .ok_or_else(|| TrackError::UnknownChromosome(chrom.to_string()))?;
        if start == 0 || start > stop {
            return Err(TrackError::OutOfRange {
                chrom: chrom.to_string(),
                start,
                stop,
            });
        }

        let lo = start - 1;
        let mut out = vec![f32::NAN; (stop - lo) as usize];
        let hi = stop.min(info.length as u64);
        if lo >= hi {
            return Ok(out);
        }

        let mut reader = self.reader.lock().unwrap_or_else(|p| p.into_inner());
        let intervals = reader
            .get_interval(chrom, lo as u32, hi as u32)
            .map_err(bigwig_error)?;
        for value in intervals {
            let value = value.map_err(bigwig_error)?;
            let a = (value.start as u64).max(lo);
            let b = (value.end as u64).min(hi);
            if a < b {
                out[(a - lo) as usize..(b - lo) as usize].fill(value.value);
            }
        }
        Ok(out)
    }

    fn supports_concurrent_queries(&self) -> bool {
        true
    }
}
