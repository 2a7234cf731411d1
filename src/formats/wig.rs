//! Wiggle format adapter
//!
//! Parses Wiggle (variableStep, fixedStep) and bedGraph lines into an
//! in-memory, interval-indexed [`WigTrack`], and writes computed values
//! back out as fixedStep Wiggle with [`WigWriter`].

use crate::core::io::{open_text_reader, LineIterator, TextWriter};
use crate::core::{
    Interval, RecordOrder, TrackError, TrackExtent, TrackReader, TrackResult, TrackWriter,
};
use rust_lapper::{Interval as LapperInterval, Lapper};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

/// Wiggle format type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WigFormat {
    VariableStep,
    FixedStep,
}

/// Wiggle declaration line parameters
#[derive(Debug, Clone)]
pub struct WigDeclaration {
    pub format: WigFormat,
    pub chrom: String,
    pub span: u64,
    pub start: Option<u64>, // Only for fixedStep
    pub step: Option<u64>,  // Only for fixedStep
}

impl WigDeclaration {
    /// Parse a declaration line (variableStep or fixedStep)
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();

        let (format, rest) = if let Some(rest) = line.strip_prefix("variableStep") {
            (WigFormat::VariableStep, rest)
        } else if let Some(rest) = line.strip_prefix("fixedStep") {
            (WigFormat::FixedStep, rest)
        } else {
            return Err("expected variableStep or fixedStep".to_string());
        };

        let mut chrom = None;
        let mut span = 1u64;
        let mut start = None;
        let mut step = None;

        let number = |key: &str, value: &str| -> Result<u64, String> {
            value
                .parse()
                .map_err(|_| format!("invalid {}: {}", key, value))
        };

        for part in rest.split_whitespace() {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "chrom" => chrom = Some(value.to_string()),
                    "span" => span = number(key, value)?,
                    "start" => start = Some(number(key, value)?),
                    "step" => step = Some(number(key, value)?),
                    _ => {}
                }
            }
        }

        let chrom = chrom.ok_or_else(|| "missing chrom parameter".to_string())?;
        if span == 0 {
            return Err("span must be positive".to_string());
        }
        match (format, start) {
            (WigFormat::FixedStep, None) => return Err("missing start parameter".to_string()),
            (WigFormat::FixedStep, Some(0)) => return Err("start is 1-based".to_string()),
            _ => {}
        }

        Ok(Self {
            format,
            chrom,
            span,
            start,
            step,
        })
    }
}

/// A single Wiggle data point
#[derive(Debug, Clone)]
pub struct WigDataPoint {
    pub chrom: String,
    pub start: u64, // 0-based
    pub end: u64,   // 0-based, exclusive
    pub value: f64,
}

/// Streaming parser yielding data points from Wiggle or bedGraph text
pub struct WigReader<R: BufRead> {
    lines: LineIterator<R>,
    current_decl: Option<WigDeclaration>,
    current_pos: u64, // For fixedStep, 0-based
}

impl<R: BufRead> WigReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineIterator::new(reader),
            current_decl: None,
            current_pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> TrackError {
        TrackError::Parse {
            line: self.lines.line_number(),
            message: message.into(),
        }
    }

    fn parse_line(&mut self, line: &str) -> TrackResult<Option<WigDataPoint>> {
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("track")
            || line.starts_with("browser")
        {
            return Ok(None);
        }

        if line.starts_with("variableStep") || line.starts_with("fixedStep") {
            let decl = WigDeclaration::parse(line).map_err(|m| self.error(m))?;
            if let (WigFormat::FixedStep, Some(start)) = (decl.format, decl.start) {
                self.current_pos = start - 1;
            }
            self.current_decl = Some(decl);
            return Ok(None);
        }

        let parts: Vec<&str> = line.split_whitespace().collect();

        // bedGraph: chrom start end value
        if parts.len() >= 4 {
            let start = parts[1].parse::<u64>();
            let end = parts[2].parse::<u64>();
            let value = parts[3].parse::<f64>();
            return match (start, end, value) {
                (Ok(start), Ok(end), Ok(value)) if start < end => Ok(Some(WigDataPoint {
                    chrom: parts[0].to_string(),
                    start,
                    end,
                    value,
                })),
                _ => Err(self.error(format!("invalid bedGraph line: {}", line))),
            };
        }

        let decl = self
            .current_decl
            .as_ref()
            .ok_or_else(|| self.error("data line before declaration"))?;

        match decl.format {
            WigFormat::VariableStep => {
                if parts.len() < 2 {
                    return Err(self.error(format!("expected position and value: {}", line)));
                }
                let pos = parts[0]
                    .parse::<u64>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| self.error(format!("invalid position: {}", parts[0])))?;
                let value = parts[1]
                    .parse::<f64>()
                    .map_err(|_| self.error(format!("invalid value: {}", parts[1])))?;
                Ok(Some(WigDataPoint {
                    chrom: decl.chrom.clone(),
                    start: pos - 1,
                    end: pos - 1 + decl.span,
                    value,
                }))
            }
            WigFormat::FixedStep => {
                let value = line
                    .parse::<f64>()
                    .map_err(|_| self.error(format!("invalid value: {}", line)))?;
                let point = WigDataPoint {
                    chrom: decl.chrom.clone(),
                    start: self.current_pos,
                    end: self.current_pos + decl.span,
                    value,
                };
                self.current_pos += decl.step.unwrap_or(decl.span);
                Ok(Some(point))
            }
        }
    }
}

impl<R: BufRead> Iterator for WigReader<R> {
    type Item = TrackResult<WigDataPoint>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next_line()? {
                Ok(line) => line.trim().to_string(),
                Err(e) => return Some(Err(TrackError::Io(e))),
            };
            match self.parse_line(&line) {
                Ok(Some(point)) => return Some(Ok(point)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[derive(Debug)]
struct ChromData {
    name: String,
    index: Lapper<u64, usize>,
    values: Vec<f32>,
    start: u64, // 0-based
    end: u64,   // 0-based, exclusive
}

/// Wiggle or bedGraph file loaded into per-chromosome interval indexes
#[derive(Debug)]
pub struct WigTrack {
    name: String,
    chroms: Vec<ChromData>,
    lookup: HashMap<String, usize>,
}

impl WigTrack {
    /// Load a (possibly gzip or bzip2 compressed) Wiggle or bedGraph file
    pub fn open(path: &Path) -> TrackResult<Self> {
        let reader = open_text_reader(path)?;
        let track = Self::from_reader(path.display().to_string(), reader)?;
        log::debug!(
            "Loaded {} ({} chromosome(s))",
            track.name,
            track.chroms.len()
        );
        Ok(track)
    }

    pub fn from_reader<R: BufRead>(name: impl Into<String>, reader: R) -> TrackResult<Self> {
        let mut builders: Vec<(String, Vec<LapperInterval<u64, usize>>, Vec<f32>)> = Vec::new();
        let mut lookup: HashMap<String, usize> = HashMap::new();

        for point in WigReader::new(reader) {
            let point = point?;
            let slot = match lookup.get(&point.chrom) {
                Some(&i) => i,
                None => {
                    lookup.insert(point.chrom.clone(), builders.len());
                    builders.push((point.chrom.clone(), Vec::new(), Vec::new()));
                    builders.len() - 1
                }
            };
            let (_, intervals, values) = &mut builders[slot];
            intervals.push(LapperInterval {
                start: point.start,
                stop: point.end,
                val: values.len(),
            });
            values.push(point.value as f32);
        }

        let chroms = builders
            .into_iter()
            .map(|(name, intervals, values)| {
                let start = intervals.iter().map(|iv| iv.start).min().unwrap_or(0);
                let end = intervals.iter().map(|iv| iv.stop).max().unwrap_or(0);
                ChromData {
                    name,
                    index: Lapper::new(intervals),
                    values,
                    start,
                    end,
                }
            })
            .collect();

        Ok(Self {
            name: name.into(),
            chroms,
            lookup,
        })
    }

    fn chrom(&self, chrom: &str) -> Option<&ChromData> {
        self.lookup.get(chrom).map(|&i| &self.chroms[i])
    }
}

impl TrackReader for WigTrack {
    fn name(&self) -> &str {
        &self.name
    }

    fn chromosomes(&self) -> Vec<String> {
        self.chroms.iter().map(|c| c.name.clone()).collect()
    }

    fn extent(&self, chrom: &str) -> Option<TrackExtent> {
        let data = self.chrom(chrom)?;
        Some(TrackExtent::new(chrom, data.start + 1, data.end))
    }

    fn query(&self, chrom: &str, start: u64, stop: u64) -> TrackResult<Vec<f32>> {
        let data = self
            .chrom(chrom)
            .ok_or_else(|| TrackError::UnknownChromosome(chrom.to_string()))?;
        if start == 0 || start > stop {
            return Err(TrackError::OutOfRange {
                chrom: chrom.to_string(),
                start,
                stop,
            });
        }

        let (lo, hi) = (start - 1, stop);
        let mut out = vec![f32::NAN; (hi - lo) as usize];
        // Later lines in the file win where records overlap.
        let mut hits: Vec<_> = data.index.find(lo, hi).collect();
        hits.sort_by_key(|iv| iv.val);
        for iv in hits {
            let a = iv.start.max(lo);
            let b = iv.stop.min(hi);
            out[(a - lo) as usize..(b - lo) as usize].fill(data.values[iv.val]);
        }
        Ok(out)
    }

    fn supports_concurrent_queries(&self) -> bool {
        true
    }
}

/// Writes records as fixedStep Wiggle, one base per line
///
/// Contiguous records on the same chromosome share one declaration.
pub struct WigWriter {
    out: Option<TextWriter>,
    order: RecordOrder,
}

impl WigWriter {
    /// Create the output file; `.gz` paths are gzip-compressed
    pub fn create(path: &Path) -> TrackResult<Self> {
        Ok(Self {
            out: Some(TextWriter::create(path)?),
            order: RecordOrder::default(),
        })
    }
}

impl TrackWriter for WigWriter {
    fn write_record(&mut self, interval: &Interval, values: &[f32]) -> TrackResult<()> {
        let out = self.out.as_mut().ok_or(TrackError::Closed)?;
        let contiguous = self.order.is_contiguous(interval);
        self.order.check(interval, values)?;

        if !contiguous {
            writeln!(
                out,
                "fixedStep chrom={} start={} step=1 span=1",
                interval.chrom(),
                interval.start()
            )?;
        }
        for v in values {
            if v.is_nan() {
                writeln!(out, "NaN")?;
            } else {
                writeln!(out, "{}", v)?;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> TrackResult<()> {
        if let Some(out) = self.out.take() {
            out.finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn points(content: &str) -> Vec<TrackResult<WigDataPoint>> {
        WigReader::new(Cursor::new(content.as_bytes().to_vec())).collect()
    }

    #[test]
    fn test_variable_step_declaration() {
        let decl = WigDeclaration::parse("variableStep chrom=chr1 span=10").unwrap();
        assert_eq!(decl.format, WigFormat::VariableStep);
        assert_eq!(decl.chrom, "chr1");
        assert_eq!(decl.span, 10);
        assert!(decl.start.is_none());
    }

    #[test]
    fn test_fixed_step_declaration() {
        let decl = WigDeclaration::parse("fixedStep chrom=chr2 start=1000 step=100 span=50").unwrap();
        assert_eq!(decl.format, WigFormat::FixedStep);
        assert_eq!(decl.span, 50);
        assert_eq!(decl.start, Some(1000));
        assert_eq!(decl.step, Some(100));
    }

    #[test]
    fn test_declaration_errors() {
        assert!(WigDeclaration::parse("variableStep span=10").is_err());
        assert!(WigDeclaration::parse("fixedStep chrom=chr1 step=100").is_err());
        assert!(WigDeclaration::parse("fixedStep chrom=chr1 start=0").is_err());
    }

    #[test]
    fn test_reader_fixed_step() {
        let pts = points("fixedStep chrom=chr1 start=1000 step=100 span=50\n1.0\n2.0\n");
        let p0 = pts[0].as_ref().unwrap();
        assert_eq!((p0.start, p0.end), (999, 1049));
        let p1 = pts[1].as_ref().unwrap();
        assert_eq!((p1.start, p1.end), (1099, 1149));
    }

    #[test]
    fn test_reader_skips_headers_and_reads_bedgraph() {
        let pts = points("# c\ntrack type=bedGraph\nbrowser position chr1:1-2\nchr1\t10\t20\t0.5\n");
        assert_eq!(pts.len(), 1);
        let p = pts[0].as_ref().unwrap();
        assert_eq!((p.start, p.end), (10, 20));
        assert!((p.value - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_reader_reports_line_numbers() {
        let pts = points("variableStep chrom=chr1\n1 1.0\nbad line here\n");
        match &pts[1] {
            Err(TrackError::Parse { line, .. }) => assert_eq!(*line, 3),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            points("5 1.0\n")[0],
            Err(TrackError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_track_query_and_extent() {
        let content = "variableStep chrom=chr1 span=5\n11 1.0\n21 2.0\nvariableStep chrom=chr2\n3 7.0\n";
        let track = WigTrack::from_reader("t", Cursor::new(content)).unwrap();
        assert_eq!(track.chromosomes(), vec!["chr1", "chr2"]);

        let extent = track.extent("chr1").unwrap();
        assert_eq!((extent.start, extent.stop), (11, 25));

        let values = track.query("chr1", 14, 22).unwrap();
        assert_eq!(values.len(), 9);
        assert_eq!(&values[..2], &[1.0, 1.0]);
        assert!(values[2..7].iter().all(|v| v.is_nan()));
        assert_eq!(&values[7..], &[2.0, 2.0]);

        assert!(matches!(
            track.query("chrX", 1, 2),
            Err(TrackError::UnknownChromosome(_))
        ));
        assert!(matches!(
            track.query("chr1", 0, 2),
            Err(TrackError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_later_records_win_on_overlap() {
        let content = "chr1\t0\t10\t1\nchr1\t5\t8\t2\n";
        let track = WigTrack::from_reader("t", Cursor::new(content)).unwrap();
        let values = track.query("chr1", 5, 9).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn test_writer_continues_contiguous_blocks() -> TrackResult<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.wig");
        let mut writer = WigWriter::create(&path)?;
        writer.write_record(&Interval::new("chr1", 5, 6).unwrap(), &[1.0, f32::NAN])?;
        writer.write_record(&Interval::new("chr1", 7, 7).unwrap(), &[2.5])?;
        writer.write_record(&Interval::new("chr1", 20, 20).unwrap(), &[3.0])?;
        writer.close()?;

        let text = std::fs::read_to_string(&path)?;
        assert_eq!(
            text,
            "fixedStep chrom=chr1 start=5 step=1 span=1\n1\nNaN\n2.5\n\
             fixedStep chrom=chr1 start=20 step=1 span=1\n3\n"
        );

        let track = WigTrack::open(&path)?;
        let values = track.query("chr1", 5, 7)?;
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 2.5);
        Ok(())
    }

    #[test]
    fn test_writer_rejects_out_of_order_and_closed() -> TrackResult<()> {
        let dir = tempdir()?;
        let mut writer = WigWriter::create(&dir.path().join("out.wig"))?;
        writer.write_record(&Interval::new("chr1", 10, 10).unwrap(), &[1.0])?;
        assert!(matches!(
            writer.write_record(&Interval::new("chr1", 5, 5).unwrap(), &[1.0]),
            Err(TrackError::OutOfOrder { .. })
        ));
        writer.close()?;
        assert!(matches!(
            writer.write_record(&Interval::new("chr1", 20, 20).unwrap(), &[1.0]),
            Err(TrackError::Closed)
        ));
        Ok(())
    }
}
