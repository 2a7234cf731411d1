//! End-to-end engine tests over in-memory tracks

use fast_tracks::core::{
    Chunk, ComputeContext, EngineConfig, EngineError, ErrorKind, ExtentMode, Interval, Job,
    JobRegistry, JobState, TrackReader, TrackWriter,
};
use fast_tracks::formats::{BedGraphWriter, MemoryTrack, MemoryWriter, WigWriter};
use fast_tracks::kernels::{Fill, Mean, Scale};
use proptest::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn zeros(chunk: &Chunk, _: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> {
    Ok(vec![0.0; chunk.len() as usize])
}

fn ramp(name: &str, chrom: &str, start: u64, stop: u64) -> MemoryTrack {
    let mut t = MemoryTrack::new(name);
    let values = (start..=stop).map(|p| p as f32).collect();
    t.insert_values(chrom, start, values);
    t
}

/// Run a job and return the records written, flattened to (interval, values)
fn run(
    config: EngineConfig,
    readers: Vec<Box<dyn TrackReader>>,
    compute: &dyn fast_tracks::core::ComputeFunction,
) -> (Result<fast_tracks::core::JobReport, EngineError>, Vec<(Interval, Vec<f32>)>) {
    let writer = MemoryWriter::new();
    let records = writer.records();
    let mut job = Job::new(config, readers, Box::new(writer)).unwrap();
    let result = job.run(compute);
    let written = records.lock().unwrap().clone();
    (result, written)
}

#[test]
fn test_intersection_chunking_writes_every_base() {
    let mut a = MemoryTrack::new("a");
    a.insert_constant("chrA", 1, 1000, 1.0);
    let mut b = MemoryTrack::new("b");
    b.insert_constant("chrA", 500, 1500, 2.0);

    let config = EngineConfig::default()
        .with_threads(2)
        .with_chunk_size(400)
        .with_extent_mode(ExtentMode::Intersection);
    let (result, written) = run(config, vec![Box::new(a), Box::new(b)], &zeros);

    let report = result.unwrap();
    assert_eq!(report.chunks, 2);
    assert_eq!(report.bases_written, 501);

    let bounds: Vec<_> = written.iter().map(|(iv, _)| (iv.start(), iv.stop())).collect();
    assert_eq!(bounds, vec![(500, 899), (900, 1000)]);
    let values: Vec<f32> = written.into_iter().flat_map(|(_, v)| v).collect();
    assert_eq!(values.len(), 501);
    assert!(values.iter().all(|v| *v == 0.0));
}

#[test]
fn test_slow_chunk_does_not_reorder_output() {
    let track = ramp("t", "chr1", 1, 1000);
    let slow = |chunk: &Chunk, ctx: &ComputeContext<'_>| -> anyhow::Result<Vec<f32>> {
        if chunk.sequence() == 3 {
            thread::sleep(Duration::from_millis(100));
        }
        Ok(ctx.query(0, chunk.interval())?)
    };

    let config = EngineConfig::default().with_threads(4).with_chunk_size(100);
    let (result, written) = run(config, vec![Box::new(track)], &slow);

    let report = result.unwrap();
    assert_eq!(report.chunks, 10);
    assert!(report.max_buffered <= 4 + fast_tracks::core::LOOKAHEAD);
    let starts: Vec<_> = written.iter().map(|(iv, _)| iv.start()).collect();
    assert_eq!(starts, (0..10).map(|i| i * 100 + 1).collect::<Vec<_>>());
    let values: Vec<f32> = written.into_iter().flat_map(|(_, v)| v).collect();
    assert_eq!(values, (1..=1000).map(|p| p as f32).collect::<Vec<_>>());
}

#[test]
fn test_length_mismatch_fails_job() {
    let track = ramp("t", "chr1", 1, 500);
    let short = |chunk: &Chunk, _: &ComputeContext<'_>| -> anyhow::Result<Vec<f32>> {
        let n = if chunk.sequence() == 2 { chunk.len() - 1 } else { chunk.len() };
        Ok(vec![1.0; n as usize])
    };

    let writer = MemoryWriter::new();
    let closed = writer.closed_flag();
    let records = writer.records();
    let config = EngineConfig::default().with_threads(2).with_chunk_size(100);
    let mut job = Job::new(config, vec![Box::new(track)], Box::new(writer)).unwrap();

    let err = job.run(&short).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LengthMismatch);
    assert_eq!(job.state(), JobState::Failed);
    assert!(*closed.lock().unwrap());
    // Nothing past the failed chunk reaches the writer.
    assert!(records.lock().unwrap().len() <= 2);
}

#[test]
fn test_failure_on_first_chromosome_skips_the_rest() {
    let mut track = ramp("t", "chr1", 1, 500);
    track.insert_constant("chr2", 1, 500, 1.0);
    let short = |chunk: &Chunk, _: &ComputeContext<'_>| -> anyhow::Result<Vec<f32>> {
        let n = if chunk.chrom() == "chr1" && chunk.sequence() == 1 {
            chunk.len() + 1
        } else {
            chunk.len()
        };
        Ok(vec![1.0; n as usize])
    };

    let config = EngineConfig::default().with_threads(2).with_chunk_size(100);
    let (result, written) = run(config, vec![Box::new(track)], &short);

    assert_eq!(result.unwrap_err().kind(), ErrorKind::LengthMismatch);
    assert!(written.len() <= 1);
    assert!(written.iter().all(|(iv, _)| iv.chrom() == "chr1"));
}

#[test]
fn test_compute_error_fails_job() {
    let track = ramp("t", "chr1", 1, 300);
    let failing = |chunk: &Chunk, _: &ComputeContext<'_>| -> anyhow::Result<Vec<f32>> {
        anyhow::ensure!(chunk.sequence() != 1, "bad chunk");
        Ok(vec![0.0; chunk.len() as usize])
    };
    let config = EngineConfig::default().with_threads(3).with_chunk_size(100);
    let (result, _) = run(config, vec![Box::new(track)], &failing);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ComputeFailure);
}

#[test]
fn test_non_concurrent_reader_is_serialized() {
    let track = ramp("t", "chr1", 1, 2000).with_concurrent_queries(false);
    let stats = track.stats();

    let config = EngineConfig::default().with_threads(4).with_chunk_size(50);
    let (result, _) = run(config, vec![Box::new(track)], &Scale(1.0));

    let report = result.unwrap();
    assert_eq!(stats.queries(), report.chunks);
    assert_eq!(stats.peak_concurrency(), 1);
}

#[test]
fn test_cancellation_mid_run() {
    let track = ramp("t", "chr1", 1, 10_000);
    let writer = MemoryWriter::new();
    let closed = writer.closed_flag();
    let config = EngineConfig::default().with_threads(2).with_chunk_size(100);
    let mut job = Job::new(config, vec![Box::new(track)], Box::new(writer)).unwrap();

    let token = job.cancellation_token();
    let cancelling = move |chunk: &Chunk, _: &ComputeContext<'_>| -> anyhow::Result<Vec<f32>> {
        if chunk.sequence() == 5 {
            token.cancel();
        }
        Ok(vec![0.0; chunk.len() as usize])
    };

    assert!(matches!(job.run(&cancelling), Err(EngineError::Cancelled)));
    assert_eq!(job.state(), JobState::Cancelled);
    assert!(*closed.lock().unwrap());
}

#[test]
fn test_union_mode_reads_missing_chromosomes_as_nan() {
    let mut a = MemoryTrack::new("a");
    a.insert_constant("chr1", 1, 10, 2.0);
    let mut b = MemoryTrack::new("b");
    b.insert_constant("chr1", 1, 10, 4.0);
    b.insert_constant("chr2", 1, 5, 6.0);

    let config = EngineConfig::default()
        .with_threads(2)
        .with_extent_mode(ExtentMode::Union);
    let (result, written) = run(config, vec![Box::new(a), Box::new(b)], &Mean);

    assert_eq!(result.unwrap().chromosomes, 2);
    assert_eq!(written[0].0.chrom(), "chr1");
    assert!(written[0].1.iter().all(|v| *v == 3.0));
    assert_eq!(written[1].0.chrom(), "chr2");
    assert!(written[1].1.iter().all(|v| *v == 6.0));
}

#[test]
fn test_registry_runs_jobs_on_separate_threads() {
    let registry = Arc::new(JobRegistry::new());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let track = ramp("t", "chr1", 1, 1000);
                let writer = MemoryWriter::new();
                let records = writer.records();
                let config = EngineConfig::default().with_threads(2).with_chunk_size(128);
                let mut job = registry
                    .create_job(config, vec![Box::new(track)], Box::new(writer))
                    .unwrap();
                let report = job.run(&Fill(i as f32)).unwrap();
                let written = records.lock().unwrap();
                assert!(written.iter().all(|(_, v)| v.iter().all(|x| *x == i as f32)));
                report.job_id
            })
        })
        .collect();

    let mut ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
    assert!(registry.active().is_empty());
    for id in ids {
        assert_eq!(registry.state(id), Some(JobState::Completed));
    }
}

/// Two chromosomes with a gap and a NaN stretch
fn two_chromosome_inputs() -> Vec<Box<dyn TrackReader>> {
    let mut a = ramp("a", "chr1", 1, 700);
    a.insert_values("chr2", 50, vec![f32::NAN; 30]);
    a.insert_constant("chr2", 80, 400, 3.0);
    let mut b = MemoryTrack::new("b");
    b.insert_constant("chr1", 100, 900, 1.0);
    b.insert_constant("chr2", 1, 300, 2.0);
    vec![Box::new(a), Box::new(b)]
}

fn run_to_file(threads: usize, chunk_size: u64, writer: Box<dyn TrackWriter>) {
    let config = EngineConfig::default()
        .with_threads(threads)
        .with_chunk_size(chunk_size)
        .with_extent_mode(ExtentMode::Union);
    let mut job = Job::new(config, two_chromosome_inputs(), writer).unwrap();
    let report = job.run(&Mean).unwrap();
    assert_eq!(report.chromosomes, 2);
}

/// Run the same job twice with different parallelism and return both files
fn run_twice(ext: &str, create: fn(&Path) -> Box<dyn TrackWriter>) -> (Vec<u8>, Vec<u8>) {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join(format!("first.{}", ext));
    let second = dir.path().join(format!("second.{}", ext));
    run_to_file(1, 1000, create(&first));
    run_to_file(4, 37, create(&second));
    (std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap())
}

#[test]
fn test_repeated_wig_runs_are_byte_identical() {
    let (first, second) = run_twice("wig", |p: &Path| -> Box<dyn TrackWriter> {
        Box::new(WigWriter::create(p).unwrap())
    });
    let text = String::from_utf8(first.clone()).unwrap();
    assert!(text.contains("fixedStep chrom=chr1"));
    assert!(text.contains("fixedStep chrom=chr2"));
    assert_eq!(first, second);
}

#[test]
fn test_repeated_bedgraph_runs_are_byte_identical() {
    let (first, second) = run_twice("bedGraph", |p: &Path| -> Box<dyn TrackWriter> {
        Box::new(BedGraphWriter::create(p).unwrap())
    });
    let text = String::from_utf8(first.clone()).unwrap();
    assert!(text.lines().any(|l| l.starts_with("chr2\t")));
    assert_eq!(first, second);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Property: output is identical for any thread count and chunk size
    #[test]
    fn prop_output_independent_of_parallelism(
        len in 1u64..3000,
        threads in 1usize..6,
        chunk_size in 1u64..700,
        factor in -4.0f32..4.0
    ) {
        let baseline_config = EngineConfig::default().with_threads(1).with_chunk_size(len);
        let (baseline, expected) = run(
            baseline_config,
            vec![Box::new(ramp("t", "chr1", 1, len))],
            &Scale(factor),
        );
        prop_assert!(baseline.is_ok());

        let config = EngineConfig::default().with_threads(threads).with_chunk_size(chunk_size);
        let (result, written) = run(config, vec![Box::new(ramp("t", "chr1", 1, len))], &Scale(factor));
        let report = result.unwrap();
        prop_assert_eq!(report.bases_written, len);
        prop_assert_eq!(report.chunks as u64, len.div_ceil(chunk_size));

        let flat = |records: Vec<(Interval, Vec<f32>)>| -> Vec<f32> {
            records.into_iter().flat_map(|(_, v)| v).collect()
        };
        prop_assert_eq!(flat(written), flat(expected));
    }
}
