//! Parallel chunk scheduling
//!
//! Runs a compute function over every chunk of a chromosome on a dedicated
//! rayon pool. The calling thread submits chunks, receives results over a
//! channel and feeds them to a [`ResultAssembler`], so only the calling
//! thread ever touches the writer.
//!
//! At most `threads + LOOKAHEAD` chunks are submitted but not yet written
//! at any time, which bounds both the work queue and the reorder buffer.

use crate::core::assembler::{ChunkResult, ResultAssembler};
use crate::core::chunker::Chunker;
use crate::core::compute::{ComputeContext, ComputeFunction, ReaderSet};
use crate::core::error::{EngineError, EngineResult};
use crate::core::interval::Chunk;
use crate::core::track::TrackWriter;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Extra chunks allowed past the worker count, so workers are not left idle
/// while the writer catches up.
pub const LOOKAHEAD: usize = 2;

/// Cooperative cancellation flag, checked before each chunk starts
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one chromosome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChromosomeStats {
    pub chunks: usize,
    pub bases: u64,
    pub max_buffered: usize,
}

/// Fixed-size worker pool executing one compute call per chunk
pub struct Scheduler {
    pool: rayon::ThreadPool,
    threads: usize,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(threads: usize, cancel: CancellationToken) -> EngineResult<Self> {
        if threads == 0 {
            return Err(EngineError::InvalidConfig(
                "thread count must be positive".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("track-worker-{}", i))
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?;
        Ok(Self {
            pool,
            threads,
            cancel,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Maximum number of chunks submitted but not yet written
    pub fn window(&self) -> usize {
        self.threads + LOOKAHEAD
    }

    /// Compute and write every chunk of one chromosome.
    ///
    /// Fails fast: the first failed chunk stops submission, the chunks still
    /// running are drained and discarded, and the failure is returned. A
    /// cancellation seen at any point before returning has the same effect.
    pub fn run_chromosome<W: TrackWriter + ?Sized>(
        &self,
        chunks: Chunker,
        compute: &dyn ComputeFunction,
        readers: &ReaderSet,
        writer: &mut W,
    ) -> EngineResult<ChromosomeStats> {
        let mut assembler = ResultAssembler::new(chunks.interval().chrom());
        let window = self.window();
        let (tx, rx) = crossbeam_channel::unbounded::<ChunkResult>();
        let abort = AtomicBool::new(false);
        let ctx = ComputeContext::new(readers);

        let cancel = &self.cancel;

        let mut first_error: Option<EngineError> = None;
        let mut submitted = 0usize;
        let mut received = 0usize;

        // Feed one received result to the assembler, remembering the first failure.
        // Once cancellation is requested nothing more reaches the writer.
        let mut handle = |result: ChunkResult,
                          assembler: &mut ResultAssembler,
                          first_error: &mut Option<EngineError>| {
            if first_error.is_none() && cancel.is_cancelled() {
                abort.store(true, Ordering::SeqCst);
                *first_error = Some(EngineError::Cancelled);
            }
            if first_error.is_some() {
                log::trace!("Discarding result for {}", result.chunk);
                return;
            }
            if let Err(e) = assembler.accept(result, writer) {
                abort.store(true, Ordering::SeqCst);
                *first_error = Some(e);
            }
        };

        self.pool.in_place_scope(|scope| {
            for chunk in chunks {
                // Wait for room in the window before submitting more work.
                while first_error.is_none() && submitted - assembler.next_expected() >= window {
                    match rx.recv() {
                        Ok(result) => {
                            received += 1;
                            handle(result, &mut assembler, &mut first_error);
                        }
                        Err(_) => {
                            first_error = Some(EngineError::ThreadPool(
                                "result channel closed".to_string(),
                            ));
                        }
                    }
                }
                if first_error.is_none() && cancel.is_cancelled() {
                    abort.store(true, Ordering::SeqCst);
                    first_error = Some(EngineError::Cancelled);
                }
                if first_error.is_some() {
                    break;
                }

                let tx = tx.clone();
                let (ctx, abort) = (&ctx, &abort);
                submitted += 1;
                scope.spawn(move |_| {
                    let result = if abort.load(Ordering::SeqCst) || cancel.is_cancelled() {
                        ChunkResult::skipped(chunk)
                    } else {
                        execute(chunk, compute, ctx)
                    };
                    // The receiver outlives the scope, so this cannot fail.
                    let _ = tx.send(result);
                });
            }

            // Drain everything still in flight; after a failure results are discarded.
            while received < submitted {
                match rx.recv() {
                    Ok(result) => {
                        received += 1;
                        handle(result, &mut assembler, &mut first_error);
                    }
                    Err(_) => break,
                }
            }
        });

        if first_error.is_none() && cancel.is_cancelled() {
            first_error = Some(EngineError::Cancelled);
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let stats = ChromosomeStats {
            chunks: assembler.next_expected(),
            bases: assembler.bases_written(),
            max_buffered: assembler.max_pending(),
        };
        assembler.finish()?;
        Ok(stats)
    }
}

/// Run the compute function on one chunk and validate its output
fn execute(chunk: Chunk, compute: &dyn ComputeFunction, ctx: &ComputeContext<'_>) -> ChunkResult {
    log::trace!("Computing chunk {}", chunk);
    match panic::catch_unwind(AssertUnwindSafe(|| compute.compute(&chunk, ctx))) {
        Ok(Ok(values)) if values.len() as u64 == chunk.len() => {
            ChunkResult::completed(chunk, values)
        }
        Ok(Ok(values)) => {
            let err = EngineError::LengthMismatch {
                chunk: chunk.to_string(),
                expected: chunk.len(),
                actual: values.len(),
            };
            ChunkResult::failed(chunk, err)
        }
        Ok(Err(e)) => {
            let err = EngineError::from_compute(chunk.to_string(), e);
            ChunkResult::failed(chunk, err)
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let err = EngineError::ComputeFailure {
                chunk: chunk.to_string(),
                source: anyhow::anyhow!("compute function panicked: {}", message),
            };
            ChunkResult::failed(chunk, err)
        }
    }
}
