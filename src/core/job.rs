//! Job orchestration
//!
//! A [`Job`] owns the readers, the writer and the worker pool for one run
//! and walks through `Created -> DomainResolved -> Running` into one of the
//! terminal states. Readers and writer are closed on every exit path.

use crate::core::chunker::Chunker;
use crate::core::compute::{ComputeFunction, ReaderSet};
use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, EngineResult};
use crate::core::extent::{resolve_domain, ProcessingDomain};
use crate::core::scheduler::{CancellationToken, Scheduler};
use crate::core::track::{TrackReader, TrackWriter};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Identifier of a job within a [`JobRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        JobId(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Created,
    DomainResolved,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Created => "created",
            JobState::DomainResolved => "domain-resolved",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Summary of a completed job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: JobId,
    pub state: JobState,
    pub chromosomes: usize,
    pub chunks: usize,
    pub bases_written: u64,
    /// Largest number of results held back by the reorder stage
    pub max_buffered: usize,
    pub elapsed: Duration,
}

/// State shared between a job and its registry
#[derive(Debug)]
struct JobStatus {
    state: Mutex<JobState>,
    cancel: CancellationToken,
}

impl JobStatus {
    fn new() -> Self {
        Self {
            state: Mutex::new(JobState::Created),
            cancel: CancellationToken::new(),
        }
    }

    fn get(&self) -> JobState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set(&self, state: JobState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }
}

/// Tracks the jobs of a process
///
/// Share it through an `Arc`; ids are handed out atomically unless the
/// caller supplies its own.
#[derive(Debug)]
pub struct JobRegistry {
    next_id: AtomicU64,
    jobs: Mutex<HashMap<JobId, Arc<JobStatus>>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, Arc<JobStatus>>> {
        self.jobs.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn register(&self, id: JobId) -> EngineResult<Arc<JobStatus>> {
        let mut jobs = self.jobs();
        if jobs.contains_key(&id) {
            return Err(EngineError::DuplicateJob(id));
        }
        let status = Arc::new(JobStatus::new());
        jobs.insert(id, Arc::clone(&status));
        Ok(status)
    }

    /// Create and register a job with a freshly generated id
    pub fn create_job(
        &self,
        config: EngineConfig,
        readers: Vec<Box<dyn TrackReader>>,
        writer: Box<dyn TrackWriter>,
    ) -> EngineResult<Job> {
        let id = loop {
            let candidate = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
            if !self.jobs().contains_key(&candidate) {
                break candidate;
            }
        };
        self.create_job_with_id(id, config, readers, writer)
    }

    /// Create and register a job under a caller-supplied id
    pub fn create_job_with_id(
        &self,
        id: JobId,
        config: EngineConfig,
        readers: Vec<Box<dyn TrackReader>>,
        writer: Box<dyn TrackWriter>,
    ) -> EngineResult<Job> {
        config.validate()?;
        let status = self.register(id)?;
        Ok(Job::assemble(id, status, config, readers, writer))
    }

    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.jobs().get(&id).map(|s| s.get())
    }

    /// Request cancellation; the job stops at the next chunk boundary
    pub fn cancel(&self, id: JobId) -> EngineResult<()> {
        let jobs = self.jobs();
        let status = jobs.get(&id).ok_or(EngineError::UnknownJob(id))?;
        status.cancel.cancel();
        Ok(())
    }

    /// Ids of jobs not yet in a terminal state, in ascending order
    pub fn active(&self) -> Vec<JobId> {
        let mut ids: Vec<_> = self
            .jobs()
            .iter()
            .filter(|(_, s)| !s.get().is_terminal())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Forget a finished job, returning its final state
    pub fn remove(&self, id: JobId) -> EngineResult<JobState> {
        let mut jobs = self.jobs();
        let state = jobs.get(&id).ok_or(EngineError::UnknownJob(id))?.get();
        if !state.is_terminal() {
            return Err(EngineError::JobActive(id));
        }
        jobs.remove(&id);
        Ok(state)
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }
}

/// One invocation of the engine
pub struct Job {
    id: JobId,
    status: Arc<JobStatus>,
    config: EngineConfig,
    readers: ReaderSet,
    writer: Box<dyn TrackWriter>,
    domain: Option<ProcessingDomain>,
    closed: bool,
}

impl Job {
    /// Create a job outside any registry (id 0)
    pub fn new(
        config: EngineConfig,
        readers: Vec<Box<dyn TrackReader>>,
        writer: Box<dyn TrackWriter>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self::assemble(
            JobId(0),
            Arc::new(JobStatus::new()),
            config,
            readers,
            writer,
        ))
    }

    fn assemble(
        id: JobId,
        status: Arc<JobStatus>,
        config: EngineConfig,
        readers: Vec<Box<dyn TrackReader>>,
        writer: Box<dyn TrackWriter>,
    ) -> Self {
        Self {
            id,
            status,
            config,
            readers: ReaderSet::new(readers),
            writer,
            domain: None,
            closed: false,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.status.get()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn domain(&self) -> Option<&ProcessingDomain> {
        self.domain.as_ref()
    }

    /// Token that aborts the job at the next chunk boundary when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.status.cancel.clone()
    }

    fn transition(&self, state: JobState) {
        log::debug!("{}: {} -> {}", self.id, self.state(), state);
        self.status.set(state);
    }

    fn ensure_not_terminal(&self) -> EngineResult<()> {
        let state = self.state();
        if state.is_terminal() {
            Err(EngineError::JobFinished(state))
        } else {
            Ok(())
        }
    }

    /// Resolve the processing domain; a no-op if already resolved.
    ///
    /// A resolution failure is terminal: the job is closed and `Failed`.
    pub fn resolve_domain(&mut self) -> EngineResult<ProcessingDomain> {
        self.ensure_not_terminal()?;
        if let Some(domain) = &self.domain {
            return Ok(domain.clone());
        }

        match resolve_domain(&self.readers.readers(), self.config.extent_mode) {
            Ok(domain) => {
                log::info!(
                    "{}: {} input track(s), {} mode, {} chromosome(s), {} bases",
                    self.id,
                    self.readers.len(),
                    self.config.extent_mode,
                    domain.len(),
                    domain.total_bases()
                );
                self.domain = Some(domain.clone());
                self.transition(JobState::DomainResolved);
                Ok(domain)
            }
            Err(e) => {
                if let Err(close_err) = self.close() {
                    log::warn!("{}: error while closing tracks: {}", self.id, close_err);
                }
                self.transition(JobState::Failed);
                Err(e)
            }
        }
    }

    /// Run the job to completion.
    ///
    /// On any error other than `Completed` the output must be treated as
    /// invalid; readers and writer are closed either way.
    pub fn run(&mut self, compute: &dyn ComputeFunction) -> EngineResult<JobReport> {
        self.ensure_not_terminal()?;
        let started = Instant::now();
        self.resolve_domain()?;

        let result = self.execute(compute);
        let close_result = self.close();

        let outcome = match (result, close_result) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                log::warn!("{}: error while closing tracks: {}", self.id, close_err);
                Err(e)
            }
        };

        match outcome {
            Ok((chromosomes, chunks, bases_written, max_buffered)) => {
                self.transition(JobState::Completed);
                let report = JobReport {
                    job_id: self.id,
                    state: JobState::Completed,
                    chromosomes,
                    chunks,
                    bases_written,
                    max_buffered,
                    elapsed: started.elapsed(),
                };
                log::info!(
                    "{}: completed {} chunk(s), {} bases in {:.2}s",
                    self.id,
                    report.chunks,
                    report.bases_written,
                    report.elapsed.as_secs_f64()
                );
                Ok(report)
            }
            Err(EngineError::Cancelled) => {
                self.transition(JobState::Cancelled);
                log::info!("{}: cancelled", self.id);
                Err(EngineError::Cancelled)
            }
            Err(e) => {
                self.transition(JobState::Failed);
                log::error!("{}: failed: {}", self.id, e);
                Err(e)
            }
        }
    }

    /// Returns (chromosomes, chunks, bases, max buffered)
    fn execute(
        &mut self,
        compute: &dyn ComputeFunction,
    ) -> EngineResult<(usize, usize, u64, usize)> {
        let domain = self.domain.clone().unwrap_or_default();
        self.transition(JobState::Running);

        if domain.is_empty() {
            if self.config.fail_on_empty_domain {
                return Err(EngineError::EmptyDomain);
            }
            log::warn!("{}: processing domain is empty, nothing to do", self.id);
            return Ok((0, 0, 0, 0));
        }

        let scheduler = Scheduler::new(self.config.thread_count, self.cancellation_token())?;
        log::info!(
            "{}: {} worker thread(s), chunk size {}",
            self.id,
            scheduler.threads(),
            self.config.chunk_size
        );

        let (mut chunks, mut bases, mut max_buffered) = (0, 0, 0);
        for interval in domain.iter() {
            let chunker = Chunker::new(interval.clone(), self.config.chunk_size);
            log::debug!(
                "{}: processing {} in {} chunk(s)",
                self.id,
                interval,
                chunker.num_chunks()
            );
            let stats =
                scheduler.run_chromosome(chunker, compute, &self.readers, self.writer.as_mut())?;
            chunks += stats.chunks;
            bases += stats.bases;
            max_buffered = max_buffered.max(stats.max_buffered);
        }
        Ok((domain.len(), chunks, bases, max_buffered))
    }

    /// Close readers and writer once; later calls are no-ops
    fn close(&mut self) -> EngineResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let readers = self.readers.close_all();
        let writer = self.writer.close();
        readers?;
        writer?;
        Ok(())
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("{}: error while closing tracks: {}", self.id, e);
        }
        // A job abandoned before finishing must not stay active in its registry.
        if !self.state().is_terminal() {
            self.transition(JobState::Cancelled);
        }
    }
}
