//! Worker pool that runs download jobs
//!
//! This module handles:
//! - A fixed number of workers pulling from the two-tier [`JobQueue`]
//! - Deduplication of jobs by canonical URL
//! - Retries through delayed re-queueing with a bounded number of timers
//! - Secondary jobs submitted by running jobs, and continuations that wait
//!   for them without holding a worker
//! - Termination at the work fixed point

use crate::config::ScraperConfig;
use crate::engine::job::{AssetError, AssetKind, AssetResult, Job, JobOutcome};
use crate::engine::progress::{spawn_reporter, Counters, ProgressSink};
use crate::engine::queue::JobQueue;
use crate::engine::registry::{Registration, Registry};
use crate::rewrite::AssetMap;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

/// Errors returned by the scheduler API
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is closed, no further jobs are accepted")]
    Closed,
}

/// Pool settings derived from [`ScraperConfig`]
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub workers: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub queue_capacity: usize,
    pub max_pending_retries: usize,
    pub progress_interval: Duration,
}

impl From<&ScraperConfig> for PoolSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            workers: config.workers as usize,
            max_attempts: config.max_attempts,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            queue_capacity: config.effective_queue_capacity(),
            max_pending_retries: config.effective_pending_retries(),
            progress_interval: Duration::from_millis(config.progress_interval_ms),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&ScraperConfig::default())
    }
}

/// What a worker gets back from an executor
pub enum Execution {
    /// The job reached a result on this worker
    Done(AssetResult),
    /// The job waits on other jobs; the scheduler drives the continuation on
    /// its own task and the worker moves on
    Pending(BoxFuture<'static, AssetResult>),
}

/// Runs a single attempt of a job
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    async fn execute(&self, job: &Job, dispatcher: &Dispatcher) -> Execution;
}

/// Handle on the terminal result of a job
pub struct Completion {
    url: String,
    receiver: watch::Receiver<Option<AssetResult>>,
}

impl Completion {
    /// Waits until the job has been finalized
    pub async fn wait(mut self) -> AssetResult {
        match self.receiver.wait_for(Option::is_some).await {
            Ok(state) => state
                .clone()
                .unwrap_or_else(|| Err(AssetError::Abandoned(self.url.clone()))),
            Err(_) => Err(AssetError::Abandoned(self.url.clone())),
        }
    }
}

struct Shared {
    queue: JobQueue,
    registry: Registry,
    counters: Arc<Counters>,
    retry_slots: Arc<Semaphore>,
    settings: PoolSettings,
    failures: Mutex<Vec<JobOutcome>>,
}

impl Shared {
    /// Registers an internal job; returns its completion handle
    ///
    /// Returns `None` when the URL belongs to a script that has not finished,
    /// since waiting on it could close a cycle.
    fn accept_internal(self: &Arc<Self>, job: Job) -> Option<Completion> {
        let url = job.key().to_string();
        self.queue.begin();
        match self.registry.register(&job) {
            Registration::New(receiver) => {
                self.counters.accepted();
                tracing::debug!("Queued secondary {} {}", job.kind, job.url);
                self.queue.push(job);
                Some(Completion { url, receiver })
            }
            Registration::Duplicate(receiver) => {
                self.queue.finish();
                Some(Completion { url, receiver })
            }
            Registration::PendingScript => {
                self.queue.finish();
                tracing::debug!("Not waiting on unfinished script {}", url);
                None
            }
        }
    }

    /// Handles the result of one attempt
    async fn settle(self: &Arc<Self>, mut job: Job, result: AssetResult) {
        let result = match result {
            Ok(path) if path.is_empty() => Err(AssetError::Storage {
                path: job.url.to_string(),
                message: "empty local path".to_string(),
            }),
            other => other,
        };

        match result {
            Err(error) if error.is_retryable() && job.attempt() < self.settings.max_attempts => {
                let permit = match self.retry_slots.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        self.finalize(job, Err(error));
                        return;
                    }
                };

                job.retry_count += 1;
                let delay = self.settings.retry_base_delay * job.retry_count;
                tracing::debug!(
                    "Retrying {} in {:?} (attempt {}/{}): {}",
                    job.url,
                    delay,
                    job.attempt(),
                    self.settings.max_attempts,
                    error
                );

                let shared = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    shared.queue.push(job);
                    drop(permit);
                });
            }
            result => self.finalize(job, result),
        }
    }

    /// Records the terminal result of a job, exactly once per accepted job
    fn finalize(&self, job: Job, result: AssetResult) {
        self.registry.complete(&job, &result);
        self.counters.finished(result.is_ok());

        match &result {
            Ok(path) => tracing::debug!("Stored {} -> {}", job.url, path),
            Err(error) if job.kind == AssetKind::Font => {
                tracing::debug!("Font unavailable: {}", error)
            }
            Err(error) => tracing::warn!(
                "Failed {} {} after {} attempt(s): {}",
                job.kind,
                job.url,
                job.attempt(),
                error
            ),
        }

        if result.is_err() {
            let attempts = job.attempt();
            self.failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(JobOutcome {
                    job,
                    attempts,
                    result,
                });
        }

        self.queue.finish();
    }
}

/// Submission handle given to executors
///
/// Jobs submitted here bypass the queue bound and are accepted even after the
/// scheduler was closed: they belong to the work tree of a running job.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Submits a secondary job without waiting for it
    pub fn dispatch(&self, job: Job) {
        self.shared.accept_internal(job);
    }

    /// Submits a secondary job and returns a handle on its result
    ///
    /// When the URL is already known the handle follows the existing job.
    /// `None` means the URL is a script that is still running; its result
    /// cannot be waited on.
    pub fn dispatch_and_watch(&self, job: Job) -> Option<Completion> {
        self.shared.accept_internal(job)
    }
}

/// Summary handed back by [`Scheduler::collect`]
#[derive(Debug, Clone)]
pub struct PoolReport {
    pub asset_map: AssetMap,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<JobOutcome>,
    pub elapsed: Duration,
}

/// Fixed-size worker pool
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    reporter: JoinHandle<()>,
    progress: Arc<dyn ProgressSink>,
    started: Instant,
}

impl Scheduler {
    /// Starts the workers and the progress reporter
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `settings` - Pool size, retry policy and bounds
    /// * `executor` - Runs a single attempt of a job
    /// * `progress` - Receives periodic `(completed, total)` snapshots
    pub fn start(
        settings: PoolSettings,
        executor: Arc<dyn JobExecutor>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let counters = Arc::new(Counters::default());
        let shared = Arc::new(Shared {
            queue: JobQueue::new(settings.queue_capacity),
            registry: Registry::default(),
            counters: counters.clone(),
            retry_slots: Arc::new(Semaphore::new(settings.max_pending_retries.max(1))),
            settings: settings.clone(),
            failures: Mutex::new(Vec::new()),
        });

        let workers = (0..settings.workers.max(1))
            .map(|id| tokio::spawn(run_worker(id, shared.clone(), executor.clone())))
            .collect();

        let reporter = spawn_reporter(counters, progress.clone(), settings.progress_interval);

        tracing::debug!("Started {} workers", settings.workers);

        Self {
            shared,
            workers,
            reporter,
            progress,
            started: Instant::now(),
        }
    }

    /// Submits a job
    ///
    /// Waits while the queue is full. Dropping the returned future while it
    /// waits finalizes the job as abandoned, so `collect()` still terminates.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The job was queued
    /// * `Ok(false)` - The canonical URL was already known; origins were merged
    /// * `Err(SchedulerError::Closed)` - `close()` was already called
    pub async fn submit(&self, job: Job) -> Result<bool, SchedulerError> {
        if !self.shared.queue.try_begin() {
            return Err(SchedulerError::Closed);
        }

        match self.shared.registry.register(&job) {
            Registration::New(_) => {
                self.shared.counters.accepted();
                tracing::trace!("Queued {} {}", job.kind, job.url);

                let mut guard = PendingSubmit {
                    shared: &self.shared,
                    job: Some(job.clone()),
                };
                self.shared.queue.push_bounded(job).await;
                guard.job = None;
                Ok(true)
            }
            Registration::Duplicate(_) | Registration::PendingScript => {
                self.shared.queue.finish();
                Ok(false)
            }
        }
    }

    /// Stops accepting external jobs; running work and its secondary jobs
    /// still complete
    pub fn close(&self) {
        self.shared.queue.close();
    }

    /// Handle for submitting internal jobs
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            shared: self.shared.clone(),
        }
    }

    /// Closes the scheduler and waits for the work fixed point
    ///
    /// Returns once no job is queued, running, pending on a continuation or
    /// sleeping in a retry timer.
    pub async fn collect(self) -> PoolReport {
        self.close();

        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        self.reporter.abort();
        let (completed, total) = self.shared.counters.snapshot();
        self.progress.on_progress(completed, total);

        let failures = std::mem::take(
            &mut *self
                .shared
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        PoolReport {
            asset_map: self.shared.registry.asset_map(),
            succeeded: self.shared.counters.succeeded(),
            failed: failures.len(),
            failures,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Finalizes a submitted job whose push never happened
struct PendingSubmit<'a> {
    shared: &'a Arc<Shared>,
    job: Option<Job>,
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            let url = job.url.to_string();
            self.shared.finalize(job, Err(AssetError::Abandoned(url)));
        }
    }
}

async fn run_worker(id: usize, shared: Arc<Shared>, executor: Arc<dyn JobExecutor>) {
    let dispatcher = Dispatcher {
        shared: shared.clone(),
    };

    while let Some(job) = shared.queue.pop().await {
        tracing::trace!("Worker {} took {} (attempt {})", id, job.url, job.attempt());

        match executor.execute(&job, &dispatcher).await {
            Execution::Done(result) => shared.settle(job, result).await,
            Execution::Pending(continuation) => {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let result = continuation.await;
                    shared.settle(job, result).await;
                });
            }
        }
    }

    tracing::trace!("Worker {} exiting", id);
}
