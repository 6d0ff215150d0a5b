//! Fixed-size worker pool.
//!
//! A [`WorkerPool`] owns `N` OS threads fed from one shared job queue. It is
//! a plain executor: jobs are arbitrary `FnOnce` closures and results come
//! back through a [`TaskHandle`]. The pool is built once, used by any number
//! of sorts, and stopped with [`WorkerPool::shutdown`].
//!
//! Shutdown runs in two phases, each with its own bounded wait:
//!
//! 1. **Graceful**: the queue is closed; workers finish queued and running
//!    jobs, then exit.
//! 2. **Forced**: the cancel flag is raised; workers drop queued jobs without
//!    running them. Running jobs cannot be interrupted.
//!
//! If workers are still alive after both waits, shutdown returns
//! [`ShutdownOutcome::Leaked`] instead of blocking.
//!
//! A job that waits on another job of the same pool must not park its worker:
//! with every worker parked on a child still sitting in the queue, nothing
//! would ever run again. Such waits go through `TaskHandle::join_helping`,
//! which keeps running queued jobs on the waiting worker until the awaited
//! result arrives or the deadline passes.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, select};
use cuneiform::cuneiform;
use log::{debug, warn};

use crate::config::PoolConfig;
use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static ON_WORKER: Cell<bool> = const { Cell::new(false) };
}

// Worker bookkeeping touched by every worker; kept on its own cache line.
#[cuneiform]
struct Shared {
    live_workers: AtomicUsize,
    cancelled: AtomicBool,
}

/// Submission side of the pool, shared with tasks that fork further tasks.
pub(crate) struct PoolInner {
    queue: RwLock<Option<Sender<Job>>>,
    // Lets a worker blocked on a join pull queued jobs itself.
    jobs: Receiver<Job>,
    shared: Shared,
    workers: usize,
}

impl PoolInner {
    pub(crate) fn submit<R, F>(&self, job: F) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job)).map_err(panic_message);
            // The handle may have been dropped after a join timeout.
            let _ = result_tx.send(outcome);
        });

        let queue = self.queue.read().unwrap_or_else(PoisonError::into_inner);
        match queue.as_ref() {
            Some(sender) => sender.send(job).map_err(|_| Error::PoolShutDown)?,
            None => return Err(Error::PoolShutDown),
        }
        Ok(TaskHandle { result: result_rx })
    }

    /// Runs `job` unless a forced shutdown has started.
    fn run(&self, job: Job) {
        if self.shared.cancelled.load(Ordering::Acquire) {
            drop(job);
        } else {
            job();
        }
    }

    /// Closes the queue. Returns `false` if it was already closed.
    fn close(&self) -> bool {
        self.queue
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    fn is_closed(&self) -> bool {
        self.queue
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// How a call to [`WorkerPool::shutdown`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every queued job ran and all workers exited.
    Drained,
    /// The graceful wait expired; leftover queued jobs were discarded.
    Forced,
    /// Workers were still running jobs after both waits.
    Leaked { live_workers: usize },
}

impl ShutdownOutcome {
    /// Turns [`ShutdownOutcome::Leaked`] into [`Error::PoolDrainFailure`].
    pub fn into_result(self) -> Result<()> {
        match self {
            ShutdownOutcome::Leaked { live_workers } => Err(Error::PoolDrainFailure { live_workers }),
            ShutdownOutcome::Drained | ShutdownOutcome::Forced => Ok(()),
        }
    }
}

/// Fixed-size thread pool with bounded shutdown.
///
/// # Examples
///
/// ```
/// use forkmerge::WorkerPool;
/// use std::time::Duration;
///
/// let pool = WorkerPool::new().unwrap();
/// let handle = pool.submit(|| 6 * 7).unwrap();
/// assert_eq!(handle.join_timeout(Duration::from_secs(5)).unwrap(), 42);
/// pool.shutdown();
/// ```
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    // Disconnects once every worker has exited.
    exited: Receiver<()>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    config: PoolConfig,
}

impl WorkerPool {
    /// Starts one worker per logical CPU.
    pub fn new() -> Result<Self> {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Result<Self> {
        let workers = config.worker_count();
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (exit_tx, exit_rx) = crossbeam_channel::bounded::<()>(0);

        let inner = Arc::new(PoolInner {
            queue: RwLock::new(Some(job_tx)),
            jobs: job_rx.clone(),
            shared: Shared {
                live_workers: AtomicUsize::new(0),
                cancelled: AtomicBool::new(false),
            },
            workers,
        });

        let mut threads = Vec::with_capacity(workers);
        for index in 0..workers {
            let jobs = job_rx.clone();
            let exit = exit_tx.clone();
            let worker_inner = Arc::clone(&inner);
            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || run_worker(jobs, worker_inner, exit));
            match spawned {
                Ok(handle) => {
                    inner.shared.live_workers.fetch_add(1, Ordering::AcqRel);
                    threads.push(handle);
                }
                Err(err) => {
                    inner.close();
                    return Err(Error::PoolSpawn(err));
                }
            }
        }
        debug!("worker pool started: workers={workers}");

        Ok(Self {
            inner,
            exited: exit_rx,
            threads: Mutex::new(threads),
            config,
        })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.inner.workers
    }

    /// Workers that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.inner.shared.live_workers.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.is_closed()
    }

    /// Queues `job` and returns a handle to its result. Never blocks.
    pub fn submit<R, F>(&self, job: F) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.inner.submit(job)
    }

    pub(crate) fn inner(&self) -> Arc<PoolInner> {
        Arc::clone(&self.inner)
    }

    /// Stops the pool, waiting at most the configured graceful and forced
    /// timeouts. Safe to call more than once.
    pub fn shutdown(&self) -> ShutdownOutcome {
        if self.inner.close() {
            debug!("worker pool shutting down: live_workers={}", self.live_workers());
        }

        if self.wait_for_exit(self.config.graceful_timeout) {
            self.join_threads();
            return ShutdownOutcome::Drained;
        }

        self.inner.shared.cancelled.store(true, Ordering::Release);
        debug!("worker pool cancelling queued jobs");
        if self.wait_for_exit(self.config.forced_timeout) {
            self.join_threads();
            return ShutdownOutcome::Forced;
        }

        let live_workers = self.live_workers();
        warn!("worker pool did not terminate: {live_workers} worker(s) still running");
        ShutdownOutcome::Leaked { live_workers }
    }

    fn wait_for_exit(&self, timeout: Duration) -> bool {
        matches!(
            self.exited.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    fn join_threads(&self) {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Let workers run out the queue and exit on their own.
        self.inner.close();
    }
}

fn run_worker(jobs: Receiver<Job>, inner: Arc<PoolInner>, _exit: Sender<()>) {
    ON_WORKER.with(|on| on.set(true));
    for job in jobs.iter() {
        inner.run(job);
    }
    inner.shared.live_workers.fetch_sub(1, Ordering::AcqRel);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Eventual result of a submitted job.
#[must_use = "dropping a TaskHandle abandons the task's result"]
pub struct TaskHandle<R> {
    result: Receiver<std::result::Result<R, String>>,
}

impl<R> TaskHandle<R> {
    /// Waits for the job, failing with [`Error::JoinTimeout`] after `timeout`.
    pub fn join_timeout(self, timeout: Duration) -> Result<R> {
        self.wait(timeout, timeout)
    }

    // `timeout` is the full deadline reported on expiry.
    fn wait(&self, remaining: Duration, timeout: Duration) -> Result<R> {
        match self.result.recv_timeout(remaining) {
            Ok(outcome) => outcome.map_err(Error::TaskPanicked),
            Err(RecvTimeoutError::Timeout) => Err(Error::JoinTimeout { timeout }),
            Err(RecvTimeoutError::Disconnected) => Err(Error::TaskCancelled),
        }
    }

    /// Waits for the job without a deadline.
    pub fn join(self) -> Result<R> {
        match self.result.recv() {
            Ok(outcome) => outcome.map_err(Error::TaskPanicked),
            Err(_) => Err(Error::TaskCancelled),
        }
    }

    /// Like [`TaskHandle::join_timeout`], but a worker thread keeps running
    /// jobs from `pool`'s queue while it waits. Other threads just wait.
    ///
    /// A helped job runs to completion even if that overshoots the deadline.
    pub(crate) fn join_helping(self, pool: &PoolInner, timeout: Duration) -> Result<R> {
        if !ON_WORKER.with(Cell::get) {
            return self.join_timeout(timeout);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            select! {
                recv(self.result) -> outcome => {
                    return match outcome {
                        Ok(outcome) => outcome.map_err(Error::TaskPanicked),
                        Err(_) => Err(Error::TaskCancelled),
                    };
                }
                recv(pool.jobs) -> job => match job {
                    Ok(job) => pool.run(job),
                    // Queue closed and empty: the awaited job is already running.
                    Err(_) => return self.wait(remaining, timeout),
                },
                default(remaining) => return Err(Error::JoinTimeout { timeout }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::time::Instant;

    fn pool(workers: usize, graceful_ms: u64, forced_ms: u64) -> WorkerPool {
        WorkerPool::with_config(
            PoolConfig::default()
                .with_workers(NonZeroUsize::new(workers).unwrap())
                .with_shutdown_timeouts(
                    Duration::from_millis(graceful_ms),
                    Duration::from_millis(forced_ms),
                ),
        )
        .unwrap()
    }

    #[test]
    fn test_runs_jobs_and_drains() {
        let pool = pool(4, 5_000, 5_000);
        assert_eq!(pool.workers(), 4);
        let handles: Vec<_> = (0..32).map(|i| pool.submit(move || i * 2).unwrap()).collect();
        let results: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, (0..32).map(|i| i * 2).collect::<Vec<_>>());
        assert_eq!(pool.shutdown(), ShutdownOutcome::Drained);
        assert_eq!(pool.live_workers(), 0);
        assert!(pool.is_shut_down());
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = pool(1, 5_000, 5_000);
        pool.shutdown();
        assert!(matches!(pool.submit(|| ()), Err(Error::PoolShutDown)));
        // Second shutdown reports the already drained state.
        assert_eq!(pool.shutdown(), ShutdownOutcome::Drained);
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let pool = pool(1, 5_000, 5_000);
        let bad = pool.submit(|| -> i32 { panic!("boom") }).unwrap();
        assert!(matches!(bad.join(), Err(Error::TaskPanicked(msg)) if msg == "boom"));
        let good = pool.submit(|| 1).unwrap();
        assert_eq!(good.join().unwrap(), 1);
        pool.shutdown();
    }

    #[test]
    fn test_join_timeout() {
        let pool = pool(1, 5_000, 5_000);
        let slow = pool
            .submit(|| thread::sleep(Duration::from_millis(300)))
            .unwrap();
        assert!(matches!(
            slow.join_timeout(Duration::from_millis(10)),
            Err(Error::JoinTimeout { .. })
        ));
        pool.shutdown();
    }

    #[test]
    fn test_nested_join_on_single_worker_runs_child() {
        let pool = pool(1, 5_000, 5_000);
        let inner = pool.inner();
        let parent = pool
            .submit(move || {
                let child = inner.submit(|| 21).unwrap();
                child.join_helping(&inner, Duration::from_secs(5)).map(|v| v * 2)
            })
            .unwrap();
        assert_eq!(parent.join_timeout(Duration::from_secs(10)).unwrap().unwrap(), 42);
        assert_eq!(pool.shutdown(), ShutdownOutcome::Drained);
    }

    #[test]
    fn test_join_helping_off_worker_only_waits() {
        let pool = pool(1, 5_000, 5_000);
        let inner = pool.inner();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let blocker = pool.submit(move || release_rx.recv().is_ok()).unwrap();
        let queued = pool.submit(|| 5).unwrap();
        // The calling thread is not a worker, so it must not run `queued` itself.
        assert!(matches!(
            queued.join_helping(&inner, Duration::from_millis(20)),
            Err(Error::JoinTimeout { .. })
        ));
        release_tx.send(()).unwrap();
        assert!(blocker.join().unwrap());
        pool.shutdown();
    }

    #[test]
    fn test_forced_shutdown_cancels_queued_jobs() {
        let pool = pool(1, 20, 5_000);
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let running = pool
            .submit(move || {
                let _ = started_tx.send(());
                thread::sleep(Duration::from_millis(200));
                "done"
            })
            .unwrap();
        let queued = pool.submit(|| "never").unwrap();
        started_rx.recv().unwrap();

        assert_eq!(pool.shutdown(), ShutdownOutcome::Forced);
        assert_eq!(running.join().unwrap(), "done");
        assert!(matches!(queued.join(), Err(Error::TaskCancelled)));
    }

    #[test]
    fn test_shutdown_is_bounded_with_stuck_worker() {
        let pool = pool(1, 30, 30);
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let _stuck = pool
            .submit(move || {
                let _ = started_tx.send(());
                thread::sleep(Duration::from_secs(2));
            })
            .unwrap();
        started_rx.recv().unwrap();

        let start = Instant::now();
        let outcome = pool.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(outcome, ShutdownOutcome::Leaked { live_workers: 1 });
        assert!(matches!(
            outcome.into_result(),
            Err(Error::PoolDrainFailure { live_workers: 1 })
        ));
    }
}
