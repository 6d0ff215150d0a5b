//! Tunables for sort calls and worker pools.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Partitions shorter than this are insertion sorted instead of split.
pub const INSERTION_SORT_THRESHOLD: usize = 7;

/// Default bound on how long a parent waits for its forked left half.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound for each of the two shutdown phases.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// What the composite comparator does when a key cannot order two values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Abort the sort with [`Error::ComparatorFault`](crate::Error::ComparatorFault).
    #[default]
    Propagate,
    /// Treat the key as giving no verdict and move on to the next key.
    Inconclusive,
}

/// Per-call sort settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortConfig {
    pub join_timeout: Duration,
    pub fault_policy: FaultPolicy,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            fault_policy: FaultPolicy::default(),
        }
    }
}

impl SortConfig {
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }
}

/// Construction settings for a [`WorkerPool`](crate::WorkerPool).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker count; `None` uses the number of logical CPUs.
    pub workers: Option<NonZeroUsize>,
    /// Worker threads are named `<thread_name>-<index>`.
    pub thread_name: String,
    pub graceful_timeout: Duration,
    pub forced_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: None,
            thread_name: "forkmerge-worker".to_string(),
            graceful_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            forced_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_shutdown_timeouts(mut self, graceful: Duration, forced: Duration) -> Self {
        self.graceful_timeout = graceful;
        self.forced_timeout = forced;
        self
    }

    /// Resolved worker count.
    pub(crate) fn worker_count(&self) -> usize {
        self.workers.map_or_else(|| num_cpus::get().max(1), NonZeroUsize::get)
    }
}
