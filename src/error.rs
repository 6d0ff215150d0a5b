//! Error types returned by the sorting engines and the worker pool.

use std::time::Duration;

use thiserror::Error;

use crate::record::ValueKind;

/// Everything that can abort a sort call or a pool operation.
#[derive(Error, Debug)]
pub enum Error {
    /// A sort key names a column the records do not have.
    #[error("column {column} exceeds the record width 0-{}", .width.saturating_sub(1))]
    InvalidColumn { column: usize, width: usize },

    /// A record's field count differs from the first record's.
    #[error("record {index} has {found} fields, expected {expected}")]
    RecordWidth {
        index: usize,
        expected: usize,
        found: usize,
    },

    /// Two values of one column could not be ordered against each other.
    #[error("cannot compare {left} with {right} in column {column}")]
    ComparatorFault {
        column: usize,
        left: ValueKind,
        right: ValueKind,
    },

    /// A submitted task did not finish within the join deadline.
    #[error("task not joined within {timeout:?}")]
    JoinTimeout { timeout: Duration },

    /// The task was discarded before running, by a forced pool shutdown.
    #[error("task cancelled by pool shutdown")]
    TaskCancelled,

    /// The task panicked on its worker thread.
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// Work was submitted after the pool started shutting down.
    #[error("worker pool is shut down")]
    PoolShutDown,

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread")]
    PoolSpawn(#[from] std::io::Error),

    /// Workers were still alive after both shutdown waits.
    #[error("pool did not terminate: {live_workers} worker(s) still running")]
    PoolDrainFailure { live_workers: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
