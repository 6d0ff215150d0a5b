//! # forkmerge
//!
//! `forkmerge` sorts fixed-width records by one or more columns with a top-down
//! merge sort, either on the calling thread or fork-style across a bounded
//! [`WorkerPool`].
//!
//! ## Key Features
//!
//! - **Multi-key ordering**: a [`CompositeComparator`] applies one comparator per
//!   [`SortKey`], ascending or descending, and the first key that differs decides.
//! - **Ping-pong buffers**: the sort alternates between the input and a single
//!   clone of it, so no allocation happens per recursion level.
//! - **Adaptive leaves**: partitions shorter than [`INSERTION_SORT_THRESHOLD`] are
//!   insertion sorted, and halves that are already in order are copied instead of
//!   merged.
//! - **Bounded parallelism**: the parallel engine forks only while partitions are
//!   longer than `len / workers`, and every join has a deadline.
//! - **Explicit failures**: bad columns, mixed value kinds, join timeouts and
//!   pool shutdown all surface as [`Error`] values.
//!
//! ## Usage
//!
//! ### Serial
//!
//! ```rust
//! use forkmerge::{record, sort, Mode, SortKey};
//!
//! let records = vec![record!["x", 1], record!["x", 3], record!["y", 0]];
//! let sorted = sort(records, &[SortKey::asc(0), SortKey::desc(1)], Mode::Serial).unwrap();
//!
//! assert_eq!(sorted, vec![record!["x", 3], record!["x", 1], record!["y", 0]]);
//! ```
//!
//! ### Parallel
//!
//! The pool is created by the caller, shared by any number of sorts and shut
//! down once at the end.
//!
//! ```rust
//! use forkmerge::{record, sort, Mode, SortKey, WorkerPool};
//!
//! let pool = WorkerPool::new().unwrap();
//! let records: Vec<_> = (0..1000).rev().map(|i| record![i, "row"]).collect();
//!
//! let sorted = sort(records, &[SortKey::asc(0)], Mode::Parallel(&pool)).unwrap();
//! assert_eq!(sorted[0], record![0, "row"]);
//!
//! pool.shutdown();
//! ```
//!
//! ### Generic data
//!
//! The engines are not tied to [`Record`]; [`merge::sort_by`] and
//! [`parallel::sort_by`] accept any `Clone` element and a fallible comparator.
//!
//! ## Performance Characteristics
//!
//! - **Best Case**: O(N) comparisons for already sorted input.
//! - **Worst Case**: O(N log N) comparisons.
//! - **Memory Overhead**: one clone of the input. Records share their fields, so
//!   cloning one is a reference count increment.
//! - **Stability**: equal records keep their input order in both modes.

pub mod compare;
pub mod config;
pub mod error;
pub mod merge;
pub mod parallel;
pub mod pool;
pub mod record;

pub use compare::CompositeComparator;
pub use config::{FaultPolicy, INSERTION_SORT_THRESHOLD, PoolConfig, SortConfig};
pub use error::{Error, Result};
pub use pool::{ShutdownOutcome, TaskHandle, WorkerPool};
pub use record::{Direction, Record, SortKey, Value, ValueKind};

use std::sync::Arc;

use log::debug;

/// Which engine a [`sort`] call runs on.
#[derive(Clone, Copy)]
pub enum Mode<'a> {
    Serial,
    Parallel(&'a WorkerPool),
}

/// Sorts `records` by `keys` with the default [`SortConfig`].
pub fn sort(records: Vec<Record>, keys: &[SortKey], mode: Mode<'_>) -> Result<Vec<Record>> {
    sort_with(records, keys, mode, &SortConfig::default())
}

/// Sorts `records` by `keys`.
///
/// Key columns and record widths are validated before any record is moved.
/// An empty input is returned as is.
pub fn sort_with(
    mut records: Vec<Record>,
    keys: &[SortKey],
    mode: Mode<'_>,
    config: &SortConfig,
) -> Result<Vec<Record>> {
    let Some(first) = records.first() else {
        return Ok(records);
    };
    let width = first.width();
    let comparator = CompositeComparator::new(keys, width, config.fault_policy)?;
    check_widths(&records, width)?;

    match mode {
        Mode::Serial => {
            debug!("serial sort: records={} keys={}", records.len(), keys.len());
            merge::sort_by(&mut records, |a, b| comparator.compare(a, b))?;
            Ok(records)
        }
        Mode::Parallel(pool) => {
            debug!("parallel sort: records={} keys={}", records.len(), keys.len());
            let compare = move |a: &Record, b: &Record| comparator.compare(a, b);
            parallel::sort_by(records, Arc::new(compare), pool, config.join_timeout)
        }
    }
}

fn check_widths(records: &[Record], expected: usize) -> Result<()> {
    match records.iter().position(|r| r.width() != expected) {
        Some(index) => Err(Error::RecordWidth {
            index,
            expected,
            found: records[index].width(),
        }),
        None => Ok(()),
    }
}

pub mod prelude {
    pub use crate::pool::WorkerPool;
    pub use crate::record::{Direction, Record, SortKey, Value};
    pub use crate::{Mode, SortConfig, sort, sort_with};
}
