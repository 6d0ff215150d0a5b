//! Fork-style parallel merge sort on a [`WorkerPool`].
//!
//! The recursion has the same shape as the serial engine in [`crate::merge`].
//! The difference is at the split: while a partition is longer than
//! `len / workers` (fixed once per top-level call), the left half is handed to
//! the pool as a task and the right half is sorted on the current thread.
//! The parent then joins the left task with a bounded wait and merges.
//! Shorter partitions are sorted serially and never fork.
//!
//! Forked tasks own the half of the buffer pair they write. A join that
//! times out fails the whole sort with [`Error::JoinTimeout`]; the abandoned
//! task keeps its buffers, so nothing is merged from a half that may still
//! be written to. The price is paid at every forked level: both buffers are
//! split with `split_off` (two allocations plus copies of the right halves)
//! and glued back with `append` before the merge. Forking stops at
//! `len / workers`, so this happens at most `log2(workers)` levels deep;
//! below that the serial engine runs on the one initial clone.
//!
//! A forked task that forks again waits for its child with a helping join,
//! so the worker keeps running queued jobs instead of parking. Any number of
//! sorts can therefore share one pool without starving it.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::config::INSERTION_SORT_THRESHOLD;
use crate::error::{Error, Result};
use crate::merge::{self, BufferPair};
use crate::pool::{PoolInner, WorkerPool};

/// Owned buffer pair of one forked partition.
struct OwnedPair<T> {
    source: Vec<T>,
    destination: Vec<T>,
}

impl<T> OwnedPair<T> {
    fn buffers(&mut self) -> BufferPair<'_, T> {
        BufferPair::new(&mut self.source, &mut self.destination)
    }
}

/// Everything a forked task needs, shared by every task of one sort call.
struct Fork<F> {
    pool: Arc<PoolInner>,
    compare: Arc<F>,
    min_partition: usize,
    join_timeout: Duration,
}

/// Sorts `data` using `pool`, waiting at most `join_timeout` on each fork.
///
/// Produces exactly the order [`merge::sort_by`] produces for the same input
/// and comparator.
pub fn sort_by<T, F>(
    data: Vec<T>,
    compare: Arc<F>,
    pool: &WorkerPool,
    join_timeout: Duration,
) -> Result<Vec<T>>
where
    T: Clone + Send + 'static,
    F: Fn(&T, &T) -> Result<Ordering> + Send + Sync + 'static,
{
    let len = data.len();
    if len < 2 {
        return Ok(data);
    }

    let fork = Arc::new(Fork {
        pool: pool.inner(),
        compare,
        min_partition: len / pool.workers(),
        join_timeout,
    });
    debug!(
        "parallel sort: len={len} workers={} min_partition={}",
        pool.workers(),
        fork.min_partition
    );

    let pair = OwnedPair {
        source: data.clone(),
        destination: data,
    };
    Ok(fork_sort(&fork, pair)?.destination)
}

/// Sorts `data` by its natural order using `pool`.
pub fn sort<T>(data: Vec<T>, pool: &WorkerPool, join_timeout: Duration) -> Result<Vec<T>>
where
    T: Ord + Clone + Send + 'static,
{
    sort_by(data, Arc::new(|a: &T, b: &T| Ok::<_, Error>(a.cmp(b))), pool, join_timeout)
}

fn fork_sort<T, F>(fork: &Arc<Fork<F>>, mut pair: OwnedPair<T>) -> Result<OwnedPair<T>>
where
    T: Clone + Send + 'static,
    F: Fn(&T, &T) -> Result<Ordering> + Send + Sync + 'static,
{
    let len = pair.destination.len();
    if len <= fork.min_partition || len < INSERTION_SORT_THRESHOLD {
        merge::sort_into(pair.buffers(), &*fork.compare)?;
        return Ok(pair);
    }

    let mid = len / 2;
    trace!("parallel split: len={len} mid={mid}");

    // Halves of the destination sort into the source, so the roles swap.
    let OwnedPair {
        mut source,
        mut destination,
    } = pair;
    let right = OwnedPair {
        source: destination.split_off(mid),
        destination: source.split_off(mid),
    };
    let left = OwnedPair {
        source: destination,
        destination: source,
    };

    let task = Arc::clone(fork);
    let handle = fork.pool.submit(move || fork_sort(&task, left))?;
    let mut right = fork_sort(fork, right)?;
    let left = handle
        .join_helping(&fork.pool, fork.join_timeout)
        .inspect_err(|err| {
            if let Error::JoinTimeout { timeout } = err {
                warn!("forked partition of {mid} records not joined within {timeout:?}");
            }
        })??;

    let mut source = left.destination;
    source.append(&mut right.destination);
    let mut destination = left.source;
    destination.append(&mut right.source);

    let mut pair = OwnedPair {
        source,
        destination,
    };
    merge::merge_halves(pair.buffers(), mid, &*fork.compare)?;
    Ok(pair)
}
