//! Serial top-down merge sort over a ping-pong buffer pair.
//!
//! The sort keeps two buffers holding the same records. Each recursion level
//! sorts its two halves into the *other* buffer (roles swapped), then merges
//! them back, so after the initial clone no further allocation happens.
//! Partitions shorter than [`INSERTION_SORT_THRESHOLD`] are insertion sorted
//! in place, and a partition whose halves are already in order is bulk
//! copied instead of merged.
//!
//! The comparator is fallible: any error it returns aborts the sort and is
//! handed back to the caller unchanged.

use std::cmp::Ordering;
use std::convert::Infallible;

use log::trace;

use crate::config::INSERTION_SORT_THRESHOLD;

/// Two equally sized views of one partition, named by their current role.
///
/// On entry to [`sort_into`] both slots hold the same records; on return the
/// destination holds them sorted and the source is scratch.
pub(crate) struct BufferPair<'a, T> {
    pub source: &'a mut [T],
    pub destination: &'a mut [T],
}

impl<'a, T> BufferPair<'a, T> {
    pub fn new(source: &'a mut [T], destination: &'a mut [T]) -> Self {
        debug_assert_eq!(source.len(), destination.len());
        Self {
            source,
            destination,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.destination.len()
    }

    /// Reborrows the pair with source and destination exchanged.
    #[inline]
    pub fn swapped(&mut self) -> BufferPair<'_, T> {
        BufferPair {
            source: &mut *self.destination,
            destination: &mut *self.source,
        }
    }

    /// Splits both slots at `mid` into two disjoint pairs covering the whole range.
    #[inline]
    pub fn split_at(self, mid: usize) -> (BufferPair<'a, T>, BufferPair<'a, T>) {
        let (source_left, source_right) = self.source.split_at_mut(mid);
        let (destination_left, destination_right) = self.destination.split_at_mut(mid);
        (
            BufferPair::new(source_left, destination_left),
            BufferPair::new(source_right, destination_right),
        )
    }
}

/// Sorts `data` with a fallible comparator.
///
/// Equal elements keep their relative order.
///
/// # Examples
///
/// ```
/// use forkmerge::merge;
///
/// let mut data = vec![5, 3, 9, 1, 4, 4, 8, 0, 2];
/// merge::sort_by(&mut data, |a, b| Ok::<_, ()>(a.cmp(b))).unwrap();
/// assert_eq!(data, vec![0, 1, 2, 3, 4, 4, 5, 8, 9]);
/// ```
pub fn sort_by<T, E, F>(data: &mut [T], compare: F) -> Result<(), E>
where
    T: Clone,
    F: Fn(&T, &T) -> Result<Ordering, E>,
{
    if data.len() < 2 {
        return Ok(());
    }
    let mut aux = data.to_vec();
    sort_into(BufferPair::new(&mut aux, data), &compare)
}

/// Sorts `data` by its natural order.
pub fn sort<T: Ord + Clone>(data: &mut [T]) {
    let Ok(()) = sort_by(data, |a, b| Ok::<_, Infallible>(a.cmp(b)));
}

/// Returns whether every adjacent pair of `data` is non-decreasing.
pub fn is_sorted_by<T, E, F>(data: &[T], compare: F) -> Result<bool, E>
where
    F: Fn(&T, &T) -> Result<Ordering, E>,
{
    for pair in data.windows(2) {
        if compare(&pair[0], &pair[1])? == Ordering::Greater {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Sorts the records of `pair` into its destination.
pub(crate) fn sort_into<T, E, F>(mut pair: BufferPair<'_, T>, compare: &F) -> Result<(), E>
where
    T: Clone,
    F: Fn(&T, &T) -> Result<Ordering, E>,
{
    let len = pair.len();
    if len < INSERTION_SORT_THRESHOLD {
        return insertion_sort(pair.destination, compare);
    }

    let mid = len / 2;
    trace!("serial split: len={len} mid={mid}");

    // Sort both halves of the destination into the source.
    let (left, right) = pair.swapped().split_at(mid);
    sort_into(left, compare)?;
    sort_into(right, compare)?;

    merge_halves(pair, mid, compare)
}

/// Combines the two sorted halves held in `pair.source` (split at `mid`)
/// into `pair.destination`.
pub(crate) fn merge_halves<T, E, F>(pair: BufferPair<'_, T>, mid: usize, compare: &F) -> Result<(), E>
where
    T: Clone,
    F: Fn(&T, &T) -> Result<Ordering, E>,
{
    let BufferPair {
        source,
        destination,
    } = pair;

    // Halves already in order relative to each other.
    if compare(&source[mid - 1], &source[mid])? != Ordering::Greater {
        destination.clone_from_slice(source);
        return Ok(());
    }

    let (left, right) = source.split_at(mid);
    let (mut p, mut q) = (0, 0);
    for slot in destination.iter_mut() {
        // Ties take the left head.
        let take_left =
            q >= right.len() || (p < left.len() && compare(&left[p], &right[q])? != Ordering::Greater);
        if take_left {
            slot.clone_from(&left[p]);
            p += 1;
        } else {
            slot.clone_from(&right[q]);
            q += 1;
        }
    }
    Ok(())
}

fn insertion_sort<T, E, F>(v: &mut [T], compare: &F) -> Result<(), E>
where
    F: Fn(&T, &T) -> Result<Ordering, E>,
{
    for i in 1..v.len() {
        let mut j = i;
        while j > 0 && compare(&v[j - 1], &v[j])? == Ordering::Greater {
            v.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(())
}
