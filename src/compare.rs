//! Multi-key record comparator.
//!
//! [`CompositeComparator`] applies one field comparator per [`SortKey`] in the
//! order the keys were given. The first key that tells the two records apart
//! decides; records that tie on every key compare `Equal`.

use std::cmp::Ordering;

use log::warn;

use crate::config::FaultPolicy;
use crate::error::{Error, Result};
use crate::record::{Record, SortKey};

/// Immutable comparator over whole records, safe to share across threads.
#[derive(Clone, Debug)]
pub struct CompositeComparator {
    keys: Vec<SortKey>,
    width: usize,
    policy: FaultPolicy,
}

impl CompositeComparator {
    /// Builds the comparator for records of `width` fields.
    ///
    /// Every key column is checked here, so a bad column fails before any
    /// record is compared.
    pub fn new(keys: &[SortKey], width: usize, policy: FaultPolicy) -> Result<Self> {
        if let Some(key) = keys.iter().find(|key| key.column >= width) {
            return Err(Error::InvalidColumn {
                column: key.column,
                width,
            });
        }
        Ok(Self {
            keys: keys.to_vec(),
            width,
            policy,
        })
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn policy(&self) -> FaultPolicy {
        self.policy
    }

    /// Compares two records key by key.
    pub fn compare(&self, a: &Record, b: &Record) -> Result<Ordering> {
        for key in &self.keys {
            match compare_field(a, b, *key) {
                Ok(Ordering::Equal) => {}
                Ok(ordering) => return Ok(ordering),
                Err(err) => match self.policy {
                    FaultPolicy::Propagate => return Err(err),
                    FaultPolicy::Inconclusive => {
                        warn!("sort key on column {} gave no verdict: {err}", key.column);
                    }
                },
            }
        }
        Ok(Ordering::Equal)
    }
}

#[inline]
fn compare_field(a: &Record, b: &Record, key: SortKey) -> Result<Ordering> {
    let column = key.column;
    let (left, right) = match (a.get(column), b.get(column)) {
        (Some(left), Some(right)) => (left, right),
        _ => {
            return Err(Error::InvalidColumn {
                column,
                width: a.width().min(b.width()),
            });
        }
    };
    left.try_cmp(right)
        .map(|ordering| key.direction.apply(ordering))
        .ok_or(Error::ComparatorFault {
            column,
            left: left.kind(),
            right: right.kind(),
        })
}
