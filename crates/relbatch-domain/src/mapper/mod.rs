//! Result mappers.
//!
//! A batch fetch for a relationship usually returns one flat list of records
//! for all requested keys. The mappers here rebuild the per-key association
//! from the records themselves, using the same key identity policy as the
//! coalescer, so the backing store is free to return records in any order.
//!
//! - [`group_by_key`]: one-to-many, one (possibly empty) group per key.
//! - [`index_by_key`]: one-to-one, at most one record per key.
//!
//! Failed records and records whose key accessor yields nothing are logged
//! and skipped; they never fail the batch.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RecordError;
use crate::key::{KeyIdentity, NormalizedKey};

/// A record as returned by a batch fetch: the record or a per-record error.
pub type FetchedRecord<R> = Result<R, RecordError>;

/// How [`index_by_key`] treats several records sharing one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// The record appearing later in the fetch result is kept.
    #[default]
    LastWriteWins,
    /// The record appearing first in the fetch result is kept.
    FirstWriteWins,
    /// The key resolves to absent and a warning is logged.
    Reject,
}

/// Groups `records` by the normalized value of `key_of`.
///
/// Returns one entry per requested key, in the order of `requested`. Records
/// keep the relative order in which the batch fetch returned them.
pub fn group_by_key<K, R, F>(records: Vec<FetchedRecord<R>>, key_of: F, requested: &[K]) -> Vec<Vec<R>>
where
    K: KeyIdentity,
    R: Clone,
    F: Fn(&R) -> Option<K>,
{
    let mut groups: HashMap<NormalizedKey, Vec<R>> = HashMap::new();
    for (key, record) in keyed_records(records, &key_of) {
        groups.entry(key).or_default().push(record);
    }

    // Walk backwards so the last occurrence of a requested key takes the
    // group by move and earlier duplicates clone it.
    let mut taken: HashMap<NormalizedKey, usize> = HashMap::new();
    let mut reversed: Vec<Vec<R>> = Vec::with_capacity(requested.len());
    for key in requested.iter().rev() {
        let normalized = key.normalize();
        let group = match taken.get(&normalized) {
            Some(&slot) => reversed[slot].clone(),
            None => {
                taken.insert(normalized.clone(), reversed.len());
                groups.remove(&normalized).unwrap_or_default()
            }
        };
        reversed.push(group);
    }
    reversed.reverse();
    reversed
}

/// Associates at most one record with each requested key.
///
/// Returns one entry per requested key, in the order of `requested`;
/// `None` when no record matched or the key was rejected as duplicated.
pub fn index_by_key<K, R, F>(
    records: Vec<FetchedRecord<R>>,
    key_of: F,
    requested: &[K],
    policy: DuplicateKeyPolicy,
) -> Vec<Option<R>>
where
    K: KeyIdentity,
    R: Clone,
    F: Fn(&R) -> Option<K>,
{
    let mut index: HashMap<NormalizedKey, R> = HashMap::new();
    let mut duplicated: HashSet<NormalizedKey> = HashSet::new();
    for (key, record) in keyed_records(records, &key_of) {
        if index.contains_key(&key) {
            match policy {
                DuplicateKeyPolicy::LastWriteWins => {
                    index.insert(key, record);
                }
                DuplicateKeyPolicy::FirstWriteWins => {}
                DuplicateKeyPolicy::Reject => {
                    duplicated.insert(key);
                }
            }
        } else {
            index.insert(key, record);
        }
    }

    for key in &duplicated {
        warn!(key = %key, "several records share one key; resolving as absent");
        index.remove(key);
    }

    requested
        .iter()
        .map(|key| index.get(&key.normalize()).cloned())
        .collect()
}

/// Drops failed and unkeyed records, pairing the rest with their key.
fn keyed_records<K, R, F>(
    records: Vec<FetchedRecord<R>>,
    key_of: &F,
) -> Vec<(NormalizedKey, R)>
where
    K: KeyIdentity,
    F: Fn(&R) -> Option<K>,
{
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    metrics::counter!("relbatch_record_errors_total").increment(1);
                    warn!(index, error = %err, "skipping record that failed to load");
                    return None;
                }
            };
            match key_of(&record) {
                Some(key) => Some((key.normalize(), record)),
                None => {
                    warn!(index, "skipping record without a key value");
                    None
                }
            }
        })
        .collect()
}
