use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::clock::TimestampSource;
use crate::error::{Error, Result};
use crate::events::OpCrdt;
use crate::timed::TimedValue;
use crate::{Crdt, DeltaCrdt};

type Log<K, V, T> = HashMap<K, TimedValue<V, T>>;

/// A last-writer-wins element dictionary (LWW-Element-Dictionary).
///
/// Every key has at most one entry in an adds log and one in a removes log.
/// Each entry carries the timestamp of the write that produced it, and an
/// entry is only ever replaced by one with a strictly greater timestamp.
/// A key is visible when it has been added and not removed at a later
/// time; an add and a remove with equal timestamps leave the key visible.
///
/// Timestamps come from the [`TimestampSource`] given at construction.
///
/// # Example
///
/// ```
/// use lww_dict::clock::ManualClock;
/// use lww_dict::prelude::*;
///
/// let clock = ManualClock::new();
/// let mut d1 = LWWDictionary::new(&clock);
/// let mut d2 = LWWDictionary::new(&clock);
///
/// d1.add("key", "old");
/// clock.tick();
/// d2.add("key", "new");
///
/// // The later write wins whichever way the merge goes
/// d1.merge(&d2);
/// assert_eq!(d1.get("key"), Some(&"new"));
///
/// clock.tick();
/// d1.remove("key");
/// d2.merge(&d1);
/// assert_eq!(d2.get("key"), None);
/// ```
pub struct LWWDictionary<K, V, S: TimestampSource> {
    source: S,
    adds: Log<K, V, S::Timestamp>,
    removes: Log<K, V, S::Timestamp>,
}

impl<K, V, S: TimestampSource> LWWDictionary<K, V, S> {
    /// Create an empty dictionary that stamps its writes with `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            adds: HashMap::new(),
            removes: HashMap::new(),
        }
    }

    /// Borrow the timestamp source this replica was built with.
    pub fn time_source(&self) -> &S {
        &self.source
    }

    /// Raw adds log: every key ever added, with its latest add.
    pub fn adds(&self) -> impl Iterator<Item = (&K, &TimedValue<V, S::Timestamp>)> {
        self.adds.iter()
    }

    /// Raw removes log: every key ever removed, with its latest tombstone.
    pub fn removes(&self) -> impl Iterator<Item = (&K, &TimedValue<V, S::Timestamp>)> {
        self.removes.iter()
    }

    /// The greatest timestamp in either log, or `None` for a blank replica.
    ///
    /// After a merge, feed this to the local source (for example
    /// [`HybridClock::receive`](crate::clock::HybridClock::receive) or
    /// [`LogicalClock::observe`](crate::clock::LogicalClock::observe)) so
    /// the next local write is stamped after everything the replica has seen.
    pub fn latest_timestamp(&self) -> Option<&S::Timestamp> {
        self.adds
            .values()
            .chain(self.removes.values())
            .map(TimedValue::timestamp)
            .max()
    }

    /// Take the replica apart into its source and both logs.
    pub fn into_parts(
        self,
    ) -> (
        S,
        HashMap<K, TimedValue<V, S::Timestamp>>,
        HashMap<K, TimedValue<V, S::Timestamp>>,
    ) {
        (self.source, self.adds, self.removes)
    }
}

impl<K: Eq + Hash, V, S: TimestampSource> LWWDictionary<K, V, S> {
    /// Rebuild a replica from logs received over a transport or loaded from
    /// storage.
    ///
    /// # Errors
    ///
    /// Fails if an adds entry holds a tombstone or a removes entry holds a
    /// value.
    pub fn from_parts(
        source: S,
        adds: HashMap<K, TimedValue<V, S::Timestamp>>,
        removes: HashMap<K, TimedValue<V, S::Timestamp>>,
    ) -> Result<Self> {
        check_logs(&adds, &removes)?;
        Ok(Self {
            source,
            adds,
            removes,
        })
    }

    /// Returns `true` if `key` is present: added, and not removed later.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.visible_entry(key).is_some()
    }

    /// Look up the value stored under `key`, if the key is present.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.visible_entry(key).and_then(TimedValue::get)
    }

    /// Iterate over the present `(key, value)` pairs.
    ///
    /// The order is arbitrary but does not change between calls unless the
    /// dictionary is modified.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.adds.iter().filter_map(move |(key, add)| {
            if self.removed_after(key, add) {
                None
            } else {
                add.get().map(|value| (key, value))
            }
        })
    }

    /// Iterate over the present keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    /// Iterate over the present values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// Number of present keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns `true` if no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Add or overwrite `key`, stamped with the next timestamp.
    ///
    /// The write is kept only if it is newer than the key's current add,
    /// which is always the case for a well-behaved source.
    pub fn add(&mut self, key: K, value: V) {
        let entry = TimedValue::value(value, self.source.now());
        let written = write_if_newer(&mut self.adds, key, entry);
        trace!(written, "add");
    }

    fn visible_entry<Q>(&self, key: &Q) -> Option<&TimedValue<V, S::Timestamp>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let add = self.adds.get(key)?;
        if self.removed_after(key, add) {
            None
        } else {
            Some(add)
        }
    }

    /// A removal only hides an add it is strictly newer than.
    fn removed_after<Q>(&self, key: &Q, add: &TimedValue<V, S::Timestamp>) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.removes.get(key).is_some_and(|remove| remove > add)
    }
}

impl<K: Eq + Hash + Clone, V, S: TimestampSource> LWWDictionary<K, V, S> {
    /// Remove `key`, stamped with the next timestamp.
    ///
    /// Removing a key that is not present does nothing: no tombstone is
    /// written and the source is not consulted. Returns `true` if a
    /// tombstone was recorded.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let key = match self.adds.get_key_value(key) {
            Some((key, add)) if !self.removes.get::<K>(key).is_some_and(|r| r > add) => key.clone(),
            _ => {
                trace!("remove of absent key ignored");
                return false;
            }
        };

        let entry = TimedValue::tombstone(self.source.now());
        let written = write_if_newer(&mut self.removes, key, entry);
        trace!(written, "remove");
        written
    }
}

impl<K: Eq + Hash + Clone, V: Clone, S: TimestampSource> LWWDictionary<K, V, S> {
    /// [`add`](Self::add), returning the operation for broadcast or logging.
    pub fn add_op(&mut self, key: K, value: V) -> DictOp<K, V, S::Timestamp> {
        let timestamp = self.source.now();
        let op = DictOp::Add {
            key: key.clone(),
            value: value.clone(),
            timestamp: timestamp.clone(),
        };
        let written = write_if_newer(&mut self.adds, key, TimedValue::value(value, timestamp));
        trace!(written, "add");
        op
    }

    /// [`remove`](Self::remove), returning the operation if a tombstone was
    /// recorded.
    pub fn remove_op<Q>(&mut self, key: &Q) -> Option<DictOp<K, V, S::Timestamp>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.remove(key) {
            return None;
        }
        let (key, tombstone) = self.removes.get_key_value(key)?;
        Some(DictOp::Remove {
            key: key.clone(),
            timestamp: tombstone.timestamp().clone(),
        })
    }

    /// Copy of the full state, in delta form.
    ///
    /// Applying the snapshot to an empty replica reproduces this one.
    pub fn snapshot(&self) -> LWWDictionaryDelta<K, V, S::Timestamp> {
        LWWDictionaryDelta {
            adds: self.adds.clone(),
            removes: self.removes.clone(),
        }
    }

    /// Merge that breaks timestamp ties on the payload instead of keeping
    /// the receiver's entry.
    ///
    /// On equal timestamps the greater payload wins, so the result is the
    /// same whichever replica merges into which, even when two replicas
    /// stamped different values with the same timestamp. Without
    /// collisions this behaves exactly like [`Crdt::merge`].
    pub fn merge_deterministic(&mut self, other: &Self)
    where
        V: Ord,
    {
        let taken_adds = join_log(&mut self.adds, &other.adds, |ours, theirs| {
            theirs.payload() > ours.payload()
        });
        let taken_removes = join_log(&mut self.removes, &other.removes, |_, _| false);
        debug!(taken_adds, taken_removes, "merged peer state by payload tie-break");
    }
}

impl<K: Eq + Hash + Clone, V: Clone, S: TimestampSource> Crdt for LWWDictionary<K, V, S> {
    /// Join `other` into `self`, log by log.
    ///
    /// An entry from `other` replaces ours only if ours is missing or
    /// strictly older. On a tie the receiver keeps its own entry, so two
    /// replicas that stamped different values with the same timestamp will
    /// each keep their own; use [`LWWDictionary::merge_deterministic`] if
    /// that can happen.
    fn merge(&mut self, other: &Self) {
        let taken_adds = join_log(&mut self.adds, &other.adds, |_, _| false);
        let taken_removes = join_log(&mut self.removes, &other.removes, |_, _| false);
        debug!(taken_adds, taken_removes, "merged peer state");
    }
}

/// Delta for [`LWWDictionary`]: only the log entries where `self` is ahead
/// of `other`.
///
/// Also used as a full-state snapshot, see [`LWWDictionary::snapshot`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        try_from = "RawDelta<K, V, T>",
        bound(
            serialize = "K: serde::Serialize, V: serde::Serialize, T: serde::Serialize",
            deserialize = "K: Eq + Hash + serde::Deserialize<'de>, V: serde::Deserialize<'de>, T: Ord + serde::Deserialize<'de>"
        )
    )
)]
pub struct LWWDictionaryDelta<K: Eq + Hash, V, T: Ord> {
    adds: Log<K, V, T>,
    removes: Log<K, V, T>,
}

impl<K: Eq + Hash, V, T: Ord> LWWDictionaryDelta<K, V, T> {
    /// Build a delta from raw logs.
    ///
    /// # Errors
    ///
    /// Fails if an adds entry holds a tombstone or a removes entry holds a
    /// value.
    pub fn from_logs(adds: Log<K, V, T>, removes: Log<K, V, T>) -> Result<Self> {
        check_logs(&adds, &removes)?;
        Ok(Self { adds, removes })
    }

    /// Add entries carried by this delta.
    pub fn adds(&self) -> impl Iterator<Item = (&K, &TimedValue<V, T>)> {
        self.adds.iter()
    }

    /// Tombstones carried by this delta.
    pub fn removes(&self) -> impl Iterator<Item = (&K, &TimedValue<V, T>)> {
        self.removes.iter()
    }

    /// Total number of log entries carried.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adds.len() + self.removes.len()
    }

    /// Returns `true` if the delta carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(bound(
    deserialize = "K: Eq + Hash + serde::Deserialize<'de>, V: serde::Deserialize<'de>, T: Ord + serde::Deserialize<'de>"
))]
struct RawDelta<K: Eq + Hash, V, T: Ord> {
    adds: Log<K, V, T>,
    removes: Log<K, V, T>,
}

#[cfg(feature = "serde")]
impl<K: Eq + Hash, V, T: Ord> TryFrom<RawDelta<K, V, T>> for LWWDictionaryDelta<K, V, T> {
    type Error = Error;

    fn try_from(raw: RawDelta<K, V, T>) -> Result<Self> {
        Self::from_logs(raw.adds, raw.removes)
    }
}

impl<K: Eq + Hash + Clone, V: Clone, S: TimestampSource> DeltaCrdt for LWWDictionary<K, V, S> {
    type Delta = LWWDictionaryDelta<K, V, S::Timestamp>;

    fn delta(&self, other: &Self) -> Self::Delta {
        LWWDictionaryDelta {
            adds: newer_entries(&self.adds, &other.adds),
            removes: newer_entries(&self.removes, &other.removes),
        }
    }

    fn apply_delta(&mut self, delta: &Self::Delta) {
        let taken_adds = join_log(&mut self.adds, &delta.adds, |_, _| false);
        let taken_removes = join_log(&mut self.removes, &delta.removes, |_, _| false);
        debug!(taken_adds, taken_removes, "applied delta");
    }
}

/// A single timestamped mutation of an [`LWWDictionary`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DictOp<K, V, T> {
    /// `key` was set to `value` at `timestamp`.
    Add {
        /// Key written.
        key: K,
        /// Value written.
        value: V,
        /// When it was written.
        timestamp: T,
    },
    /// `key` was removed at `timestamp`.
    Remove {
        /// Key removed.
        key: K,
        /// When it was removed.
        timestamp: T,
    },
}

impl<K, V, T> DictOp<K, V, T> {
    /// The key this operation touches.
    pub fn key(&self) -> &K {
        match self {
            Self::Add { key, .. } | Self::Remove { key, .. } => key,
        }
    }

    /// When the operation happened.
    pub fn timestamp(&self) -> &T {
        match self {
            Self::Add { timestamp, .. } | Self::Remove { timestamp, .. } => timestamp,
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone, S: TimestampSource> OpCrdt for LWWDictionary<K, V, S> {
    type Op = DictOp<K, V, S::Timestamp>;

    /// Record `op` under the same newer-wins rule as merge.
    ///
    /// A replayed remove is recorded even if its key is not present here
    /// yet: delivery order is arbitrary and the matching add may still be
    /// on its way.
    fn apply_op(&mut self, op: &Self::Op) {
        let written = match op {
            DictOp::Add {
                key,
                value,
                timestamp,
            } => write_if_newer(
                &mut self.adds,
                key.clone(),
                TimedValue::value(value.clone(), timestamp.clone()),
            ),
            DictOp::Remove { key, timestamp } => write_if_newer(
                &mut self.removes,
                key.clone(),
                TimedValue::tombstone(timestamp.clone()),
            ),
        };
        trace!(written, "applied op");
    }
}

impl<K: Clone, V: Clone, S: TimestampSource + Clone> Clone for LWWDictionary<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            adds: self.adds.clone(),
            removes: self.removes.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S: TimestampSource> fmt::Debug for LWWDictionary<K, V, S>
where
    S::Timestamp: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LWWDictionary")
            .field("adds", &self.adds)
            .field("removes", &self.removes)
            .finish_non_exhaustive()
    }
}

impl<K, V, S: TimestampSource + Default> Default for LWWDictionary<K, V, S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

/// Store `entry` unless the log already holds one at least as new.
fn write_if_newer<K: Eq + Hash, V, T: Ord>(
    log: &mut Log<K, V, T>,
    key: K,
    entry: TimedValue<V, T>,
) -> bool {
    match log.entry(key) {
        Entry::Occupied(mut slot) => {
            if *slot.get() < entry {
                slot.insert(entry);
                true
            } else {
                false
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(entry);
            true
        }
    }
}

/// Pull every entry of `from` that is newer than ours into `into`.
///
/// `take_on_tie(ours, theirs)` decides equal timestamps. Returns how many
/// entries were taken.
fn join_log<K, V, T, F>(into: &mut Log<K, V, T>, from: &Log<K, V, T>, take_on_tie: F) -> usize
where
    K: Eq + Hash + Clone,
    V: Clone,
    T: Ord + Clone,
    F: Fn(&TimedValue<V, T>, &TimedValue<V, T>) -> bool,
{
    let mut taken = 0;
    for (key, theirs) in from {
        let take = match into.get(key) {
            None => true,
            Some(ours) => ours < theirs || (ours == theirs && take_on_tie(ours, theirs)),
        };
        if take {
            into.insert(key.clone(), theirs.clone());
            taken += 1;
        }
    }
    taken
}

/// Entries of `ours` that `theirs` lacks or holds an older version of.
fn newer_entries<K, V, T>(ours: &Log<K, V, T>, theirs: &Log<K, V, T>) -> Log<K, V, T>
where
    K: Eq + Hash + Clone,
    V: Clone,
    T: Ord + Clone,
{
    ours.iter()
        .filter(|(key, entry)| theirs.get(*key).map_or(true, |known| known < *entry))
        .map(|(key, entry)| (key.clone(), entry.clone()))
        .collect()
}

fn check_logs<K, V, T>(adds: &Log<K, V, T>, removes: &Log<K, V, T>) -> Result<()> {
    if adds.values().any(TimedValue::is_tombstone) {
        return Err(Error::TombstoneInAdds);
    }
    if removes.values().any(|entry| !entry.is_tombstone()) {
        return Err(Error::ValueInRemoves);
    }
    Ok(())
}
