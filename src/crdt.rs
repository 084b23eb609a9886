/// Core trait that every replicated type in this crate implements.
///
/// A CRDT (Conflict-free Replicated Data Type) guarantees that concurrent
/// updates on different replicas will converge to the same state after merging,
/// without requiring coordination.
///
/// # Properties
///
/// Implementations must satisfy:
/// - **Commutativity:** `a.merge(b) == b.merge(a)`
/// - **Associativity:** `a.merge(b.merge(c)) == a.merge(b).merge(c)`
/// - **Idempotency:** `a.merge(a) == a`
///
/// For timestamp-ordered types, commutativity holds as long as no two
/// replicas stamp different payloads for the same key with the same
/// timestamp. See [`LWWDictionary::merge_deterministic`](crate::LWWDictionary::merge_deterministic)
/// for a variant that stays commutative under collisions.
pub trait Crdt {
    /// Merge another replica's state into this one.
    ///
    /// After merging, `self` contains the least upper bound of both states.
    fn merge(&mut self, other: &Self);
}

/// Extension trait for delta-state CRDTs.
///
/// Delta-state CRDTs can produce compact deltas representing only the
/// changes between two states. Replicas then exchange small deltas instead
/// of their full state.
///
/// # Example
///
/// ```
/// use lww_dict::clock::LogicalClock;
/// use lww_dict::prelude::*;
///
/// let clock = LogicalClock::new();
/// let mut d1 = LWWDictionary::new(&clock);
/// d1.add("a", 1);
/// d1.add("b", 2);
///
/// let mut d2 = LWWDictionary::new(&clock);
/// d2.add("c", 3);
///
/// // Generate a delta from d1 that d2 doesn't have
/// let delta = d1.delta(&d2);
/// assert_eq!(delta.len(), 2);
///
/// // Apply just the delta instead of full state merge
/// d2.apply_delta(&delta);
/// assert_eq!(d2.len(), 3);
/// ```
pub trait DeltaCrdt: Crdt {
    /// The type of delta produced by this CRDT.
    type Delta;

    /// Generate a delta containing changes in `self` that `other` does not have.
    ///
    /// The returned delta is the minimal set of information needed to bring
    /// a replica at state `other` up to date with `self`.
    fn delta(&self, other: &Self) -> Self::Delta;

    /// Apply a delta to this replica's state.
    ///
    /// This is equivalent to merging the state that produced the delta.
    fn apply_delta(&mut self, delta: &Self::Delta);
}
