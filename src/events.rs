//! Operation-based view of a CRDT, for event logs and op broadcast.
//!
//! State-based replicas merge whole states. The same replicas can also
//! exchange the individual mutations that produced those states: each
//! operation carries its own timestamp, so it can be persisted to an
//! append-only log, shipped to peers, and replayed in any order.

use crate::Crdt;

/// A CRDT that can express its mutations as discrete operations.
///
/// ```text
/// local mutation ──► op ──► persist / broadcast
///                            │
///                 peer ◄─────┘  apply_op(op)
/// ```
///
/// For convergence, `apply_op` must be:
/// - **Commutative**: order of operations doesn't matter
/// - **Idempotent**: applying the same op twice has no additional effect
///
/// # Example
///
/// ```
/// use lww_dict::clock::LogicalClock;
/// use lww_dict::events::OpCrdt;
/// use lww_dict::prelude::*;
///
/// let clock = LogicalClock::new();
/// let mut local = LWWDictionary::new(&clock);
/// let op = local.add_op("k", "v");
///
/// let mut peer: LWWDictionary<&str, &str, _> = LWWDictionary::new(&clock);
/// peer.apply_op(&op);
/// peer.apply_op(&op);
/// assert_eq!(peer.get("k"), Some(&"v"));
/// ```
pub trait OpCrdt: Crdt {
    /// The operation type this CRDT produces.
    type Op;

    /// Apply an operation, from this replica or a remote one.
    fn apply_op(&mut self, op: &Self::Op);
}
