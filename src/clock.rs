//! Timestamp sources for stamping dictionary mutations.
//!
//! Every [`LWWDictionary`](crate::LWWDictionary) is constructed with a
//! [`TimestampSource`]. The source is the only place time enters the crate,
//! so tests can drive it step by step and production code can pick a clock
//! that fits its deployment:
//!
//! - [`ManualClock`]: a steppable clock for deterministic tests
//! - [`LogicalClock`]: a plain atomic counter
//! - [`SystemClock`]: wall-clock microseconds, forced monotonic
//! - [`HybridClock`]: hybrid logical clock with a node id tiebreak
//!
//! # Example
//!
//! ```
//! use lww_dict::clock::{HybridClock, HybridTimestamp, TimestampSource};
//!
//! let clock = HybridClock::new(1); // node_id = 1
//!
//! // Generate a timestamp for a local event
//! let ts1 = clock.now();
//! let ts2 = clock.now();
//! assert!(ts2 > ts1);
//!
//! // Receive a timestamp from a remote node
//! let remote_ts = HybridTimestamp { physical: ts2.physical + 1000, logical: 0, node_id: 2 };
//! let ts3 = clock.receive(&remote_ts);
//! assert!(ts3 > remote_ts);
//! ```

use core::cmp;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A source of totally ordered, strictly increasing timestamps.
///
/// Each call to [`now`](TimestampSource::now) on one instance must return a
/// value strictly greater than every value it returned before. Timestamps
/// from different replicas must share one totally ordered domain and should
/// tend to follow causal order, although nothing in the dictionary checks
/// this.
///
/// `now` takes `&self` so a single source can back several dictionaries.
/// Implementations that may be shared across threads must issue timestamps
/// atomically.
pub trait TimestampSource {
    /// The timestamp domain.
    type Timestamp: Ord + Clone;

    /// Issue the next timestamp.
    fn now(&self) -> Self::Timestamp;
}

impl<S: TimestampSource + ?Sized> TimestampSource for &S {
    type Timestamp = S::Timestamp;

    fn now(&self) -> Self::Timestamp {
        (**self).now()
    }
}

impl<S: TimestampSource + ?Sized> TimestampSource for Rc<S> {
    type Timestamp = S::Timestamp;

    fn now(&self) -> Self::Timestamp {
        (**self).now()
    }
}

impl<S: TimestampSource + ?Sized> TimestampSource for Arc<S> {
    type Timestamp = S::Timestamp;

    fn now(&self) -> Self::Timestamp {
        (**self).now()
    }
}

impl<S: TimestampSource + ?Sized> TimestampSource for Box<S> {
    type Timestamp = S::Timestamp;

    fn now(&self) -> Self::Timestamp {
        (**self).now()
    }
}

// ── ManualClock ─────────────────────────────────────────────────────

/// A clock that only moves when told to.
///
/// [`now`](TimestampSource::now) returns the current reading without
/// advancing it, so two calls between [`tick`](ManualClock::tick)s return
/// the same value. That breaks the strictly-increasing contract on purpose:
/// it is how tests produce colliding timestamps.
///
/// ```
/// use lww_dict::clock::{ManualClock, TimestampSource};
///
/// let clock = ManualClock::new();
/// assert_eq!(clock.now(), 0);
/// clock.tick();
/// assert_eq!(clock.now(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading zero.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a clock with the given initial reading.
    #[must_use]
    pub fn starting_at(t: u64) -> Self {
        Self {
            now: AtomicU64::new(t),
        }
    }

    /// Advance the clock by one.
    pub fn tick(&self) {
        self.advance(1);
    }

    /// Advance the clock by `n`.
    pub fn advance(&self, n: u64) {
        self.now.fetch_add(n, Ordering::SeqCst);
    }

    /// Move the clock forward to `t`. Earlier readings are ignored.
    pub fn set(&self, t: u64) {
        self.now.fetch_max(t, Ordering::SeqCst);
    }
}

impl TimestampSource for ManualClock {
    type Timestamp = u64;

    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ── LogicalClock ────────────────────────────────────────────────────

/// A Lamport-style counter. The first timestamp issued is `1`.
///
/// The counter stops at `u64::MAX`; from there on every reading is equal.
#[derive(Debug, Default)]
pub struct LogicalClock {
    last: AtomicU64,
}

impl LogicalClock {
    /// Create a counter that has issued nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counter whose next timestamp is `last + 1`.
    #[must_use]
    pub fn after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    /// The last timestamp issued, or `0` if none.
    #[must_use]
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }

    /// Fast-forward past a timestamp observed from another replica.
    pub fn observe(&self, remote: u64) {
        self.last.fetch_max(remote, Ordering::SeqCst);
    }
}

impl TimestampSource for LogicalClock {
    type Timestamp = u64;

    fn now(&self) -> u64 {
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.saturating_add(1))
            })
            .unwrap_or_else(|last| last);
        prev.saturating_add(1)
    }
}

// ── SystemClock ─────────────────────────────────────────────────────

/// Wall-clock microseconds since the Unix epoch.
///
/// If the system clock stalls or steps backward, the previous reading plus
/// one is issued instead, so the output is strictly increasing until it
/// saturates at `u64::MAX`.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    /// Create a new wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn system_time_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

fn system_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Issue `max(reading, last + 1)` and record it, atomically.
pub(crate) fn monotonic_next(last: &AtomicU64, reading: u64) -> u64 {
    let prev = last
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
            Some(cmp::max(reading, prev.saturating_add(1)))
        })
        .unwrap_or_else(|prev| prev);
    cmp::max(reading, prev.saturating_add(1))
}

impl TimestampSource for SystemClock {
    type Timestamp = u64;

    fn now(&self) -> u64 {
        monotonic_next(&self.last, system_time_us())
    }
}

// ── HybridClock ─────────────────────────────────────────────────────

/// A timestamp from a Hybrid Logical Clock.
///
/// Consists of:
/// - `physical`: milliseconds since Unix epoch (or any monotonic source)
/// - `logical`: counter for events within the same physical millisecond
/// - `node_id`: tiebreaker to ensure total ordering across nodes
///
/// Two replicas with distinct node ids can never issue equal timestamps,
/// which sidesteps the tie-break question in merge entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HybridTimestamp {
    /// Physical time component (milliseconds).
    pub physical: u64,
    /// Logical counter for same-millisecond ordering.
    pub logical: u16,
    /// Node identifier for deterministic tiebreaking.
    pub node_id: u16,
}

impl HybridTimestamp {
    /// Create a zero timestamp.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            physical: 0,
            logical: 0,
            node_id: 0,
        }
    }

    /// Pack into a u128 for compact comparison and storage.
    /// Layout: [physical: 64 bits][logical: 16 bits][node_id: 16 bits][reserved: 32 bits]
    #[must_use]
    pub fn to_u128(&self) -> u128 {
        ((self.physical as u128) << 64)
            | ((self.logical as u128) << 48)
            | ((self.node_id as u128) << 32)
    }

    /// The timestamp immediately after `(physical, logical)` for `node_id`.
    /// A saturated logical counter spills into the physical component.
    fn successor(physical: u64, logical: u16, node_id: u16) -> Self {
        match logical.checked_add(1) {
            Some(logical) => Self {
                physical,
                logical,
                node_id,
            },
            None => Self {
                physical: physical.saturating_add(1),
                logical: 0,
                node_id,
            },
        }
    }
}

impl Ord for HybridTimestamp {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.physical
            .cmp(&other.physical)
            .then(self.logical.cmp(&other.logical))
            .then(self.node_id.cmp(&other.node_id))
    }
}

impl PartialOrd for HybridTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A Hybrid Logical Clock instance for a single node.
///
/// Call [`now`](HybridClock::now) to generate timestamps for local events.
/// Call [`receive`](HybridClock::receive) when processing a remote timestamp.
#[derive(Debug)]
pub struct HybridClock {
    node_id: u16,
    last: Mutex<HybridTimestamp>,
    physical_time_fn: fn() -> u64,
}

impl HybridClock {
    /// Create a new clock for the given node, reading physical time from
    /// `SystemTime`.
    #[must_use]
    pub fn new(node_id: u16) -> Self {
        Self::with_time_source(node_id, system_time_ms)
    }

    /// Create a clock with a custom physical time source.
    /// The function should return milliseconds (monotonic if possible).
    #[must_use]
    pub fn with_time_source(node_id: u16, time_fn: fn() -> u64) -> Self {
        Self {
            node_id,
            last: Mutex::new(HybridTimestamp::zero()),
            physical_time_fn: time_fn,
        }
    }

    /// Generate a timestamp for a local event.
    ///
    /// Guarantees monotonically increasing timestamps even if the
    /// physical clock goes backward.
    pub fn now(&self) -> HybridTimestamp {
        let pt = (self.physical_time_fn)();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        *last = if pt > last.physical {
            HybridTimestamp {
                physical: pt,
                logical: 0,
                node_id: self.node_id,
            }
        } else {
            HybridTimestamp::successor(last.physical, last.logical, self.node_id)
        };

        *last
    }

    /// Update the clock upon receiving a remote timestamp.
    ///
    /// Returns a new timestamp that is strictly greater than both
    /// the local clock and the received timestamp.
    pub fn receive(&self, remote: &HybridTimestamp) -> HybridTimestamp {
        let pt = (self.physical_time_fn)();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let max_pt = cmp::max(cmp::max(pt, last.physical), remote.physical);

        *last = if max_pt == last.physical && max_pt == remote.physical {
            HybridTimestamp::successor(
                max_pt,
                cmp::max(last.logical, remote.logical),
                self.node_id,
            )
        } else if max_pt == last.physical {
            HybridTimestamp::successor(max_pt, last.logical, self.node_id)
        } else if max_pt == remote.physical {
            HybridTimestamp::successor(max_pt, remote.logical, self.node_id)
        } else {
            HybridTimestamp {
                physical: max_pt,
                logical: 0,
                node_id: self.node_id,
            }
        };

        *last
    }

    /// Get the node ID of this clock.
    #[must_use]
    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Get the last generated timestamp.
    #[must_use]
    pub fn last_timestamp(&self) -> HybridTimestamp {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimestampSource for HybridClock {
    type Timestamp = HybridTimestamp;

    fn now(&self) -> HybridTimestamp {
        HybridClock::now(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test that needs a mock physical clock gets its own static so
    // parallel test threads do not step on each other.
    macro_rules! mock_time {
        ($name:ident, $setter:ident, $start:expr) => {
            static $name: AtomicU64 = AtomicU64::new($start);

            fn $setter(ms: u64) {
                $name.store(ms, Ordering::SeqCst);
            }
        };
    }

    #[test]
    fn manual_clock_only_moves_on_tick() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.now(), 0);

        clock.tick();
        assert_eq!(clock.now(), 1);

        clock.advance(10);
        assert_eq!(clock.now(), 11);
    }

    #[test]
    fn manual_clock_set_never_goes_back() {
        let clock = ManualClock::starting_at(50);
        clock.set(20);
        assert_eq!(clock.now(), 50);
        clock.set(80);
        assert_eq!(clock.now(), 80);
    }

    #[test]
    fn logical_clock_is_strictly_increasing() {
        let clock = LogicalClock::new();
        assert_eq!(clock.now(), 1);
        assert_eq!(clock.now(), 2);
        assert_eq!(clock.last(), 2);
    }

    #[test]
    fn logical_clock_observe_skips_ahead() {
        let clock = LogicalClock::after(3);
        clock.observe(100);
        assert_eq!(clock.now(), 101);

        // Observing something older changes nothing.
        clock.observe(5);
        assert_eq!(clock.now(), 102);
    }

    #[test]
    fn logical_clock_saturates_at_max() {
        let clock = LogicalClock::after(u64::MAX - 1);
        assert_eq!(clock.now(), u64::MAX);
        assert_eq!(clock.now(), u64::MAX);
        assert_eq!(clock.last(), u64::MAX);
    }

    #[test]
    fn system_clock_is_strictly_increasing() {
        let clock = SystemClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn monotonic_next_handles_backward_steps() {
        let last = AtomicU64::new(0);
        assert_eq!(monotonic_next(&last, 100), 100);
        assert_eq!(monotonic_next(&last, 90), 101);
        assert_eq!(monotonic_next(&last, 101), 102);
        assert_eq!(monotonic_next(&last, 500), 500);
    }

    #[test]
    fn monotonic_next_saturates_at_max() {
        let last = AtomicU64::new(u64::MAX);
        assert_eq!(monotonic_next(&last, 5), u64::MAX);
        assert_eq!(last.load(Ordering::SeqCst), u64::MAX);
    }

    #[test]
    fn shared_sources_delegate() {
        let clock = Arc::new(LogicalClock::new());
        let a = Arc::clone(&clock);
        assert_eq!(a.now(), 1);
        assert_eq!((&*clock).now(), 2);

        let boxed: Box<dyn TimestampSource<Timestamp = u64>> = Box::new(LogicalClock::after(9));
        assert_eq!(boxed.now(), 10);
    }

    mock_time!(SAME_MS, set_same_ms, 5000);

    #[test]
    fn monotonic_within_same_ms() {
        set_same_ms(5000);
        let clock = HybridClock::with_time_source(1, || SAME_MS.load(Ordering::SeqCst));

        let ts1 = clock.now();
        let ts2 = clock.now();
        let ts3 = clock.now();

        assert!(ts1 < ts2);
        assert!(ts2 < ts3);
        assert_eq!(ts1.physical, 5000);
        assert_eq!(ts1.logical, 0);
        assert_eq!(ts2.logical, 1);
        assert_eq!(ts3.logical, 2);
    }

    mock_time!(ADVANCING, set_advancing, 1000);

    #[test]
    fn physical_time_advance_resets_logical() {
        set_advancing(1000);
        let clock = HybridClock::with_time_source(1, || ADVANCING.load(Ordering::SeqCst));

        let ts1 = clock.now();
        assert_eq!(ts1.logical, 0);

        let _ts2 = clock.now();

        set_advancing(2000);
        let ts3 = clock.now();
        assert_eq!(ts3.physical, 2000);
        assert_eq!(ts3.logical, 0);
    }

    mock_time!(BEHIND, set_behind, 1000);

    #[test]
    fn receive_advances_clock() {
        set_behind(1000);
        let clock = HybridClock::with_time_source(1, || BEHIND.load(Ordering::SeqCst));

        // Remote is ahead
        let remote = HybridTimestamp {
            physical: 5000,
            logical: 3,
            node_id: 2,
        };

        let ts = clock.receive(&remote);
        assert!(ts > remote);
        assert_eq!(ts.physical, 5000);
        assert_eq!(ts.logical, 4);
        assert_eq!(clock.last_timestamp(), ts);
    }

    mock_time!(EVEN, set_even, 5000);

    #[test]
    fn receive_same_physical_time() {
        set_even(5000);
        let clock = HybridClock::with_time_source(1, || EVEN.load(Ordering::SeqCst));

        let _local = clock.now(); // physical=5000, logical=0

        let remote = HybridTimestamp {
            physical: 5000,
            logical: 5,
            node_id: 2,
        };

        let ts = clock.receive(&remote);
        assert!(ts > remote);
        assert_eq!(ts.physical, 5000);
        assert_eq!(ts.logical, 6); // max(0, 5) + 1
    }

    #[test]
    fn saturated_logical_counter_spills_into_physical() {
        let clock = HybridClock::with_time_source(7, || 10);
        let remote = HybridTimestamp {
            physical: 10,
            logical: u16::MAX,
            node_id: 2,
        };

        let ts = clock.receive(&remote);
        assert!(ts > remote);
        assert_eq!(ts.physical, 11);
        assert_eq!(ts.logical, 0);
        assert_eq!(ts.node_id, 7);
    }

    #[test]
    fn saturated_physical_component_does_not_overflow() {
        let clock = HybridClock::with_time_source(1, || 0);
        let remote = HybridTimestamp {
            physical: u64::MAX,
            logical: u16::MAX,
            node_id: 2,
        };

        let ts = clock.receive(&remote);
        assert_eq!(ts.physical, u64::MAX);
        assert_eq!(ts.logical, 0);
    }

    #[test]
    fn ordering_is_total() {
        let a = HybridTimestamp {
            physical: 1000,
            logical: 0,
            node_id: 1,
        };
        let b = HybridTimestamp {
            physical: 1000,
            logical: 0,
            node_id: 2,
        };
        let c = HybridTimestamp {
            physical: 1000,
            logical: 1,
            node_id: 1,
        };

        assert!(a < b); // same physical+logical, node_id tiebreak
        assert!(a < c); // same physical, logical tiebreak
        assert!(b < c); // logical > node_id in precedence
    }

    #[test]
    fn to_u128_preserves_ordering() {
        let a = HybridTimestamp {
            physical: 1000,
            logical: 5,
            node_id: 1,
        };
        let b = HybridTimestamp {
            physical: 1000,
            logical: 6,
            node_id: 1,
        };
        let c = HybridTimestamp {
            physical: 1001,
            logical: 0,
            node_id: 1,
        };

        assert!(a.to_u128() < b.to_u128());
        assert!(b.to_u128() < c.to_u128());
    }
}
