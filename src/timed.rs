use core::cmp::Ordering;

/// What a log entry records: a value for additions, a tombstone for removals.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Payload<V> {
    /// A removal marker. Orders below every value.
    Tombstone,
    /// An added value.
    Value(V),
}

impl<V> Payload<V> {
    /// Returns `true` for [`Payload::Tombstone`].
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }

    /// Borrow the value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Value(v) => Some(v),
            Self::Tombstone => None,
        }
    }

    /// Take the value, if any.
    #[must_use]
    pub fn into_value(self) -> Option<V> {
        match self {
            Self::Value(v) => Some(v),
            Self::Tombstone => None,
        }
    }
}

/// A payload stamped with the time it was written.
///
/// Equality and ordering look at the timestamp only. Two entries with the
/// same timestamp compare equal even if their payloads differ; merge has to
/// decide what to do about that case.
///
/// # Example
///
/// ```
/// use lww_dict::TimedValue;
///
/// let a = TimedValue::value("x", 3);
/// let b = TimedValue::value("y", 3);
/// let c = TimedValue::<&str, _>::tombstone(4);
///
/// assert_eq!(a, b);
/// assert!(c > a);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedValue<V, T> {
    payload: Payload<V>,
    timestamp: T,
}

impl<V, T> TimedValue<V, T> {
    /// An addition of `value` at `timestamp`.
    pub fn value(value: V, timestamp: T) -> Self {
        Self {
            payload: Payload::Value(value),
            timestamp,
        }
    }

    /// A removal at `timestamp`.
    pub fn tombstone(timestamp: T) -> Self {
        Self {
            payload: Payload::Tombstone,
            timestamp,
        }
    }

    /// The recorded payload.
    #[must_use]
    pub fn payload(&self) -> &Payload<V> {
        &self.payload
    }

    /// When the payload was written.
    #[must_use]
    pub fn timestamp(&self) -> &T {
        &self.timestamp
    }

    /// Returns `true` if this entry records a removal.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_tombstone()
    }

    /// Borrow the stored value, `None` for tombstones.
    #[must_use]
    pub fn get(&self) -> Option<&V> {
        self.payload.value()
    }

    /// Split into payload and timestamp.
    pub fn into_parts(self) -> (Payload<V>, T) {
        (self.payload, self.timestamp)
    }
}

impl<V, T: Ord> PartialEq for TimedValue<V, T> {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }
}

impl<V, T: Ord> Eq for TimedValue<V, T> {}

impl<V, T: Ord> PartialOrd for TimedValue<V, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V, T: Ord> Ord for TimedValue<V, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_ignores_payload() {
        let a = TimedValue::value("apple", 5);
        let b = TimedValue::value("banana", 5);
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a, b);
    }

    #[test]
    fn later_timestamp_is_greater() {
        let old = TimedValue::value(1, 1u64);
        let new = TimedValue::tombstone(2u64);
        assert!(old < new);
        assert!(new > old);
    }

    #[test]
    fn tombstone_carries_no_value() {
        let t = TimedValue::<String, u64>::tombstone(9);
        assert!(t.is_tombstone());
        assert_eq!(t.get(), None);
        assert_eq!(*t.timestamp(), 9);
    }

    #[test]
    fn payload_order_puts_tombstone_first() {
        assert!(Payload::Tombstone < Payload::Value(0));
        assert!(Payload::Value(1) < Payload::Value(2));
    }

    #[test]
    fn into_parts_returns_both_halves() {
        let (payload, ts) = TimedValue::value("v", 3u64).into_parts();
        assert_eq!(payload.into_value(), Some("v"));
        assert_eq!(ts, 3);
    }
}
