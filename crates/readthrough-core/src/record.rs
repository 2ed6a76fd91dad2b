//! Cached value with freshness metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Stand-in for "never" when a refresh interval does not fit the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A cached value together with the instant after which it should be refreshed.
///
/// A record is *fresh* while `now < refresh_at` and *stale* afterwards. Stale
/// records are still served as a fallback; removing them is the store's job
/// (through its own TTL) or the result of a tombstone from the source.
///
/// The clock is tokio's, so tests running with a paused runtime can move a
/// record from fresh to stale with `tokio::time::advance`. Backends that
/// persist records outside the process convert the threshold to wall-clock
/// time with [`CacheRecord::refresh_at_system`] and back with
/// [`CacheRecord::from_system`]. With the `serde` feature the record
/// serializes as `{ value, refresh_at_unix_ms }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord<T> {
    value: T,
    refresh_at: Instant,
}

impl<T> CacheRecord<T> {
    /// Creates a record that stays fresh for `refresh_after` from now.
    ///
    /// Intervals too large for the clock, such as `Duration::MAX`, saturate to
    /// a threshold decades away.
    pub fn new(value: T, refresh_after: Duration) -> Self {
        Self {
            value,
            refresh_at: instant_after(Instant::now(), refresh_after),
        }
    }

    /// Rebuilds a record from a wall-clock refresh threshold.
    ///
    /// A threshold in the past yields a stale record.
    pub fn from_system(value: T, refresh_at: SystemTime) -> Self {
        let now = Instant::now();
        let refresh_at = match refresh_at.duration_since(SystemTime::now()) {
            Ok(ahead) => instant_after(now, ahead),
            Err(behind) => now.checked_sub(behind.duration()).unwrap_or(now),
        };
        Self { value, refresh_at }
    }

    /// Creates a record with an explicit refresh threshold.
    pub fn with_refresh_at(value: T, refresh_at: Instant) -> Self {
        Self { value, refresh_at }
    }

    /// Returns the cached value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consumes the record, returning the value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Instant at which the record becomes stale.
    pub fn refresh_at(&self) -> Instant {
        self.refresh_at
    }

    /// Refresh threshold as wall-clock time, for backends that persist records.
    pub fn refresh_at_system(&self) -> SystemTime {
        let now = SystemTime::now();
        let shifted = match self.time_until_refresh() {
            Some(ahead) => now.checked_add(ahead),
            None => now.checked_sub(Instant::now().saturating_duration_since(self.refresh_at)),
        };
        shifted.unwrap_or(now)
    }

    /// Returns true if the record has not reached its refresh threshold.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }

    /// Freshness evaluated against a caller-supplied instant.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now < self.refresh_at
    }

    /// Returns true if the record is past its refresh threshold.
    pub fn is_stale(&self) -> bool {
        !self.is_fresh()
    }

    /// Time left until the record becomes stale, `None` if it already is.
    pub fn time_until_refresh(&self) -> Option<Duration> {
        let now = Instant::now();
        if now >= self.refresh_at {
            None
        } else {
            Some(self.refresh_at - now)
        }
    }
}

fn instant_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|since| u64::try_from(since.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn from_unix_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH
        .checked_add(Duration::from_millis(millis))
        .or_else(|| SystemTime::now().checked_add(FAR_FUTURE))
        .unwrap_or(UNIX_EPOCH)
}

#[cfg(feature = "serde")]
mod wire {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{CacheRecord, from_unix_millis, unix_millis};

    #[derive(Serialize)]
    struct WireRef<'a, T> {
        value: &'a T,
        refresh_at_unix_ms: u64,
    }

    #[derive(Deserialize)]
    struct Wire<T> {
        value: T,
        refresh_at_unix_ms: u64,
    }

    impl<T: Serialize> Serialize for CacheRecord<T> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            WireRef {
                value: &self.value,
                refresh_at_unix_ms: unix_millis(self.refresh_at_system()),
            }
            .serialize(serializer)
        }
    }

    impl<'de, T: Deserialize<'de>> Deserialize<'de> for CacheRecord<T> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let wire = Wire::<T>::deserialize(deserializer)?;
            Ok(CacheRecord::from_system(
                wire.value,
                from_unix_millis(wire.refresh_at_unix_ms),
            ))
        }
    }
}
