//! Freshness, expiry and wait policies.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Default time a record stays fresh.
pub const DEFAULT_REFRESH_AFTER: Duration = Duration::from_secs(30);
/// Default store TTL.
pub const DEFAULT_EXPIRE_AFTER: Duration = Duration::from_secs(300);
/// Default bound on waiting for the refresh lock on a miss.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60);

/// Invalid policy values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// A duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Name of the offending field
        field: &'static str,
    },
}

/// Resolved policy used for a single lookup.
///
/// The orchestrator holds one of these as process-wide defaults; per-call
/// [`FetchPolicy`] overrides are merged on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Time until a freshly written record becomes stale.
    pub refresh_after: Duration,
    /// TTL handed to the store on write.
    pub expire_after: Duration,
    /// How long a caller with nothing cached waits for the refresh lock.
    pub acquire_timeout: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            refresh_after: DEFAULT_REFRESH_AFTER,
            expire_after: DEFAULT_EXPIRE_AFTER,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl CachePolicy {
    /// Creates a policy from explicit durations.
    pub fn new(refresh_after: Duration, expire_after: Duration, acquire_timeout: Duration) -> Self {
        Self {
            refresh_after,
            expire_after,
            acquire_timeout,
        }
    }

    /// Validates the policy.
    ///
    /// A zero acquire timeout is allowed: misses then never wait behind an
    /// in-flight refresh. A refresh interval longer than the store TTL is
    /// accepted but logged, records would expire before ever going stale.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.refresh_after.is_zero() {
            return Err(PolicyError::ZeroDuration {
                field: "refresh_after",
            });
        }

        if self.expire_after.is_zero() {
            return Err(PolicyError::ZeroDuration {
                field: "expire_after",
            });
        }

        if self.refresh_after > self.expire_after {
            warn!(
                refresh_after = ?self.refresh_after,
                expire_after = ?self.expire_after,
                "refresh interval exceeds store TTL; records will expire before going stale"
            );
        }

        Ok(())
    }
}

/// Per-call overrides for a [`CachePolicy`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use readthrough_core::{CachePolicy, FetchPolicy};
///
/// let defaults = CachePolicy::default();
/// let policy = FetchPolicy::new()
///     .refresh_after(Duration::from_secs(5))
///     .resolve(&defaults);
///
/// assert_eq!(policy.refresh_after, Duration::from_secs(5));
/// assert_eq!(policy.expire_after, defaults.expire_after);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Override for [`CachePolicy::refresh_after`].
    pub refresh_after: Option<Duration>,
    /// Override for [`CachePolicy::expire_after`].
    pub expire_after: Option<Duration>,
    /// Override for [`CachePolicy::acquire_timeout`].
    pub acquire_timeout: Option<Duration>,
}

impl FetchPolicy {
    /// An empty override set; every field falls back to the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the refresh interval.
    pub fn refresh_after(mut self, duration: Duration) -> Self {
        self.refresh_after = Some(duration);
        self
    }

    /// Sets the store TTL.
    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.expire_after = Some(duration);
        self
    }

    /// Sets the miss wait bound.
    pub fn acquire_timeout(mut self, duration: Duration) -> Self {
        self.acquire_timeout = Some(duration);
        self
    }

    /// Returns true if no field is overridden.
    pub fn is_empty(&self) -> bool {
        self.refresh_after.is_none() && self.expire_after.is_none() && self.acquire_timeout.is_none()
    }

    /// Fills unset fields from `defaults`.
    pub fn resolve(&self, defaults: &CachePolicy) -> CachePolicy {
        CachePolicy {
            refresh_after: self.refresh_after.unwrap_or(defaults.refresh_after),
            expire_after: self.expire_after.unwrap_or(defaults.expire_after),
            acquire_timeout: self.acquire_timeout.unwrap_or(defaults.acquire_timeout),
        }
    }
}

impl From<CachePolicy> for FetchPolicy {
    fn from(policy: CachePolicy) -> Self {
        Self {
            refresh_after: Some(policy.refresh_after),
            expire_after: Some(policy.expire_after),
            acquire_timeout: Some(policy.acquire_timeout),
        }
    }
}
