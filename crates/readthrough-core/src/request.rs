//! Fetch request descriptor.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::policy::FetchPolicy;

/// Outcome of reading from the upstream source.
///
/// - `Ok(Some(value))`: the source has a value.
/// - `Ok(None)`: the source says there is no value (tombstone). The cached
///   record is removed.
/// - `Err(_)`: the read failed. Handled like a tombstone and logged.
pub type FetchResult<T> = anyhow::Result<Option<T>>;

/// Bundles the source fetch operation with per-call policy overrides.
///
/// The fetch closure runs at most once per lookup, and only by the caller
/// holding the key's refresh lock.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use readthrough_core::FetchRequest;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> anyhow::Result<()> {
/// let request = FetchRequest::new(|| async { Ok(Some(42u32)) })
///     .refresh_after(Duration::from_secs(10))
///     .acquire_timeout(Duration::from_secs(1));
///
/// assert_eq!(request.policy().refresh_after, Some(Duration::from_secs(10)));
/// assert_eq!(request.invoke().await?, Some(42));
/// # Ok(())
/// # }
/// ```
pub struct FetchRequest<F> {
    fetch: F,
    policy: FetchPolicy,
}

impl<F> FetchRequest<F> {
    /// Wraps a fetch operation with no overrides.
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            policy: FetchPolicy::default(),
        }
    }

    /// Replaces the override set.
    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the refresh interval for this call.
    pub fn refresh_after(mut self, duration: Duration) -> Self {
        self.policy = self.policy.refresh_after(duration);
        self
    }

    /// Overrides the store TTL for this call.
    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.policy = self.policy.expire_after(duration);
        self
    }

    /// Overrides the miss wait bound for this call.
    pub fn acquire_timeout(mut self, duration: Duration) -> Self {
        self.policy = self.policy.acquire_timeout(duration);
        self
    }

    /// Returns the overrides carried by this request.
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Splits the request into its fetch operation and overrides.
    pub fn into_parts(self) -> (F, FetchPolicy) {
        (self.fetch, self.policy)
    }
}

impl<F, Fut, T> FetchRequest<F>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    /// Runs the fetch operation.
    pub async fn invoke(self) -> FetchResult<T> {
        (self.fetch)().await
    }
}

impl<F> fmt::Debug for FetchRequest<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
