//! Read-through lookups with per-key single-flight refresh.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use readthrough_core::{
    CacheError, CacheKey, CachePolicy, CacheRecord, CacheValue, FetchPolicy, FetchRequest,
    FetchResult, PolicyError, Storage, TaskRunner,
};
use tracing::{debug, info, trace, warn};

use crate::lock::KeyLockRegistry;
use crate::metrics::{FetchOutcome, LookupOutcome, OrchestratorMetrics};

/// Read-through cache orchestrator.
///
/// Serves values from a [`Storage`] backend and repopulates them from the
/// caller-supplied fetch operation when they go stale or are missing. For
/// each key at most one fetch is in flight at a time:
///
/// - a fresh record is returned without locking or fetching;
/// - a stale record is returned to everyone, and whoever wins the key's lock
///   without waiting refreshes it first;
/// - a missing record makes callers wait up to the acquire timeout for the
///   lock, then re-check the store before fetching, so a burst of misses
///   costs one upstream call.
///
/// Clones share the same store, locks and metrics.
///
/// # Examples
///
/// ```
/// use readthrough_core::FetchRequest;
/// use readthrough_engine::CacheOrchestrator;
/// use readthrough_memory::MemoryStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), readthrough_core::CacheError> {
/// let cache = CacheOrchestrator::new(MemoryStore::with_defaults());
///
/// let title: String = cache
///     .get_or_create("todo:1", FetchRequest::new(|| async {
///         Ok(Some("write docs".to_string()))
///     }))
///     .await?;
///
/// assert_eq!(title, "write docs");
/// # Ok(())
/// # }
/// ```
pub struct CacheOrchestrator<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    store: S,
    locks: KeyLockRegistry,
    defaults: CachePolicy,
    runner: Option<Arc<dyn TaskRunner>>,
    metrics: OrchestratorMetrics,
}

impl<S> Clone for CacheOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Storage> CacheOrchestrator<S> {
    /// Creates an orchestrator with default policy and no background runner.
    pub fn new(store: S) -> Self {
        Self::from_parts(store, CachePolicy::default(), None, KeyLockRegistry::new())
    }

    /// Starts building an orchestrator around `store`.
    pub fn builder(store: S) -> OrchestratorBuilder<S> {
        OrchestratorBuilder {
            store,
            defaults: CachePolicy::default(),
            runner: None,
            prune_idle_locks: false,
        }
    }

    fn from_parts(
        store: S,
        defaults: CachePolicy,
        runner: Option<Arc<dyn TaskRunner>>,
        locks: KeyLockRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                locks,
                defaults,
                runner,
                metrics: OrchestratorMetrics::new(),
            }),
        }
    }

    /// Returns the cached value for `key`, fetching it if needed.
    ///
    /// Stale refreshes run inline on the caller that wins the lock. Errors:
    ///
    /// - [`CacheError::InvalidKey`] if `key` is empty. Nothing else happens.
    /// - [`CacheError::AcquireTimeout`] if nothing was cached and no value
    ///   could be produced in time: the lock wait timed out, or the source
    ///   returned no value or failed.
    ///
    /// Store and source failures are never returned. They are logged and
    /// degrade to a miss or a discarded write.
    pub async fn get_or_create<T, F, Fut>(
        &self,
        key: &str,
        request: FetchRequest<F>,
    ) -> Result<T, CacheError>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let key = CacheKey::new(key)?;
        let (fetch, overrides) = request.into_parts();
        let policy = overrides.resolve(&self.inner.defaults);

        let cached = self.inner.lookup::<T>(&key).await;
        if let Some(record) = &cached
            && record.is_fresh()
        {
            return Ok(record.value().clone());
        }

        self.inner.refresh_or_fallback(key, fetch, policy, cached).await
    }

    /// Same as [`get_or_create`](Self::get_or_create) with explicit overrides.
    pub async fn get_or_create_with<T, F, Fut>(
        &self,
        key: &str,
        fetch: F,
        policy: FetchPolicy,
    ) -> Result<T, CacheError>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        self.get_or_create(key, FetchRequest::new(fetch).with_policy(policy))
            .await
    }

    /// Like [`get_or_create`](Self::get_or_create), but stale refreshes run
    /// on the configured [`TaskRunner`].
    ///
    /// A stale hit returns the cached value immediately. If the caller wins
    /// the key's lock, the lock moves into the submitted task and is released
    /// when the refresh ends. Misses still wait and fetch inline.
    ///
    /// Without a runner this behaves exactly like `get_or_create`.
    pub async fn get_or_create_background<T, F, Fut>(
        &self,
        key: &str,
        request: FetchRequest<F>,
    ) -> Result<T, CacheError>
    where
        T: CacheValue,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let Some(runner) = self.inner.runner.clone() else {
            return self.get_or_create(key, request).await;
        };

        let key = CacheKey::new(key)?;
        let (fetch, overrides) = request.into_parts();
        let policy = overrides.resolve(&self.inner.defaults);

        match self.inner.lookup::<T>(&key).await {
            Some(record) if record.is_fresh() => Ok(record.into_value()),
            Some(stale) => {
                match self.inner.locks.try_acquire(key.as_str(), Duration::ZERO).await {
                    Some(guard) => {
                        let inner = Arc::clone(&self.inner);
                        let task_name = format!("refresh:{key}");
                        runner.submit(
                            &task_name,
                            Box::pin(async move {
                                inner.refresh_locked(&key, fetch, &policy).await;
                                guard.release();
                            }),
                        );
                    },
                    None => debug!(key = %key, "refresh already in flight, serving stale value"),
                }
                Ok(stale.into_value())
            },
            None => self.inner.refresh_or_fallback(key, fetch, policy, None).await,
        }
    }

    /// Removes the record stored under `key`.
    ///
    /// Unlike the read path, store failures are returned here.
    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let key = CacheKey::new(key)?;
        self.inner.store.remove(key.as_str()).await?;
        info!(key = %key, store = self.inner.store.name(), "record invalidated");
        Ok(())
    }

    /// Drops lock entries nobody holds or waits on.
    pub fn prune_idle_locks(&self) -> usize {
        self.inner.locks.prune_idle()
    }

    /// Process-wide policy defaults.
    pub fn defaults(&self) -> &CachePolicy {
        &self.inner.defaults
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// The per-key lock registry.
    pub fn locks(&self) -> &KeyLockRegistry {
        &self.inner.locks
    }

    /// Retorna las metricas para acceso externo.
    pub fn metrics(&self) -> &OrchestratorMetrics {
        &self.inner.metrics
    }
}

impl<S: Storage> Inner<S> {
    /// Initial read, classified for metrics.
    async fn lookup<T: CacheValue>(&self, key: &CacheKey) -> Option<CacheRecord<T>> {
        let cached = self.read::<T>(key).await;

        let outcome = match &cached {
            Some(record) if record.is_fresh() => LookupOutcome::Fresh,
            Some(_) => LookupOutcome::Stale,
            None => LookupOutcome::Miss,
        };
        trace!(key = %key, outcome = outcome.as_str(), "lookup");
        self.metrics.record_lookup(outcome);

        cached
    }

    /// Store read that degrades failures to a miss.
    async fn read<T: CacheValue>(&self, key: &CacheKey) -> Option<CacheRecord<T>> {
        match self.store.get::<T>(key.as_str()).await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    key = %key,
                    store = self.store.name(),
                    error = %e,
                    "store read failed, treating as miss"
                );
                self.metrics.record_store_failure("get", e.kind());
                None
            },
        }
    }

    /// Takes the key's lock and refreshes, or falls back to what is cached.
    ///
    /// Callers holding a stale record only try the lock once; callers with
    /// nothing cached wait up to the acquire timeout.
    async fn refresh_or_fallback<T, F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
        policy: CachePolicy,
        cached: Option<CacheRecord<T>>,
    ) -> Result<T, CacheError>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let wait = if cached.is_some() {
            Duration::ZERO
        } else {
            policy.acquire_timeout
        };

        let started = tokio::time::Instant::now();
        let refreshed = match self.locks.try_acquire(key.as_str(), wait).await {
            Some(guard) => {
                let value = self.refresh_locked(&key, fetch, &policy).await;
                guard.release();
                value
            },
            None if cached.is_some() => {
                debug!(key = %key, "refresh already in flight, serving stale value");
                None
            },
            None => {
                warn!(key = %key, ?wait, "timed out waiting for refresh lock");
                self.metrics.record_lock_timeout();
                None
            },
        };

        match (refreshed, cached) {
            (Some(value), _) => Ok(value),
            (None, Some(stale)) => Ok(stale.into_value()),
            (None, None) => Err(CacheError::acquire_timeout(
                key.into_inner(),
                started.elapsed(),
            )),
        }
    }

    /// Refresh section. Must only run while holding the key's lock.
    ///
    /// Re-reads the store first: a caller that waited behind another refresh
    /// finds its result there and skips the fetch.
    async fn refresh_locked<T, F, Fut>(
        &self,
        key: &CacheKey,
        fetch: F,
        policy: &CachePolicy,
    ) -> Option<T>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        if let Some(record) = self.read::<T>(key).await
            && record.is_fresh()
        {
            debug!(key = %key, "record refreshed by another caller");
            return Some(record.into_value());
        }

        self.fetch_and_update(key, fetch, policy).await
    }

    async fn fetch_and_update<T, F, Fut>(
        &self,
        key: &CacheKey,
        fetch: F,
        policy: &CachePolicy,
    ) -> Option<T>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let start = Instant::now();
        let outcome = fetch().await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Some(value)) => {
                self.metrics.record_fetch(FetchOutcome::Value, elapsed);
                debug!(key = %key, ?elapsed, "fetched value from source");

                let record = CacheRecord::new(value.clone(), policy.refresh_after);
                if let Err(e) = self
                    .store
                    .set(key.as_str(), record, policy.expire_after)
                    .await
                {
                    warn!(
                        key = %key,
                        store = self.store.name(),
                        error = %e,
                        "store write failed, value not cached"
                    );
                    self.metrics.record_store_failure("set", e.kind());
                }
                Some(value)
            },
            Ok(None) => {
                self.metrics.record_fetch(FetchOutcome::Tombstone, elapsed);
                debug!(key = %key, "source has no value, evicting record");
                self.evict(key).await;
                None
            },
            Err(e) => {
                self.metrics.record_fetch(FetchOutcome::Error, elapsed);
                warn!(key = %key, error = %format!("{e:#}"), "source fetch failed, evicting record");
                self.evict(key).await;
                None
            },
        }
    }

    async fn evict(&self, key: &CacheKey) {
        if let Err(e) = self.store.remove(key.as_str()).await {
            warn!(
                key = %key,
                store = self.store.name(),
                error = %e,
                "store remove failed"
            );
            self.metrics.record_store_failure("remove", e.kind());
        }
    }
}

impl<S: Storage> fmt::Debug for CacheOrchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOrchestrator")
            .field("store", &self.inner.store.name())
            .field("defaults", &self.inner.defaults)
            .field("locks", &self.inner.locks)
            .field("background", &self.inner.runner.is_some())
            .finish()
    }
}

/// Builder for [`CacheOrchestrator`].
pub struct OrchestratorBuilder<S> {
    store: S,
    defaults: CachePolicy,
    runner: Option<Arc<dyn TaskRunner>>,
    prune_idle_locks: bool,
}

impl<S: Storage> OrchestratorBuilder<S> {
    /// Process-wide policy applied where a request has no override.
    pub fn defaults(mut self, policy: CachePolicy) -> Self {
        self.defaults = policy;
        self
    }

    /// Runner used by [`CacheOrchestrator::get_or_create_background`].
    pub fn task_runner<R: TaskRunner + 'static>(mut self, runner: R) -> Self {
        self.runner = Some(Arc::new(runner));
        self
    }

    /// Drop a key's lock entry once nobody holds or waits on it.
    pub fn prune_idle_locks(mut self, enabled: bool) -> Self {
        self.prune_idle_locks = enabled;
        self
    }

    /// Validates the defaults and builds the orchestrator.
    pub fn build(self) -> Result<CacheOrchestrator<S>, PolicyError> {
        self.defaults.validate()?;

        let locks = if self.prune_idle_locks {
            KeyLockRegistry::with_pruning()
        } else {
            KeyLockRegistry::new()
        };

        info!(
            store = self.store.name(),
            refresh_after = ?self.defaults.refresh_after,
            expire_after = ?self.defaults.expire_after,
            acquire_timeout = ?self.defaults.acquire_timeout,
            background = self.runner.is_some(),
            "cache orchestrator initialized"
        );

        Ok(CacheOrchestrator::from_parts(
            self.store,
            self.defaults,
            self.runner,
            locks,
        ))
    }
}
