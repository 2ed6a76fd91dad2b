//! In-process record store using Moka.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use readthrough_core::{CacheRecord, CacheValue, Storage, StoreError};
use tracing::{debug, info};

use crate::metrics::StoreMetrics;

/// Configuracion del store en memoria.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Maximo numero de records (default: 10000)
    pub max_capacity: u64,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

/// Record guardado con su tipo borrado y el TTL pedido en `set`.
#[derive(Clone)]
struct StoredEntry {
    record: Arc<dyn Any + Send + Sync>,
    ttl: Duration,
}

/// Applies the TTL passed to each `set` call instead of one cache-wide TTL.
struct PerEntryTtl;

impl Expiry<String, StoredEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Store en memoria basado en Moka.
/// Thread-safe y async-friendly.
///
/// Records are stored type-erased, so one store serves every value type. A
/// read with a different type than the one written fails with
/// [`StoreError::TypeMismatch`]. Each write replaces the whole entry, readers
/// never see a half-written record.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use readthrough_core::{CacheRecord, Storage};
/// use readthrough_memory::{MemoryStore, MemoryStoreConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), readthrough_core::StoreError> {
/// let store = MemoryStore::new(MemoryStoreConfig::default());
/// let record = CacheRecord::new(42u32, Duration::from_secs(30));
///
/// store.set("answer", record, Duration::from_secs(300)).await?;
/// if let Some(record) = store.get::<u32>("answer").await? {
///     println!("cached: {}", record.value());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    inner: Cache<String, StoredEntry>,
    metrics: StoreMetrics,
}

impl MemoryStore {
    /// Crea un nuevo store con la configuracion dada.
    pub fn new(config: MemoryStoreConfig) -> Self {
        let metrics = StoreMetrics::new();

        // Configurar listener para evictions
        let eviction_metrics = metrics.clone();
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .eviction_listener(move |key, _value, cause| {
                let reason = match cause {
                    RemovalCause::Expired => "ttl",
                    RemovalCause::Size => "capacity",
                    RemovalCause::Explicit => "manual",
                    // Overwrites keep the key cached, nothing was dropped
                    RemovalCause::Replaced => return,
                };
                debug!(key = %key, reason, "record evicted");
                eviction_metrics.record_eviction(reason);
            })
            .build();

        info!(max_capacity = config.max_capacity, "memory store initialized");

        Self { inner, metrics }
    }

    /// Creates a store with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(MemoryStoreConfig::default())
    }

    /// Retorna el numero aproximado de records.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Returns true if a live record exists under `key`, whatever its type.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Invalida todos los records.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Ejecuta el mantenimiento pendiente de Moka (expiraciones, listeners).
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
        self.update_entry_gauge();
    }

    /// Retorna las metricas para acceso externo.
    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    fn update_entry_gauge(&self) {
        self.metrics.update_entry_count(self.inner.entry_count());
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<CacheRecord<T>>, StoreError> {
        let Some(entry) = self.inner.get(key).await else {
            return Ok(None);
        };

        (*entry.record)
            .downcast_ref::<CacheRecord<T>>()
            .cloned()
            .map(Some)
            .ok_or_else(|| StoreError::type_mismatch::<T>(key))
    }

    async fn set<T: CacheValue>(
        &self,
        key: &str,
        record: CacheRecord<T>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if ttl.is_zero() {
            return Err(StoreError::rejected(key, "ttl must be greater than zero"));
        }

        let entry = StoredEntry {
            record: Arc::new(record),
            ttl,
        };
        self.inner.insert(key.to_string(), entry).await;
        self.update_entry_gauge();

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.invalidate(key).await;
        self.update_entry_gauge();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record<T>(value: T) -> CacheRecord<T> {
        CacheRecord::new(value, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::with_defaults();

        store
            .set("todo:1", record("write docs".to_string()), Duration::from_secs(60))
            .await
            .unwrap();

        let cached = store.get::<String>("todo:1").await.unwrap();
        assert_eq!(cached.unwrap().value(), "write docs");
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let store = MemoryStore::with_defaults();
        assert!(store.get::<u32>("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_type_is_type_mismatch() {
        let store = MemoryStore::with_defaults();
        store
            .set("shared", record(7u32), Duration::from_secs(60))
            .await
            .unwrap();

        let err = store.get::<String>("shared").await.unwrap_err();
        match err {
            StoreError::TypeMismatch { key, expected } => {
                assert_eq!(key, "shared");
                assert!(expected.contains("String"));
            },
            other => panic!("expected TypeMismatch, got {other:?}"),
        }

        // The stored type still reads fine
        assert!(store.get::<u32>("shared").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_rejected() {
        let store = MemoryStore::with_defaults();

        let err = store
            .set("k", record(1u8), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        assert!(!store.contains_key("k"));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_record() {
        let store = MemoryStore::with_defaults();
        let ttl = Duration::from_secs(60);

        store.set("k", record(1u32), ttl).await.unwrap();
        store.set("k", record(2u32), ttl).await.unwrap();

        let cached = store.get::<u32>("k").await.unwrap().unwrap();
        assert_eq!(*cached.value(), 2);
    }

    #[tokio::test]
    async fn test_overwrites_are_not_evictions() {
        let store = MemoryStore::with_defaults();
        let ttl = Duration::from_secs(60);

        for version in 0..5u32 {
            store.set("k", record(version), ttl).await.unwrap();
        }
        store.run_pending_tasks().await;
        assert_eq!(store.metrics().evictions(), 0);

        store.remove("k").await.unwrap();
        store.run_pending_tasks().await;
        assert_eq!(store.metrics().evictions(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemoryStore::with_defaults();
        store
            .set("k", record(1u32), Duration::from_secs(60))
            .await
            .unwrap();

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();

        assert!(store.get::<u32>("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_per_entry_ttl() {
        let store = MemoryStore::with_defaults();

        store
            .set("short", record(1u32), Duration::from_millis(50))
            .await
            .unwrap();
        store
            .set("long", record(2u32), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(store.get::<u32>("short").await.unwrap().is_none());
        assert!(store.get::<u32>("long").await.unwrap().is_some());
    }
}
