//! Storage capability trait definition.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::CacheRecord;

/// Bound for values that can be cached.
///
/// Values are cloned out of the store on every hit, so cheap-to-clone types
/// (or `Arc<T>`) are the expected shape.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

/// A key/value store holding [`CacheRecord`]s.
///
/// This trait abstracts over the concrete backend (in-process map,
/// distributed cache) so the orchestrator can be composed with any of them.
/// The store owns expiry and eviction; a record it no longer has is a miss.
///
/// # Requirements
///
/// - Safe under arbitrary concurrent callers.
/// - A read observes a complete earlier write or nothing, never a partial one.
/// - Values are typed at the call site. A stored value that cannot be
///   produced as the requested `T` must fail with
///   [`StoreError::TypeMismatch`] rather than return garbage.
///
/// # Implementors
///
/// - `MemoryStore` (readthrough-memory) - Moka-backed in-process store
///
/// # Example
///
/// ```ignore
/// use readthrough_core::{CacheRecord, CacheValue, Storage, StoreError};
///
/// struct MyStore;
///
/// #[async_trait]
/// impl Storage for MyStore {
///     async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<CacheRecord<T>>, StoreError> {
///         // Implementation here
///     }
///
///     async fn set<T: CacheValue>(
///         &self,
///         key: &str,
///         record: CacheRecord<T>,
///         ttl: Duration,
///     ) -> Result<(), StoreError> {
///         // Implementation here
///     }
///
///     async fn remove(&self, key: &str) -> Result<(), StoreError> {
///         // Implementation here
///     }
///
///     fn name(&self) -> &str {
///         "my-store"
///     }
/// }
/// ```
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Reads the record stored under `key`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` on a miss (never written, removed, or expired).
    ///
    /// # Errors
    ///
    /// - `StoreError::TypeMismatch` if the stored value is not a `T`
    /// - `StoreError::Unavailable` if the backend cannot be reached
    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<CacheRecord<T>>, StoreError>;

    /// Writes `record` under `key`, replacing any previous record.
    ///
    /// `ttl` is the store-level expiry; it is independent from the record's
    /// refresh threshold. Writes are advisory for the read path: a failure
    /// here never fails the lookup that produced the value.
    async fn set<T: CacheValue>(
        &self,
        key: &str,
        record: CacheRecord<T>,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Removes the record stored under `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Returns the name of this store, used in logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Minimal map store without TTL, to exercise the trait contract.
    #[derive(Default)]
    struct MapStore {
        entries: Mutex<HashMap<String, Box<dyn Any + Send>>>,
    }

    #[async_trait]
    impl Storage for MapStore {
        async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<CacheRecord<T>>, StoreError> {
            let entries = self.entries.lock().unwrap();
            match entries.get(key) {
                None => Ok(None),
                Some(entry) => entry
                    .downcast_ref::<CacheRecord<T>>()
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| StoreError::type_mismatch::<T>(key)),
            }
        }

        async fn set<T: CacheValue>(
            &self,
            key: &str,
            record: CacheRecord<T>,
            _ttl: Duration,
        ) -> Result<(), StoreError> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), Box::new(record));
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        fn name(&self) -> &str {
            "map"
        }
    }

    #[tokio::test]
    async fn test_map_store_contract() {
        let store = MapStore::default();
        let ttl = Duration::from_secs(60);

        assert!(store.get::<u32>("k").await.unwrap().is_none());

        store
            .set("k", CacheRecord::new(5u32, Duration::from_secs(1)), ttl)
            .await
            .unwrap();
        let record = store.get::<u32>("k").await.unwrap().unwrap();
        assert_eq!(*record.value(), 5);

        let err = store.get::<String>("k").await.unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.get::<u32>("k").await.unwrap().is_none());
        assert_eq!(store.name(), "map");
    }
}
