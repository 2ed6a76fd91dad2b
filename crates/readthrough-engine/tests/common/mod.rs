#![allow(dead_code)]
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use readthrough_core::{
    CachePolicy, CacheRecord, CacheValue, FetchRequest, FetchResult, Storage, StoreError,
};
use readthrough_memory::MemoryStore;
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber once. Honours `RUST_LOG`, defaults to `warn`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Policy with the given refresh interval and a long TTL.
pub fn policy(refresh_after: Duration, acquire_timeout: Duration) -> CachePolicy {
    CachePolicy::new(refresh_after, Duration::from_secs(600), acquire_timeout)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: u32,
    pub version: u32,
    pub title: String,
}

pub type LoadFuture = Pin<Box<dyn Future<Output = FetchResult<Todo>> + Send>>;

/// Upstream fake whose state tests can mutate, counting every access.
#[derive(Clone, Default)]
pub struct TodoSource {
    version: Arc<Mutex<u32>>,
    accesses: Arc<AtomicU32>,
    latency: Arc<Mutex<Duration>>,
    gone: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl TodoSource {
    pub fn new(version: u32) -> Self {
        let source = Self::default();
        source.set_version(version);
        source
    }

    pub fn with_latency(version: u32, latency: Duration) -> Self {
        let source = Self::new(version);
        *source.latency.lock() = latency;
        source
    }

    pub fn set_version(&self, version: u32) {
        *self.version.lock() = version;
    }

    /// Makes the source report that the todo no longer exists.
    pub fn set_gone(&self, gone: bool) {
        self.gone.store(gone, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn accesses(&self) -> u32 {
        self.accesses.load(Ordering::SeqCst)
    }

    pub async fn load(self) -> FetchResult<Todo> {
        self.accesses.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("todo service returned 503");
        }
        if self.gone.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let version = *self.version.lock();
        Ok(Some(todo(version)))
    }

    pub fn request(&self) -> FetchRequest<impl FnOnce() -> LoadFuture + Send + 'static> {
        let source = self.clone();
        FetchRequest::new(move || Box::pin(source.load()) as LoadFuture)
    }
}

pub fn todo(version: u32) -> Todo {
    Todo {
        id: 1,
        version,
        title: format!("write docs v{}", version),
    }
}

/// Memory store that counts calls and can be told to fail.
#[derive(Clone)]
pub struct CountingStore {
    inner: Arc<MemoryStore>,
    gets: Arc<AtomicU32>,
    sets: Arc<AtomicU32>,
    removes: Arc<AtomicU32>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryStore::with_defaults()),
            gets: Arc::default(),
            sets: Arc::default(),
            removes: Arc::default(),
            fail_reads: Arc::default(),
            fail_writes: Arc::default(),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn gets(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> u32 {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> u32 {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> u32 {
        self.gets() + self.sets() + self.removes()
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl Storage for CountingStore {
    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<CacheRecord<T>>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        self.inner.get(key).await
    }

    async fn set<T: CacheValue>(
        &self,
        key: &str,
        record: CacheRecord<T>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        self.inner.set(key, record, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}
