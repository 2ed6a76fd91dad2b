//! # Readthrough Memory Store
//!
//! In-process [`Storage`](readthrough_core::Storage) backend for readthrough,
//! built on Moka.
//!
//! ## Features
//!
//! - Per-record TTL: the duration given to each `set` call is honoured
//! - Capacity bound with Moka's own eviction policy
//! - One store for every value type, with checked reads (`TypeMismatch`)
//! - Eviction metrics by cause
//!
//! ## Example
//!
//! ```no_run
//! use readthrough_memory::{MemoryStore, MemoryStoreConfig};
//!
//! let store = MemoryStore::new(MemoryStoreConfig { max_capacity: 50_000 });
//! assert_eq!(store.entry_count(), 0);
//! ```

pub mod metrics;
pub mod store;

// Re-exports
pub use metrics::{StoreMetrics, register_store_metrics};
pub use store::{MemoryStore, MemoryStoreConfig};
