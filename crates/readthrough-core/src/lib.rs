//! # Readthrough Core
//!
//! Domain types and capability traits for the readthrough cache orchestrator.
//!
//! This crate has no opinion on where records live or how background work
//! runs. It defines:
//!
//! - [`CacheKey`] - validated, non-empty key
//! - [`CacheRecord`] - value plus refresh threshold
//! - [`CachePolicy`] / [`FetchPolicy`] - defaults and per-call overrides
//! - [`FetchRequest`] - the upstream fetch operation bundled with its overrides
//! - [`Storage`] - get/set/remove capability implemented by backends
//! - [`TaskRunner`] - fire-and-forget submission of background refreshes
//! - [`CacheError`] / [`StoreError`] - error taxonomy
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use readthrough_core::{CachePolicy, CacheRecord, FetchRequest};
//!
//! let defaults = CachePolicy::default();
//! let request = FetchRequest::new(|| async { Ok::<_, anyhow::Error>(Some("fresh".to_string())) })
//!     .refresh_after(Duration::from_secs(5));
//!
//! let policy = request.policy().resolve(&defaults);
//! let record = CacheRecord::new("fresh".to_string(), policy.refresh_after);
//! assert!(record.is_fresh());
//! # let _ = request;
//! ```

pub mod error;
pub mod key;
pub mod policy;
pub mod record;
pub mod request;
pub mod runner;
pub mod storage;

// Re-exports
pub use error::{CacheError, Result, StoreError};
pub use key::CacheKey;
pub use policy::{CachePolicy, FetchPolicy, PolicyError};
pub use record::CacheRecord;
pub use request::{FetchRequest, FetchResult};
pub use runner::{BoxTask, TaskRunner};
pub use storage::{CacheValue, Storage};
