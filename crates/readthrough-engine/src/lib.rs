//! # Readthrough Engine
//!
//! Read-through cache orchestration: serve from the store while fresh,
//! refresh from the source when stale, and make sure each key is fetched by
//! at most one caller at a time.
//!
//! ## Components
//!
//! - [`CacheOrchestrator`] - `get_or_create` and friends over any [`Storage`]
//! - [`KeyLockRegistry`] - per-key exclusive access with bounded waits
//! - [`TokioTaskRunner`] - background refreshes on the current runtime
//! - [`Settings`] - file and environment configuration
//! - [`metrics`] - Prometheus counters and histograms
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use readthrough_core::FetchRequest;
//! use readthrough_engine::{CacheOrchestrator, TokioTaskRunner};
//! use readthrough_memory::MemoryStore;
//!
//! # #[derive(Clone)] struct Todo { title: String }
//! # async fn load_todo(_id: u32) -> anyhow::Result<Option<Todo>> { Ok(None) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = CacheOrchestrator::builder(MemoryStore::with_defaults())
//!     .task_runner(TokioTaskRunner::new())
//!     .build()?;
//!
//! let todo = cache
//!     .get_or_create_background(
//!         "todo:1",
//!         FetchRequest::new(|| load_todo(1)).refresh_after(Duration::from_secs(10)),
//!     )
//!     .await?;
//! println!("{}", todo.title);
//! # Ok(())
//! # }
//! ```
//!
//! [`Storage`]: readthrough_core::Storage

pub mod lock;
pub mod metrics;
pub mod orchestrator;
pub mod runner;
pub mod settings;

// Re-exports
pub use lock::{KeyLockGuard, KeyLockRegistry};
pub use metrics::{OrchestratorMetrics, init_prometheus, register_metrics};
pub use orchestrator::{CacheOrchestrator, OrchestratorBuilder};
pub use runner::TokioTaskRunner;
pub use settings::{Settings, SettingsError};
