//! Metrics for the readthrough orchestrator.

pub mod orchestrator;
pub mod setup;

pub use orchestrator::{FetchOutcome, LookupOutcome, OrchestratorMetrics, register_metrics};
pub use setup::init_prometheus;
