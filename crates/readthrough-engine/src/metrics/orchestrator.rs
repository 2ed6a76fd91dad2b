//! Lookup, fetch and lock metrics.

use metrics::{counter, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Registra las metricas del orquestador.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_metrics() {
    metrics::describe_counter!(
        "readthrough_lookups_total",
        "Lookups by what the store returned (fresh, stale, miss)"
    );
    metrics::describe_counter!(
        "readthrough_fetches_total",
        "Upstream fetches by outcome (value, tombstone, error)"
    );
    metrics::describe_counter!(
        "readthrough_lock_timeouts_total",
        "Misses that gave up waiting for the refresh lock"
    );
    metrics::describe_counter!(
        "readthrough_store_failures_total",
        "Store operations that failed and were absorbed"
    );
    metrics::describe_histogram!(
        "readthrough_fetch_seconds",
        "Time spent in upstream fetch operations"
    );
}

/// What the initial store read found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Fresh,
    Stale,
    Miss,
}

impl LookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Miss => "miss",
        }
    }
}

/// How an upstream fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Value,
    /// The source reported the value no longer exists.
    Tombstone,
    Error,
}

impl FetchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Tombstone => "tombstone",
            Self::Error => "error",
        }
    }
}

/// Recorder de metricas del orquestador.
/// Usa atomic counters internos para poder inspeccionarlos en tests.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorMetrics {
    fresh: Arc<AtomicU64>,
    stale: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    fetches: Arc<AtomicU64>,
    lock_timeouts: Arc<AtomicU64>,
    store_failures: Arc<AtomicU64>,
}

impl OrchestratorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra el resultado de la lectura inicial
    pub fn record_lookup(&self, outcome: LookupOutcome) {
        let slot = match outcome {
            LookupOutcome::Fresh => &self.fresh,
            LookupOutcome::Stale => &self.stale,
            LookupOutcome::Miss => &self.misses,
        };
        slot.fetch_add(1, Ordering::Relaxed);
        counter!("readthrough_lookups_total", "outcome" => outcome.as_str()).increment(1);
    }

    /// Registra un fetch al upstream y su duracion
    pub fn record_fetch(&self, outcome: FetchOutcome, duration: Duration) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        counter!("readthrough_fetches_total", "outcome" => outcome.as_str()).increment(1);
        histogram!("readthrough_fetch_seconds", "outcome" => outcome.as_str())
            .record(duration.as_secs_f64());
    }

    /// Registra un miss que no consiguio el lock a tiempo
    pub fn record_lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
        counter!("readthrough_lock_timeouts_total").increment(1);
    }

    /// Registra un fallo del store que fue absorbido
    pub fn record_store_failure(&self, operation: &'static str, kind: &'static str) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
        counter!(
            "readthrough_store_failures_total",
            "operation" => operation,
            "kind" => kind
        )
        .increment(1);
    }

    /// Fraccion de lookups servidos sin tocar el upstream ni esperar
    pub fn fresh_rate(&self) -> f64 {
        let fresh = self.fresh() as f64;
        let total = fresh + self.stale() as f64 + self.misses() as f64;
        if total == 0.0 { 0.0 } else { fresh / total }
    }

    pub fn fresh(&self) -> u64 {
        self.fresh.load(Ordering::Relaxed)
    }

    pub fn stale(&self) -> u64 {
        self.stale.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Retorna el numero de fetches ejecutados, con cualquier resultado
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn lock_timeouts(&self) -> u64 {
        self.lock_timeouts.load(Ordering::Relaxed)
    }

    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }
}
