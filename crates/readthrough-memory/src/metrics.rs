//! Store metrics recording.

use metrics::{counter, gauge};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registra las metricas del store.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_store_metrics() {
    metrics::describe_counter!(
        "readthrough_store_evictions_total",
        "Total number of records dropped by the memory store"
    );
    metrics::describe_gauge!(
        "readthrough_store_entries",
        "Current number of records in the memory store"
    );
}

/// Recorder de metricas del store.
/// Usa atomic counters internos para poder inspeccionarlos en tests.
#[derive(Debug, Clone, Default)]
pub struct StoreMetrics {
    evictions: Arc<AtomicU64>,
    expirations: Arc<AtomicU64>,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra una eviction con su causa.
    /// Los overwrites no llegan aqui, solo records que salen del store.
    pub fn record_eviction(&self, reason: &'static str) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        if reason == "ttl" {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        counter!("readthrough_store_evictions_total", "reason" => reason).increment(1);
    }

    /// Actualiza el gauge de entries
    pub fn update_entry_count(&self, count: u64) {
        gauge!("readthrough_store_entries").set(count as f64);
    }

    /// Retorna el numero total de evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Retorna cuantas evictions fueron por TTL
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }
}
