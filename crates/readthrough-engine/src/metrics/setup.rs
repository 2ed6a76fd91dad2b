//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use readthrough_memory::register_store_metrics;
use tracing::info;

use super::register_metrics;

/// Inicializa el recorder de Prometheus y registra las descripciones.
///
/// Retorna el handle para renderizar el endpoint de scrape. Falla si ya hay
/// un recorder global instalado.
pub fn init_prometheus() -> Result<PrometheusHandle, BuildError> {
    // Buckets para histogramas (en segundos)
    let handle = PrometheusBuilder::new()
        .set_buckets(&[
            0.0001, // 100 microsegundos
            0.0005, // 500 microsegundos
            0.001,  // 1 milisegundo
            0.0025, // 2.5 milisegundos
            0.005,  // 5 milisegundos
            0.01,   // 10 milisegundos
            0.025,  // 25 milisegundos
            0.05,   // 50 milisegundos
            0.1,    // 100 milisegundos
            0.25,   // 250 milisegundos
            0.5,    // 500 milisegundos
            1.0,    // 1 segundo
            2.5,    // 2.5 segundos
            5.0,    // 5 segundos
            10.0,   // 10 segundos
            30.0,   // upstreams lentos
        ])?
        .install_recorder()?;

    register_metrics();
    register_store_metrics();

    info!("readthrough metrics initialized");
    Ok(handle)
}
