//! Metrics collection and exposition.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_tick() {
    counter!("reconcile_ticks_total").increment(1);
}

/// A tick dropped because the candidate snapshot violated the
/// backend-count invariant.
pub fn record_tick_skipped() {
    counter!("reconcile_skipped_total").increment(1);
}

pub fn record_config_write() {
    counter!("config_writes_total").increment(1);
}

pub fn record_reload() {
    counter!("haproxy_reloads_total").increment(1);
}

pub fn record_socket_commands(count: u64) {
    counter!("haproxy_socket_commands_total").increment(count);
}

/// A socket pass that escalated to a full reload.
pub fn record_socket_fallback() {
    counter!("haproxy_socket_fallbacks_total").increment(1);
}

pub fn record_backend_servers(backend: &str, servers: usize) {
    gauge!("backend_servers", "backend" => backend.to_string()).set(servers as f64);
}
