//! Metrics collection and exposition.
//!
//! # Metrics
//! - `failover_probes_total` (counter): probe outcomes by `outcome`
//! - `failover_cycles_total` (counter): finished cycles by `result`
//! - `failover_mutations_total` (counter): applied changes by `action`
//! - `failover_disabled_upstreams` (gauge): addresses held in failover state
//! - `failover_cycle_duration_seconds` (histogram): wall time per cycle
//!
//! Without an installed recorder every call is a no-op, so the CLI and the
//! tests can share these code paths.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::mutation::Action;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(healthy: bool) {
    let outcome = if healthy { "healthy" } else { "unhealthy" };
    metrics::counter!("failover_probes_total", "outcome" => outcome).increment(1);
}

pub fn record_cycle(result: &'static str, elapsed: Duration) {
    metrics::counter!("failover_cycles_total", "result" => result).increment(1);
    metrics::histogram!("failover_cycle_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_mutation(action: Action) {
    metrics::counter!("failover_mutations_total", "action" => action.as_str()).increment(1);
}

pub fn record_disabled_upstreams(count: usize) {
    metrics::gauge!("failover_disabled_upstreams").set(count as f64);
}
