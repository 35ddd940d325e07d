//! Planner metrics, exposed in Prometheus format when an exporter is installed.
//!
//! Without an installed recorder every call here is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Installs the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}

/// Record a planned statement and how many substatements it produced.
pub fn record_plan(substatements: usize) {
    counter!("vctsdb_ql.plan.statements").increment(1);
    histogram!("vctsdb_ql.plan.substatements").record(substatements as f64);
}

/// Record a field that matched none of the measurements of its source.
pub fn record_source_miss() {
    counter!("vctsdb_ql.plan.source_miss").increment(1);
}

pub fn record_empty_time_range() {
    counter!("vctsdb_ql.plan.empty_time_range").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter() {
        record_plan(3);
        record_source_miss();
        record_empty_time_range();
    }
}
