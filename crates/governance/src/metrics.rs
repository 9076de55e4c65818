//! Command metrics, exported through Prometheus when a recorder is installed.
//!
//! Without a recorder the macros are no-ops, so library code can record
//! unconditionally.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shellguard_core::{Error, Result, RiskLevel, Venue};

pub const COMMANDS_TOTAL: &str = "shellguard_commands_total";
pub const COMMAND_DURATION: &str = "shellguard_command_duration_seconds";

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Count one routed command and record how long it took.
pub fn track_command(risk: RiskLevel, venue: Venue, latency_sec: f64) {
    metrics::counter!(
        COMMANDS_TOTAL,
        "risk" => risk.as_str(),
        "venue" => venue.as_str()
    )
    .increment(1);

    metrics::histogram!(COMMAND_DURATION, "venue" => venue.as_str()).record(latency_sec);
}

