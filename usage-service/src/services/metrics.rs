//! Metrics collection and Prometheus export.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const INGEST_TOTAL: &str = "water_usage_ingest_total";
pub const REGISTRATIONS_TOTAL: &str = "water_usage_registrations_total";
pub const ROLLOVER_USERS_TOTAL: &str = "water_usage_rollover_users_total";
pub const ROLLOVER_FAILURES_TOTAL: &str = "water_usage_rollover_failures_total";
pub const ROLLOVER_DURATION_SECONDS: &str = "water_usage_rollover_duration_seconds";

/// Install the Prometheus recorder. Call once at startup, before anything is recorded.
pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}
