// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

pub const EVENTS_APPLIED: &str = "easel_events_applied_total";
pub const COMMANDS_REJECTED: &str = "easel_commands_rejected_total";
pub const HISTORY_COMPACTIONS: &str = "easel_history_compactions_total";
pub const RECONCILIATIONS: &str = "easel_reconciliations_total";
pub const RESYNCS: &str = "easel_resyncs_total";
pub const REPLAY_DURATION: &str = "easel_replay_duration_seconds";

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Initialize Tracing (Logs)
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "easel_node=debug,easel_kernel=info".into()),
    );
    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_err()
    {
        tracing::warn!("Tracing subscriber already installed");
    }

    // 2. Initialize Metrics (Prometheus)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("Prometheus recorder not installed: {}", e),
    }

    metrics::describe_counter!(EVENTS_APPLIED, "Total number of events applied by a room");
    metrics::describe_counter!(COMMANDS_REJECTED, "Commands refused by validation or rolled back");
    metrics::describe_counter!(HISTORY_COMPACTIONS, "Compactions that folded history into the checkpoint");
    metrics::describe_counter!(RECONCILIATIONS, "Client predictions discarded after a mismatch");
    metrics::describe_counter!(RESYNCS, "Full canvas states sent to or installed by a client");
    metrics::describe_histogram!(REPLAY_DURATION, "Time taken to decode and install a sync state");

    metrics::gauge!("easel_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
