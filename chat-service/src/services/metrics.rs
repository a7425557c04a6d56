//! Prometheus metrics for chat-service.
//!
//! HTTP request metrics come from the shared middleware; this module adds
//! completion metrics and owns the exporter handle behind `/metrics`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Install the Prometheus recorder.
///
/// Safe to call more than once; only the first call installs a recorder.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    let installed = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )
        .and_then(|builder| builder.install_recorder());

    match installed {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
            tracing::info!("Prometheus metrics initialized");
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
    }
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record one completion call and its latency.
pub fn record_completion(model: &str, outcome: &str, duration: Duration) {
    let labels = [("model", model.to_string()), ("outcome", outcome.to_string())];
    counter!("chat_completions_total", &labels).increment(1);
    histogram!("chat_completion_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record token usage reported by the provider.
pub fn record_tokens(model: &str, input_tokens: u32, output_tokens: u32) {
    counter!("chat_tokens_total", "model" => model.to_string(), "type" => "input")
        .increment(u64::from(input_tokens));
    counter!("chat_tokens_total", "model" => model.to_string(), "type" => "output")
        .increment(u64::from(output_tokens));
}
