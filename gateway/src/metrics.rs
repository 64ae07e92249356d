//! Prometheus metrics for the gateway

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};

// ── Key-value metrics ────────────────────────────────────────────────────────

pub static KV_OPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recordgate_kv_ops_total",
        "Key-value operations by kind and outcome",
        &["op", "status"]
    )
    .unwrap()
});

// ── Record query metrics ─────────────────────────────────────────────────────

pub static QUERY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recordgate_query_total",
        "Record queries by outcome",
        &["status"]
    )
    .unwrap()
});

pub static QUERY_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "recordgate_query_duration_seconds",
        "Record query latency",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap()
});

pub static QUERY_RECORDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "recordgate_query_records",
        "Records returned per successful query",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Render all registered metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!("Metrics encoding failed: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_touched_metrics() {
        KV_OPS_TOTAL.with_label_values(&["get", "ok"]).inc();
        QUERY_TOTAL.with_label_values(&["empty"]).inc();
        let text = encode_metrics();
        assert!(text.contains("recordgate_kv_ops_total"));
        assert!(text.contains("recordgate_query_total"));
    }
}
