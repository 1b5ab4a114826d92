//! Prometheus counters for the approval workflow.
//!
//! Exposed at `/metrics`. Counters live in the global default registry and are
//! registered once on first use.

use once_cell::sync::Lazy;
use prometheus::{opts, register_counter_vec, CounterVec, Encoder, TextEncoder};

use crate::models::approval::{RequestKind, RequestStatus};

struct WorkflowMetrics {
    transitions_total: CounterVec,
    rejected_links_total: CounterVec,
    notifications_total: CounterVec,
}

static METRICS: Lazy<WorkflowMetrics> = Lazy::new(|| WorkflowMetrics {
    transitions_total: register_counter_vec!(
        opts!(
            "labstock_transitions_total",
            "Committed approval status transitions"
        ),
        &["kind", "from", "to"]
    )
    .expect("failed to register labstock_transitions_total"),

    rejected_links_total: register_counter_vec!(
        opts!(
            "labstock_rejected_links_total",
            "Approval links rejected before any state change"
        ),
        &["reason"]
    )
    .expect("failed to register labstock_rejected_links_total"),

    notifications_total: register_counter_vec!(
        opts!("labstock_notifications_total", "Notification attempts by outcome"),
        &["outcome"]
    )
    .expect("failed to register labstock_notifications_total"),
});

pub fn record_transition(kind: RequestKind, from: RequestStatus, to: RequestStatus) {
    METRICS
        .transitions_total
        .with_label_values(&[kind.as_str(), from.as_str(), to.as_str()])
        .inc();
}

/// `reason` is one of a fixed set of short codes (`expired`, `mismatch`, ...).
pub fn record_rejected_link(reason: &str) {
    METRICS
        .rejected_links_total
        .with_label_values(&[reason])
        .inc();
}

pub fn record_notification(outcome: &str) {
    METRICS
        .notifications_total
        .with_label_values(&[outcome])
        .inc();
}

/// Encode all registered metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_transition_is_exported() {
        record_transition(
            RequestKind::ScrapRequest,
            RequestStatus::Pending,
            RequestStatus::AdminApproved,
        );
        let output = encode_metrics();
        assert!(output.contains("labstock_transitions_total"));
        assert!(output.contains(r#"from="pending""#));
    }

    #[test]
    fn test_rejection_counter_increments() {
        record_rejected_link("expired");
        let before = METRICS
            .rejected_links_total
            .with_label_values(&["expired"])
            .get();
        record_rejected_link("expired");
        let after = METRICS
            .rejected_links_total
            .with_label_values(&["expired"])
            .get();
        assert_eq!(after - before, 1.0);
    }
}
