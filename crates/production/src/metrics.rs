//! Proxy metrics using the native Prometheus client.
//!
//! Metrics are domain-specific rather than generic event counters.
//! Use traces for event-level granularity during investigations.

use abci_proxy_scheduler::{AppliedChanges, ScheduleError};
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram_vec, Counter,
    CounterVec, Gauge, HistogramVec,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Domain-specific metrics for the proxy.
pub struct Metrics {
    // === Forwarding ===
    pub forwarded_calls: CounterVec,
    pub downstream_errors: CounterVec,
    pub downstream_latency: HistogramVec,
    pub echoed_transactions: Counter,

    // === Scheduling ===
    pub changes_scheduled: Counter,
    pub changes_rejected: CounterVec,

    // === Block boundaries ===
    pub late_arrivals: Counter,
    pub expired_updates: Counter,
    pub applied_updates: Counter,
    pub last_height: Gauge,
    pub pending_heights: Gauge,
}

impl Metrics {
    fn new() -> Self {
        // Latency buckets: 100us to 10s
        let latency_buckets = vec![
            0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0,
        ];

        Self {
            // Forwarding
            forwarded_calls: register_counter_vec!(
                "abci_proxy_forwarded_calls_total",
                "Protocol calls forwarded to the downstream application",
                &["method"]
            )
            .expect("metric can be registered"),

            downstream_errors: register_counter_vec!(
                "abci_proxy_downstream_errors_total",
                "Forwarded calls that failed",
                &["method"]
            )
            .expect("metric can be registered"),

            downstream_latency: register_histogram_vec!(
                "abci_proxy_downstream_latency_seconds",
                "Downstream call latency",
                &["method"],
                latency_buckets
            )
            .expect("metric can be registered"),

            echoed_transactions: register_counter!(
                "abci_proxy_echoed_transactions_total",
                "Transactions answered locally because of the echo prefix"
            )
            .expect("metric can be registered"),

            // Scheduling
            changes_scheduled: register_counter!(
                "abci_proxy_validator_changes_scheduled_total",
                "Validator set changes accepted by the scheduler"
            )
            .expect("metric can be registered"),

            changes_rejected: register_counter_vec!(
                "abci_proxy_validator_changes_rejected_total",
                "Validator set changes rejected",
                &["reason"]
            )
            .expect("metric can be registered"),

            // Block boundaries
            late_arrivals: register_counter!(
                "abci_proxy_validator_changes_late_total",
                "Validator set changes drained after their height had passed"
            )
            .expect("metric can be registered"),

            expired_updates: register_counter!(
                "abci_proxy_validator_updates_expired_total",
                "Validator updates discarded without being applied"
            )
            .expect("metric can be registered"),

            applied_updates: register_counter!(
                "abci_proxy_validator_updates_applied_total",
                "Validator updates returned to the engine at end-block"
            )
            .expect("metric can be registered"),

            last_height: register_gauge!(
                "abci_proxy_last_height",
                "Most recently completed block height"
            )
            .expect("metric can be registered"),

            pending_heights: register_gauge!(
                "abci_proxy_pending_heights",
                "Heights with scheduled validator changes"
            )
            .expect("metric can be registered"),
        }
    }
}

/// Get or initialize the global metrics instance.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Record a forwarded call and its outcome.
pub fn record_forwarded_call(method: &str, latency_secs: f64, failed: bool) {
    let m = metrics();
    m.forwarded_calls.with_label_values(&[method]).inc();
    m.downstream_latency
        .with_label_values(&[method])
        .observe(latency_secs);
    if failed {
        m.downstream_errors.with_label_values(&[method]).inc();
    }
}

/// Record a transaction answered by the echo prefix.
pub fn record_echoed_transaction() {
    metrics().echoed_transactions.inc();
}

/// Record an accepted validator set change.
pub fn record_change_scheduled() {
    metrics().changes_scheduled.inc();
}

/// Record a rejected validator set change.
pub fn record_change_rejected(err: &ScheduleError) {
    record_rejection(err.reason());
}

/// Record a control-plane request that could not be parsed into a change.
pub fn record_malformed_change() {
    record_rejection("malformed");
}

/// Record a rejection with reason.
///
/// **Cardinality control**: only `"past_height"`, `"queue_full"`,
/// `"closed"` and `"malformed"` are used.
fn record_rejection(reason: &str) {
    debug_assert!(
        matches!(reason, "past_height" | "queue_full" | "closed" | "malformed"),
        "Unknown rejection reason: {}",
        reason
    );
    metrics()
        .changes_rejected
        .with_label_values(&[reason])
        .inc();
}

/// Record the outcome of an end-block boundary.
pub fn record_end_block(applied: &AppliedChanges, pending_heights: usize) {
    let m = metrics();
    m.last_height.set(applied.height.0 as f64);
    m.pending_heights.set(pending_heights as f64);
    m.late_arrivals.inc_by(applied.late_arrivals as f64);
    m.expired_updates.inc_by(applied.expired_updates as f64);
    m.applied_updates.inc_by(applied.validators.len() as f64);
}
