use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Once;
use tracing::info;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref EVENTS_ACCEPTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "pipeline_events_accepted_total",
        "Total events accepted by the ingestion handler"
    ))
    .unwrap();
    pub static ref EVENTS_REJECTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "pipeline_events_rejected_total",
        "Total events rejected by validation"
    ))
    .unwrap();
    pub static ref ALERTS_PUBLISHED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "pipeline_alerts_published_total",
        "Total high-temperature alerts published"
    ))
    .unwrap();
    pub static ref BACKEND_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "pipeline_backend_failures_total",
        "Total invocations that failed on a backend or configuration error"
    ))
    .unwrap();
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "pipeline_db_failures_total",
        "Total relational database failures"
    ))
    .unwrap();
    pub static ref BATCH_ROWS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "pipeline_batch_rows_total",
        "Total rows inserted by the batch processor"
    ))
    .unwrap();
    pub static ref BATCH_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "pipeline_batch_latency_seconds",
            "Time taken by one batch processor run"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    )
    .unwrap();
    pub static ref DASHBOARD_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            "dashboard_requests_total",
            "Total dashboard requests by route"
        ),
        &["route"]
    )
    .unwrap();
    pub static ref DASHBOARD_QUERY_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_query_failures_total",
        "Total dashboard queries that failed"
    ))
    .unwrap();
}

static INIT: Once = Once::new();
static INIT_DASHBOARD: Once = Once::new();

/// Registers the pipeline metrics with [`REGISTRY`]. Safe to call more than
/// once.
///
/// The handlers run as short-lived Lambda processes with nothing scraping
/// them, so their values leave the process through [`log_snapshot`].
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(EVENTS_ACCEPTED_TOTAL.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(EVENTS_REJECTED_TOTAL.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(ALERTS_PUBLISHED_TOTAL.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(BACKEND_FAILURES_TOTAL.clone()))
            .unwrap();
        REGISTRY.register(Box::new(DB_FAILURES_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(BATCH_ROWS_TOTAL.clone())).unwrap();
        REGISTRY
            .register(Box::new(BATCH_LATENCY_SECONDS.clone()))
            .unwrap();
    });
}

/// Registers the metrics the dashboard itself updates. These are what its
/// `/metrics` endpoint serves.
pub fn init_dashboard_metrics() {
    INIT_DASHBOARD.call_once(|| {
        REGISTRY
            .register(Box::new(DASHBOARD_REQUESTS_TOTAL.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(DASHBOARD_QUERY_FAILURES_TOTAL.clone()))
            .unwrap();
    });
}

/// Pipeline counter values for the life of the current process.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsSnapshot {
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub alerts_published: u64,
    pub backend_failures: u64,
    pub db_failures: u64,
    pub batch_rows: u64,
    pub batches_processed: u64,
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        events_accepted: EVENTS_ACCEPTED_TOTAL.get() as u64,
        events_rejected: EVENTS_REJECTED_TOTAL.get() as u64,
        alerts_published: ALERTS_PUBLISHED_TOTAL.get() as u64,
        backend_failures: BACKEND_FAILURES_TOTAL.get() as u64,
        db_failures: DB_FAILURES_TOTAL.get() as u64,
        batch_rows: BATCH_ROWS_TOTAL.get() as u64,
        batches_processed: BATCH_LATENCY_SECONDS.get_sample_count(),
    }
}

/// Emits the current counters as one structured log line, so they reach
/// CloudWatch with the rest of the handler's JSON logs.
pub fn log_snapshot(handler: &'static str) -> MetricsSnapshot {
    let s = snapshot();
    info!(
        target: "metrics",
        handler,
        events_accepted = s.events_accepted,
        events_rejected = s.events_rejected,
        alerts_published = s.alerts_published,
        backend_failures = s.backend_failures,
        db_failures = s.db_failures,
        batch_rows = s.batch_rows,
        batches_processed = s.batches_processed,
        "metrics"
    );
    s
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_after_init() {
        init_metrics();
        init_metrics();
        EVENTS_ACCEPTED_TOTAL.inc();

        let text = gather_metrics();
        assert!(text.contains("pipeline_events_accepted_total"));
        assert!(text.contains("pipeline_batch_latency_seconds"));
    }

    #[test]
    fn test_dashboard_metrics_are_gathered() {
        init_dashboard_metrics();
        DASHBOARD_REQUESTS_TOTAL.with_label_values(&["index"]).inc();

        let text = gather_metrics();
        assert!(text.contains("dashboard_requests_total"));
        assert!(text.contains("route=\"index\""));
    }

    #[test]
    fn test_snapshot_tracks_counters() {
        let before = snapshot();
        BATCH_ROWS_TOTAL.inc_by(3.0);
        EVENTS_REJECTED_TOTAL.inc();

        let after = log_snapshot("test");
        assert!(after.batch_rows >= before.batch_rows + 3);
        assert!(after.events_rejected > before.events_rejected);
    }
}
