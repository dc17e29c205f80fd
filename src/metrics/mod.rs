//! Prometheus metrics for flows, the model cache and the backing store.
//!
//! Metrics live in a process-wide registry and are updated from the hot paths with
//! plain counter/histogram calls. `init_metrics` registers them once at startup;
//! `gather_metrics` renders the text exposition format served at `/metrics`.
//!
//! # Example
//! ```no_run
//! use model_grid::metrics::FLOW_EVENTS_TOTAL;
//!
//! FLOW_EVENTS_TOTAL.with_label_values(&["weka", "published"]).inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Flow Metrics
    // ============================================================================

    /// Events handled per flow
    ///
    /// Labels: flow, outcome (received, published, failed, invalid)
    pub static ref FLOW_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("flow_events_total", "Total number of events handled by a flow")
            .namespace("model_grid"),
        &["flow", "outcome"]
    ).expect("Failed to create FLOW_EVENTS_TOTAL metric");

    /// Results emitted per flow and result kind
    ///
    /// Labels: flow, result
    pub static ref FLOW_RESULTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("flow_results_total", "Total number of combiner results emitted")
            .namespace("model_grid"),
        &["flow", "result"]
    ).expect("Failed to create FLOW_RESULTS_TOTAL metric");

    /// End-to-end event processing time
    ///
    /// Labels: flow
    pub static ref FLOW_EVENT_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "flow_event_duration_seconds",
            "Time from receipt to publication of an event"
        )
        .namespace("model_grid")
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["flow"]
    ).expect("Failed to create FLOW_EVENT_DURATION_SECONDS metric");

    // ============================================================================
    // Cache Metrics
    // ============================================================================

    /// Near-cache lookups
    ///
    /// Labels: outcome (hit, miss)
    pub static ref CACHE_LOOKUPS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cache_lookups_total", "Near-cache lookups by outcome")
            .namespace("model_grid"),
        &["outcome"]
    ).expect("Failed to create CACHE_LOOKUPS_TOTAL metric");

    /// Write-through events other than plain success
    ///
    /// Labels: event (retry, conflict, conflict_retry, invalidated)
    pub static ref CACHE_WRITE_THROUGH_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cache_write_through_events_total", "Write-through retries, conflicts and invalidations")
            .namespace("model_grid"),
        &["event"]
    ).expect("Failed to create CACHE_WRITE_THROUGH_EVENTS_TOTAL metric");

    /// Models currently held in the near-cache
    pub static ref CACHE_ENTRIES: IntGauge = IntGauge::with_opts(
        Opts::new("cache_entries", "Number of models held in the near-cache")
            .namespace("model_grid")
    ).expect("Failed to create CACHE_ENTRIES metric");

    // ============================================================================
    // Storage Metrics
    // ============================================================================

    /// Backing store operations
    ///
    /// Labels: backend, operation (load, save, ping, count), status (success, error, conflict, timeout)
    pub static ref STORAGE_OPERATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("storage_operations_total", "Total number of backing store operations")
            .namespace("model_grid"),
        &["backend", "operation", "status"]
    ).expect("Failed to create STORAGE_OPERATIONS_TOTAL metric");

    /// Backing store latency
    ///
    /// Labels: backend, operation
    pub static ref STORAGE_OPERATION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "storage_operation_duration_seconds",
            "Backing store operation duration in seconds"
        )
        .namespace("model_grid")
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5]),
        &["backend", "operation"]
    ).expect("Failed to create STORAGE_OPERATION_DURATION_SECONDS metric");
}

/// Register all metrics with the global registry
///
/// Fails with `AlreadyReg` when called twice.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(FLOW_EVENTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(FLOW_RESULTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(FLOW_EVENT_DURATION_SECONDS.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(CACHE_LOOKUPS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(CACHE_WRITE_THROUGH_EVENTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(CACHE_ENTRIES.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(STORAGE_OPERATIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(STORAGE_OPERATION_DURATION_SECONDS.clone()))?;

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Render all registered metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
