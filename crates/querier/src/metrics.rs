use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use storage::{Diagnostics, MappingError, TracingDiagnostics};

const NAMESPACE: &str = "jaeger_doris";

/// Prometheus metrics of the storage plugin, owned by one registry
#[derive(Clone)]
pub struct QuerierMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub request_errors_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,
    pub retrieved_spans_total: IntCounterVec,
    pub dropped_rows_total: IntCounter,
    pub decode_warnings_total: IntCounterVec,
}

impl QuerierMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Number of gRPC requests received").namespace(NAMESPACE),
            &["operation"],
        )?;
        let request_errors_total = IntCounterVec::new(
            Opts::new("request_errors_total", "Number of gRPC requests that failed")
                .namespace(NAMESPACE),
            &["operation"],
        )?;
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "gRPC request duration in seconds")
                .namespace(NAMESPACE),
            &["operation", "error"],
        )?;
        let retrieved_spans_total = IntCounterVec::new(
            Opts::new("retrieved_spans_total", "Number of spans sent to the query service")
                .namespace(NAMESPACE),
            &["operation"],
        )?;
        let dropped_rows_total = IntCounter::with_opts(
            Opts::new("dropped_rows_total", "Number of result rows that could not be mapped")
                .namespace(NAMESPACE),
        )?;
        let decode_warnings_total = IntCounterVec::new(
            Opts::new(
                "decode_warnings_total",
                "Number of row elements left out because they could not be decoded",
            )
            .namespace(NAMESPACE),
            &["column"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_errors_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(retrieved_spans_total.clone()))?;
        registry.register(Box::new(dropped_rows_total.clone()))?;
        registry.register(Box::new(decode_warnings_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_errors_total,
            request_duration_seconds,
            retrieved_spans_total,
            dropped_rows_total,
            decode_warnings_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Diagnostics sink that logs like [`TracingDiagnostics`] and counts
    pub fn diagnostics(&self) -> MetricsDiagnostics<'_> {
        MetricsDiagnostics { metrics: self }
    }
}

pub struct MetricsDiagnostics<'a> {
    metrics: &'a QuerierMetrics,
}

impl Diagnostics for MetricsDiagnostics<'_> {
    fn warn(&self, column: &str, message: &str) {
        self.metrics
            .decode_warnings_total
            .with_label_values(&[column])
            .inc();
        TracingDiagnostics.warn(column, message);
    }

    fn row_dropped(&self, error: &MappingError) {
        self.metrics.dropped_rows_total.inc();
        TracingDiagnostics.row_dropped(error);
    }
}
