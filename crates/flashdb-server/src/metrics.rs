//! Prometheus metrics fed by the connection's query logger

use std::sync::Arc;
use std::time::Duration;

use flashdb::{Error, QueryLogger, TracingLogger, Value};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    queries: IntCounter,
    failures: IntCounterVec,
    slow_queries: IntCounter,
    duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let queries = IntCounter::new("flashdb_queries_total", "Statements executed")?;
        let failures = IntCounterVec::new(
            Opts::new("flashdb_query_failures_total", "Statements that failed"),
            &["kind"],
        )?;
        let slow_queries = IntCounter::new(
            "flashdb_slow_queries_total",
            "Statements slower than the configured threshold",
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            "flashdb_query_duration_seconds",
            "Statement wall-clock time",
        ))?;

        registry.register(Box::new(queries.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(slow_queries.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            queries,
            failures,
            slow_queries,
            duration,
        })
    }

    /// Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Counts statements, then hands them to the tracing logger
pub struct MetricsLogger {
    metrics: Arc<Metrics>,
    inner: TracingLogger,
}

impl MetricsLogger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            inner: TracingLogger,
        }
    }
}

impl QueryLogger for MetricsLogger {
    fn log_query(&self, query: &str, parameters: &[Value], duration: Duration) {
        self.metrics.queries.inc();
        self.metrics.duration.observe(duration.as_secs_f64());
        self.inner.log_query(query, parameters, duration);
    }

    fn log_query_error(&self, error: &Error, query: &str, parameters: &[Value]) {
        self.metrics
            .failures
            .with_label_values(&[error.kind().as_str()])
            .inc();
        self.inner.log_query_error(error, query, parameters);
    }

    fn log_query_slow(&self, duration: Duration, query: &str, parameters: &[Value]) {
        self.metrics.slow_queries.inc();
        self.inner.log_query_slow(duration, query, parameters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashdb::{connect, ConnectionOptions};

    #[test]
    fn test_counts_statements() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let options = ConnectionOptions::new()
            .with_logger(Arc::new(MetricsLogger::new(metrics.clone())))
            .with_max_query_execution_time(Duration::ZERO);
        let mut conn = connect(options).unwrap();

        conn.execute("SELECT 1", &[], false).unwrap();
        conn.execute("SELECT * FROM missing_table", &[], false).unwrap_err();
        conn.execute("SELECT ?", &[], false).unwrap_err();
        conn.execute("COMMIT", &[], false).unwrap_err();

        assert_eq!(metrics.queries.get(), 4);
        assert_eq!(metrics.failures.with_label_values(&["query_execution"]).get(), 1);
        assert_eq!(metrics.failures.with_label_values(&["parameter_mismatch"]).get(), 1);
        assert_eq!(metrics.failures.with_label_values(&["no_active_transaction"]).get(), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("flashdb_queries_total 4"));
        assert!(text.contains("flashdb_query_duration_seconds_count 4"));
    }
}
