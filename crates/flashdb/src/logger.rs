//! Observability sink for executed statements
//!
//! Every statement reports its text, parameters and wall-clock duration;
//! failures and slow statements report again. Sinks are fire-and-forget and
//! never influence the result.

use std::time::Duration;

use flashdb_types::Value;
use tracing::{debug, error, warn};

use crate::error::{display_parameters, Error};

pub trait QueryLogger: Send + Sync {
    /// Called once per statement, successful or not
    fn log_query(&self, _query: &str, _parameters: &[Value], _duration: Duration) {}

    /// Called for every failed statement, whatever the error kind
    fn log_query_error(&self, _error: &Error, _query: &str, _parameters: &[Value]) {}

    /// Called when a statement ran longer than `max_query_execution_time`
    fn log_query_slow(&self, _duration: Duration, _query: &str, _parameters: &[Value]) {}
}

/// Emits `tracing` events under the `flashdb::query` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl QueryLogger for TracingLogger {
    fn log_query(&self, query: &str, parameters: &[Value], duration: Duration) {
        debug!(
            target: "flashdb::query",
            query,
            parameters = %display_parameters(parameters),
            duration_ms = duration.as_millis() as u64,
            "query executed"
        );
    }

    fn log_query_error(&self, error: &Error, query: &str, parameters: &[Value]) {
        error!(
            target: "flashdb::query",
            query,
            parameters = %display_parameters(parameters),
            kind = error.kind().as_str(),
            error = %error,
            "query failed"
        );
    }

    fn log_query_slow(&self, duration: Duration, query: &str, parameters: &[Value]) {
        warn!(
            target: "flashdb::query",
            query,
            parameters = %display_parameters(parameters),
            duration_ms = duration.as_millis() as u64,
            "query is slow"
        );
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl QueryLogger for NoopLogger {}
