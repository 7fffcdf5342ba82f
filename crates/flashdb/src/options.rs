//! Connection options

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use flashdb_engine::EngineFactory;

use crate::logger::{QueryLogger, TracingLogger};

/// Which engine backs a connection
#[derive(Clone)]
pub enum EngineSelection {
    /// Looked up in the engine registry, case-insensitively
    Named(String),
    /// Caller-supplied factory, bypassing the registry
    Injected(Arc<dyn EngineFactory>),
}

impl fmt::Debug for EngineSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineSelection::Named(name) => f.debug_tuple("Named").field(name).finish(),
            EngineSelection::Injected(factory) => {
                f.debug_tuple("Injected").field(&factory.name()).finish()
            }
        }
    }
}

/// What `begin` does while a transaction is already active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NestingPolicy {
    /// Fail with `TransactionAlreadyActive`
    #[default]
    Reject,
    /// Open a savepoint; nested commit/rollback release or roll back to it
    Savepoint,
}

impl FromStr for NestingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(NestingPolicy::Reject),
            "savepoint" => Ok(NestingPolicy::Savepoint),
            other => Err(format!("unknown nesting policy: {}", other)),
        }
    }
}

#[derive(Clone)]
pub struct ConnectionOptions {
    /// `None` picks the first engine the registry knows
    pub engine: Option<EngineSelection>,

    /// Statements running longer than this are reported to the logger as slow
    pub max_query_execution_time: Option<Duration>,

    /// Upper bound on rows a single statement may return
    pub max_rows: Option<u64>,

    pub nested_transactions: NestingPolicy,

    pub logger: Arc<dyn QueryLogger>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            engine: None,
            max_query_execution_time: None,
            max_rows: None,
            nested_transactions: NestingPolicy::default(),
            logger: Arc::new(TracingLogger),
        }
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("engine", &self.engine)
            .field("max_query_execution_time", &self.max_query_execution_time)
            .field("max_rows", &self.max_rows)
            .field("nested_transactions", &self.nested_transactions)
            .finish_non_exhaustive()
    }
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, name: impl Into<String>) -> Self {
        self.engine = Some(EngineSelection::Named(name.into()));
        self
    }

    pub fn with_engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engine = Some(EngineSelection::Injected(factory));
        self
    }

    pub fn with_max_query_execution_time(mut self, threshold: Duration) -> Self {
        self.max_query_execution_time = Some(threshold);
        self
    }

    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_nested_transactions(mut self, policy: NestingPolicy) -> Self {
        self.nested_transactions = policy;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = logger;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_policy_from_str() {
        assert_eq!("reject".parse::<NestingPolicy>(), Ok(NestingPolicy::Reject));
        assert_eq!("SavePoint".parse::<NestingPolicy>(), Ok(NestingPolicy::Savepoint));
        assert!("nested".parse::<NestingPolicy>().is_err());
    }

    #[test]
    fn test_builder() {
        let options = ConnectionOptions::new()
            .with_engine("sqlite")
            .with_max_rows(10)
            .with_max_query_execution_time(Duration::from_millis(5));
        assert!(matches!(options.engine, Some(EngineSelection::Named(ref n)) if n == "sqlite"));
        assert_eq!(options.max_rows, Some(10));
        assert_eq!(options.nested_transactions, NestingPolicy::Reject);
        assert!(format!("{:?}", options).contains("sqlite"));
    }
}
