use flashdb_engine::EngineError;
use flashdb_sql::CompileError;
use flashdb_types::Value;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Flat error taxonomy for callers that only need to branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    ParameterMismatch,
    TransactionAlreadyActive,
    NoActiveTransaction,
    HandleAlreadyReleased,
    QueryExecution,
    DependencyUnavailable,
    ConnectionFailed,
}

impl ErrorKind {
    /// Expected precondition failures, as opposed to engine faults
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ErrorKind::Syntax
                | ErrorKind::ParameterMismatch
                | ErrorKind::TransactionAlreadyActive
                | ErrorKind::NoActiveTransaction
                | ErrorKind::HandleAlreadyReleased
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::ParameterMismatch => "parameter_mismatch",
            ErrorKind::TransactionAlreadyActive => "transaction_already_active",
            ErrorKind::NoActiveTransaction => "no_active_transaction",
            ErrorKind::HandleAlreadyReleased => "handle_already_released",
            ErrorKind::QueryExecution => "query_execution",
            ErrorKind::DependencyUnavailable => "dependency_unavailable",
            ErrorKind::ConnectionFailed => "connection_failed",
        }
    }
}

/// Why a statement failed
#[derive(Debug, Error)]
pub enum QueryFailure {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A statement failure, with everything needed to reproduce it
#[derive(Debug, Error)]
#[error("Query failed: {cause} [query: {query}] [parameters: {}]", display_parameters(.parameters))]
pub struct QueryFailedError {
    pub query: String,
    pub parameters: Vec<Value>,
    #[source]
    pub cause: QueryFailure,
}

impl QueryFailedError {
    pub fn new(query: &str, parameters: &[Value], cause: QueryFailure) -> Self {
        Self {
            query: query.to_string(),
            parameters: parameters.to_vec(),
            cause,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.cause {
            QueryFailure::Compile(CompileError::Syntax { .. }) => ErrorKind::Syntax,
            QueryFailure::Compile(CompileError::ParameterMismatch { .. }) => {
                ErrorKind::ParameterMismatch
            }
            QueryFailure::Engine(_) => ErrorKind::QueryExecution,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    QueryFailed(#[from] QueryFailedError),

    #[error("Transaction already active")]
    TransactionAlreadyActive,

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Connection handle already released")]
    HandleAlreadyReleased,

    #[error("Engine dependency unavailable: {engine} (available: {})", .available.join(", "))]
    DependencyUnavailable {
        engine: String,
        available: Vec<String>,
    },

    #[error("Failed to open {engine} engine: {source}")]
    ConnectionFailed {
        engine: String,
        #[source]
        source: EngineError,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::QueryFailed(failed) => failed.kind(),
            Error::TransactionAlreadyActive => ErrorKind::TransactionAlreadyActive,
            Error::NoActiveTransaction => ErrorKind::NoActiveTransaction,
            Error::HandleAlreadyReleased => ErrorKind::HandleAlreadyReleased,
            Error::DependencyUnavailable { .. } => ErrorKind::DependencyUnavailable,
            Error::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
        }
    }

    /// Statement context of a query failure
    pub fn query_failure(&self) -> Option<&QueryFailedError> {
        match self {
            Error::QueryFailed(failed) => Some(failed),
            _ => None,
        }
    }

    pub(crate) fn query_failed(query: &str, parameters: &[Value], cause: impl Into<QueryFailure>) -> Self {
        Error::QueryFailed(QueryFailedError::new(query, parameters, cause.into()))
    }
}

pub(crate) fn display_parameters(parameters: &[Value]) -> String {
    let items: Vec<String> = parameters.iter().map(ToString::to_string).collect();
    items.join(", ")
}
