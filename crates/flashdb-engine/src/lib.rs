//! FlashDB engines
//!
//! The wrapped SQL engines sit behind the [`Engine`] trait: they prepare a
//! compiled statement, bind its parameters, step it and push output rows into
//! a [`RowCursor`]. SQLite is always available; DuckDB is built with the
//! `duckdb` feature. Engines are located by name through the
//! [`EngineRegistry`] or injected directly as an [`EngineFactory`].

mod cursor;
mod registry;
mod sqlite;

#[cfg(feature = "duckdb")]
mod duck;

pub use cursor::RowCursor;
pub use registry::{EngineRegistry, RegistryError};
pub use sqlite::{SqliteEngine, SqliteFactory};

#[cfg(feature = "duckdb")]
pub use duck::{DuckDbEngine, DuckDbFactory};

use flashdb_sql::{CompiledStatement, Dialect};
use flashdb_types::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{engine} error: {source}")]
    Driver {
        engine: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Row limit exceeded: result has more than {0} rows")]
    RowLimitExceeded(u64),

    #[error("Row has {actual} values but the result has {expected} columns")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("{engine} column {column} has type {type_name}, which has no FlashDB value; cast it in the query")]
    UnsupportedType {
        engine: &'static str,
        column: String,
        type_name: String,
    },

    #[error("Unsupported by this engine: {0}")]
    Unsupported(String),
}

/// An embedded SQL engine.
///
/// A handle owns exactly one engine and drives it from a single thread at a
/// time, hence `Send` but not `Sync`.
pub trait Engine: Send {
    /// Registry name of the engine ("sqlite", "duckdb", ...)
    fn name(&self) -> &'static str;

    /// How statement text is scanned before it reaches this engine. Decides
    /// whether `[...]` is a quoted identifier or a list whose placeholders
    /// count as bind slots.
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    /// Run one statement. Output rows are pushed into `cursor` when the
    /// statement returns rows. Returns the engine's change count, which the
    /// caller only trusts for mutations.
    fn run(
        &mut self,
        statement: &CompiledStatement,
        cursor: &mut RowCursor,
    ) -> Result<u64, EngineError>;

    /// Run parameterless SQL text as-is (transaction control, savepoints)
    fn execute_batch(&mut self, sql: &str) -> Result<(), EngineError>;

    /// Whether the engine itself has an open transaction, when it can tell
    fn in_transaction(&self) -> Option<bool>;

    /// SQL that turns foreign-key enforcement on or off, if the engine can toggle it
    fn foreign_keys_directive(&self, enabled: bool) -> Option<&'static str>;

    fn foreign_keys_enabled(&mut self) -> Result<bool, EngineError>;

    fn close(self: Box<Self>) -> Result<(), EngineError>;
}

/// Opens engines. Injected through connection options or found in the registry.
pub trait EngineFactory: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> Result<Box<dyn Engine>, EngineError>;
}

/// Text column bytes as a value. Bytes that are not valid UTF-8 come back
/// untouched as a blob.
pub(crate) fn text_or_blob(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(s) => Value::Text(s.to_string()),
        Err(_) => Value::Blob(bytes.to_vec()),
    }
}
