//! FlashDB - embeddable SQL execution core
//!
//! A [`Connection`] wraps one embedded engine (SQLite by default, DuckDB with
//! the `duckdb` feature) and runs SQL text with positional parameters:
//!
//! ```
//! use flashdb::{connect, params, ConnectionOptions};
//!
//! let mut conn = connect(ConnectionOptions::new()).unwrap();
//! conn.execute("CREATE TABLE t (x INTEGER)", &[], false).unwrap();
//!
//! let result = conn.query_structured("INSERT INTO t (x) VALUES (?)", &params![5]).unwrap();
//! assert_eq!(result.affected, 1);
//!
//! let rows = conn.query("SELECT x FROM t", &[]).unwrap();
//! assert_eq!(rows[0].get("x").and_then(|v| v.as_i64()), Some(5));
//! ```
//!
//! Statements are compiled per call (placeholder count checked, kind
//! classified), run by the engine through a row cursor, and counted by the
//! mutation tracker. Explicit transactions go through the transaction
//! manager whether they come from the API or from SQL text.

mod connection;
mod driver;
mod error;
mod executor;
mod logger;
mod migration;
mod options;
mod tracker;
mod transaction;

pub use connection::Connection;
pub use driver::{connect, disconnect, Driver};
pub use error::{Error, ErrorKind, QueryFailedError, QueryFailure, Result};
pub use logger::{NoopLogger, QueryLogger, TracingLogger};
pub use migration::ForeignKeyGuard;
pub use options::{ConnectionOptions, EngineSelection, NestingPolicy};
pub use tracker::MutationTracker;
pub use transaction::{TransactionManager, TransactionState};

pub use flashdb_engine::{Engine, EngineError, EngineFactory, EngineRegistry, RowCursor};
pub use flashdb_sql::{CompileError, CompiledStatement, Dialect, StatementKind, TransactionVerb};
pub use flashdb_types::{params, QueryOutput, QueryResult, Row, Value, ValueError};
