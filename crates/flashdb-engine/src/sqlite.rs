//! SQLite engine (bundled, in-memory)

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use tracing::debug;

use flashdb_sql::{CompiledStatement, StatementKind};
use flashdb_types::Value;

use crate::{text_or_blob, Engine, EngineError, EngineFactory, RowCursor};

pub struct SqliteEngine {
    conn: Connection,
}

impl SqliteEngine {
    /// Fresh in-memory database with foreign-key enforcement on
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        debug!(sqlite_version = rusqlite::version(), "opened in-memory sqlite database");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Underlying connection, for setup and introspection in tests
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Engine for SqliteEngine {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn run(
        &mut self,
        statement: &CompiledStatement,
        cursor: &mut RowCursor,
    ) -> Result<u64, EngineError> {
        let mut stmt = self.conn.prepare(statement.sql())?;

        let column_count = stmt.column_count();
        if statement.returns_rows() {
            let columns = stmt.column_names().into_iter().map(String::from).collect();
            cursor.set_columns(columns);
        }

        let mut rows = stmt.query(params_from_iter(statement.parameters().iter().map(Bind)))?;
        let mut returned = 0u64;

        // Statements that return nothing are still stepped to completion
        while let Some(row) = rows.next()? {
            if !statement.returns_rows() {
                continue;
            }
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(from_sqlite(row.get_ref(i)?));
            }
            cursor.push(values)?;
            returned += 1;
        }
        drop(rows);

        let changes = match statement.kind() {
            // RETURNING yields one row per changed row
            StatementKind::Mutation if statement.returns_rows() => returned,
            StatementKind::Mutation => self.conn.changes() as u64,
            _ => 0,
        };
        Ok(changes)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), EngineError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn in_transaction(&self) -> Option<bool> {
        Some(!self.conn.is_autocommit())
    }

    fn foreign_keys_directive(&self, enabled: bool) -> Option<&'static str> {
        Some(if enabled {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        })
    }

    fn foreign_keys_enabled(&mut self) -> Result<bool, EngineError> {
        let enabled: i64 = self
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        Ok(enabled != 0)
    }

    fn close(self: Box<Self>) -> Result<(), EngineError> {
        let SqliteEngine { conn } = *self;
        conn.close().map_err(|(_, e)| EngineError::Sqlite(e))
    }
}

/// Opens a new in-memory SQLite engine per connection
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteFactory;

impl EngineFactory for SqliteFactory {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn open(&self) -> Result<Box<dyn Engine>, EngineError> {
        Ok(Box::new(SqliteEngine::open_in_memory()?))
    }
}

/// Binds a [`Value`] without copying text or blob bytes
struct Bind<'a>(&'a Value);

impl ToSql for Bind<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => text_or_blob(t),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}
