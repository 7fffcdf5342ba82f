//! DuckDB engine (feature `duckdb`)

use duckdb::types::{ToSqlOutput, Value as DuckValue, ValueRef};
use duckdb::{params_from_iter, Connection, ToSql};
use tracing::debug;

use flashdb_sql::{CompiledStatement, Dialect};
use flashdb_types::Value;

use crate::{text_or_blob, Engine, EngineError, EngineFactory, RowCursor};

impl From<duckdb::Error> for EngineError {
    fn from(e: duckdb::Error) -> Self {
        EngineError::Driver {
            engine: "duckdb",
            source: Box::new(e),
        }
    }
}

pub struct DuckDbEngine {
    conn: Connection,
}

impl DuckDbEngine {
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        debug!("opened in-memory duckdb database");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Engine for DuckDbEngine {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn run(
        &mut self,
        statement: &CompiledStatement,
        cursor: &mut RowCursor,
    ) -> Result<u64, EngineError> {
        let mut stmt = self.conn.prepare(statement.sql())?;
        let params = params_from_iter(statement.parameters().iter().map(Bind));

        // DuckDB reports the change count through execute() only
        if statement.kind().is_mutation() && !statement.returns_rows() {
            let changes = stmt.execute(params)?;
            return Ok(changes as u64);
        }

        let mut rows = stmt.query(params)?;
        let mut returned = 0u64;

        while let Some(row) = rows.next()? {
            if !statement.returns_rows() {
                continue;
            }

            // Column names are only known once the statement has run
            let column_count = row.as_ref().column_count();
            if returned == 0 {
                let mut columns = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    columns.push(row.as_ref().column_name(i)?.to_string());
                }
                cursor.set_columns(columns);
            }

            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = row.get_ref(i)?;
                let converted = from_duckdb(&value).ok_or_else(|| EngineError::UnsupportedType {
                    engine: "duckdb",
                    column: row
                        .as_ref()
                        .column_name(i)
                        .map_or_else(|_| i.to_string(), |name| name.to_string()),
                    type_name: format!("{:?}", value.data_type()),
                })?;
                values.push(converted);
            }
            cursor.push(values)?;
            returned += 1;
        }

        Ok(if statement.kind().is_mutation() { returned } else { 0 })
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), EngineError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn in_transaction(&self) -> Option<bool> {
        None
    }

    /// DuckDB always enforces foreign keys
    fn foreign_keys_directive(&self, _enabled: bool) -> Option<&'static str> {
        None
    }

    fn foreign_keys_enabled(&mut self) -> Result<bool, EngineError> {
        Ok(true)
    }

    fn close(self: Box<Self>) -> Result<(), EngineError> {
        let DuckDbEngine { conn } = *self;
        conn.close().map_err(|(_, e)| EngineError::from(e))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbFactory;

impl EngineFactory for DuckDbFactory {
    fn name(&self) -> &str {
        "duckdb"
    }

    fn open(&self) -> Result<Box<dyn Engine>, EngineError> {
        Ok(Box::new(DuckDbEngine::open_in_memory()?))
    }
}

struct Bind<'a>(&'a Value);

impl ToSql for Bind<'_> {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(match self.0 {
            Value::Null => DuckValue::Null,
            Value::Integer(i) => DuckValue::BigInt(*i),
            Value::Real(f) => DuckValue::Double(*f),
            Value::Text(s) => DuckValue::Text(s.clone()),
            Value::Blob(b) => DuckValue::Blob(b.clone()),
        }))
    }
}

/// `None` for types FlashDB values cannot hold without loss (dates, lists,
/// structs and the like), which the caller reports instead of guessing
fn from_duckdb(value: &ValueRef<'_>) -> Option<Value> {
    let value = match *value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::from(b),
        ValueRef::TinyInt(i) => Value::from(i),
        ValueRef::SmallInt(i) => Value::from(i),
        ValueRef::Int(i) => Value::from(i),
        ValueRef::BigInt(i) => Value::Integer(i),
        ValueRef::UTinyInt(i) => Value::from(i),
        ValueRef::USmallInt(i) => Value::from(i),
        ValueRef::UInt(i) => Value::from(i),
        ValueRef::UBigInt(i) => i64::try_from(i).map_or_else(|_| Value::Text(i.to_string()), Value::Integer),
        ValueRef::HugeInt(i) => i64::try_from(i).map_or_else(|_| Value::Text(i.to_string()), Value::Integer),
        ValueRef::Float(f) => Value::from(f),
        ValueRef::Double(f) => Value::Real(f),
        ValueRef::Text(s) => text_or_blob(s),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        ValueRef::Decimal(d) => Value::Text(d.to_string()),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashdb_types::params;

    fn run(engine: &mut DuckDbEngine, sql: &str, params: &[Value]) -> Result<Vec<flashdb_types::Row>, EngineError> {
        let statement = engine.dialect().compile(sql, params).unwrap();
        let mut cursor = RowCursor::default();
        engine.run(&statement, &mut cursor)?;
        Ok(cursor.into_rows())
    }

    #[test]
    fn test_list_literal_binds_its_placeholders() {
        let mut engine = DuckDbEngine::open_in_memory().unwrap();
        let rows = run(&mut engine, "SELECT len([?, ?, ?]) AS n", &params![1, 2, 3]).unwrap();
        assert_eq!(rows[0].get("n"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_decimal_keeps_its_digits() {
        let mut engine = DuckDbEngine::open_in_memory().unwrap();
        let rows = run(&mut engine, "SELECT 12.50::DECIMAL(6, 2) AS d", &[]).unwrap();
        assert_eq!(rows[0].get("d"), Some(&Value::Text("12.50".into())));
    }

    #[test]
    fn test_wide_integers_keep_their_digits() {
        let mut engine = DuckDbEngine::open_in_memory().unwrap();
        let rows = run(&mut engine, "SELECT 18446744073709551615::UBIGINT AS big", &[]).unwrap();
        assert_eq!(rows[0].get("big"), Some(&Value::Text("18446744073709551615".into())));
    }

    #[test]
    fn test_unrepresentable_type_is_an_error() {
        let mut engine = DuckDbEngine::open_in_memory().unwrap();
        let err = run(&mut engine, "SELECT DATE '2024-01-31' AS day", &[]).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedType { ref column, .. } if column == "day"));

        let rows = run(&mut engine, "SELECT CAST(DATE '2024-01-31' AS VARCHAR) AS day", &[]).unwrap();
        assert_eq!(rows[0].get("day"), Some(&Value::Text("2024-01-31".into())));
    }
}
