use std::sync::{Arc, Mutex};
use std::time::Duration;

use flashdb::{
    connect, disconnect, params, ConnectionOptions, Error, ErrorKind, NestingPolicy, QueryFailure,
    QueryLogger, QueryOutput, TransactionState, Value,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Query(String),
    Error(ErrorKind, String),
    Slow(String),
}

#[derive(Default)]
struct RecordingLogger {
    events: Mutex<Vec<Event>>,
}

impl RecordingLogger {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl QueryLogger for RecordingLogger {
    fn log_query(&self, query: &str, _parameters: &[Value], _duration: Duration) {
        self.events.lock().unwrap().push(Event::Query(query.to_string()));
    }

    fn log_query_error(&self, error: &Error, query: &str, _parameters: &[Value]) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Error(error.kind(), format!("{}: {}", query, error)));
    }

    fn log_query_slow(&self, _duration: Duration, query: &str, _parameters: &[Value]) {
        self.events.lock().unwrap().push(Event::Slow(query.to_string()));
    }
}

fn open() -> flashdb::Connection {
    let mut conn = connect(ConnectionOptions::new()).unwrap();
    conn.execute("CREATE TABLE t (x INTEGER)", &[], false).unwrap();
    conn
}

fn values(conn: &mut flashdb::Connection) -> Vec<i64> {
    conn.query("SELECT x FROM t ORDER BY x", &[])
        .unwrap()
        .iter()
        .filter_map(|row| row.get("x").and_then(Value::as_i64))
        .collect()
}

#[test]
fn test_insert_then_select_structured() {
    let mut conn = open();

    let output = conn
        .execute("INSERT INTO t(x) VALUES (?)", &params![5], true)
        .unwrap();
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json, serde_json::json!({"affected": 1, "records": [], "raw": []}));

    let output = conn.execute("SELECT x FROM t", &[], true).unwrap();
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"affected": 0, "records": [{"x": 5}], "raw": [{"x": 5}]})
    );

    let output = conn.execute("SELECT x FROM t", &[], false).unwrap();
    assert!(matches!(output, QueryOutput::Rows(ref rows) if rows.len() == 1));
}

#[test]
fn test_rollback_leaves_values_unchanged() {
    let mut conn = open();
    conn.execute("INSERT INTO t VALUES (3), (4)", &[], false).unwrap();

    conn.begin_transaction().unwrap();
    conn.execute("UPDATE t SET x = 1", &[], false).unwrap();
    assert_eq!(conn.affected_rows(), 2);
    conn.rollback_transaction().unwrap();

    assert_eq!(values(&mut conn), vec![3, 4]);
    assert_eq!(conn.transaction_state(), TransactionState::RolledBack);
}

#[test]
fn test_commit_makes_changes_visible() {
    let mut conn = open();
    conn.begin_transaction().unwrap();
    conn.execute("INSERT INTO t VALUES (?)", &params![9], false).unwrap();
    conn.commit_transaction().unwrap();

    assert_eq!(values(&mut conn), vec![9]);
    assert_eq!(conn.transaction_state(), TransactionState::Committed);

    // a finished transaction allows a new one
    conn.begin_transaction().unwrap();
    conn.commit_transaction().unwrap();
}

#[test]
fn test_missing_table() {
    let mut conn = open();
    let err = conn
        .execute("SELECT * FROM missing_table", &[], false)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueryExecution);
    let failed = err.query_failure().unwrap();
    assert_eq!(failed.query, "SELECT * FROM missing_table");
    assert!(matches!(failed.cause, QueryFailure::Engine(_)));
    assert!(err.to_string().contains("no such table"));
}

#[test]
fn test_parameter_mismatch_has_no_effect() {
    let mut conn = open();
    conn.execute("INSERT INTO t VALUES (1)", &[], false).unwrap();

    let err = conn
        .execute("INSERT INTO t VALUES (?, ?)", &params![1], false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParameterMismatch);
    assert_eq!(conn.affected_rows(), 0);
    assert_eq!(values(&mut conn), vec![1]);

    let err = conn.execute("SELECT 1", &params![1], false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParameterMismatch);
}

#[test]
fn test_syntax_error() {
    let mut conn = open();
    let err = conn.execute("SELECT 'oops", &[], false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);

    let err = conn.execute("SELECT 1; SELECT 2", &[], false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[test]
fn test_select_reports_zero_affected() {
    let mut conn = open();
    conn.execute("INSERT INTO t VALUES (1)", &[], false).unwrap();
    assert_eq!(conn.affected_rows(), 1);

    conn.query("SELECT x FROM t", &[]).unwrap();
    assert_eq!(conn.affected_rows(), 0);
}

#[test]
fn test_schema_after_mutation_reports_zero() {
    let mut conn = open();
    conn.execute("INSERT INTO t VALUES (1), (2)", &[], false).unwrap();

    let result = conn
        .query_structured("CREATE TABLE u (y INTEGER)", &[])
        .unwrap();
    assert_eq!(result.affected, 0);
}

#[test]
fn test_returning_rows() {
    let mut conn = open();
    let result = conn
        .query_structured("INSERT INTO t VALUES (?), (?) RETURNING x", &params![1, 2])
        .unwrap();
    assert_eq!(result.affected, 2);
    assert_eq!(result.records.len(), 2);
}

#[test]
fn test_release_blocks_further_use() {
    let mut conn = open();
    conn.release().unwrap();

    let err = conn.execute("SELECT 1", &[], false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandleAlreadyReleased);
    let err = conn.begin_transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandleAlreadyReleased);
    let err = conn.release().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandleAlreadyReleased);
}

#[test]
fn test_nested_begin_rejected_by_default() {
    let mut conn = open();
    conn.begin_transaction().unwrap();
    let err = conn.begin_transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionAlreadyActive);
    assert!(conn.is_transaction_active());

    let mut conn = open();
    let err = conn.commit_transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveTransaction);
}

#[test]
fn test_savepoint_nesting() {
    let options = ConnectionOptions::new().with_nested_transactions(NestingPolicy::Savepoint);
    let mut conn = connect(options).unwrap();
    conn.execute("CREATE TABLE t (x INTEGER)", &[], false).unwrap();

    conn.begin_transaction().unwrap();
    conn.execute("INSERT INTO t VALUES (1)", &[], false).unwrap();

    conn.begin_transaction().unwrap();
    conn.execute("INSERT INTO t VALUES (2)", &[], false).unwrap();
    conn.rollback_transaction().unwrap();
    assert!(conn.is_transaction_active());

    conn.begin_transaction().unwrap();
    conn.execute("INSERT INTO t VALUES (3)", &[], false).unwrap();
    conn.commit_transaction().unwrap();

    conn.commit_transaction().unwrap();
    assert_eq!(values(&mut conn), vec![1, 3]);
}

#[test]
fn test_row_limit() {
    let mut conn = connect(ConnectionOptions::new().with_max_rows(2)).unwrap();
    conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2), (3);")
        .unwrap();

    let err = conn.query("SELECT x FROM t", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryExecution);
    assert_eq!(conn.query("SELECT x FROM t LIMIT 2", &[]).unwrap().len(), 2);
}

#[test]
fn test_execute_batch_stops_at_failure() {
    let mut conn = open();
    let err = conn
        .execute_batch("INSERT INTO t VALUES (1); INSERT INTO nope VALUES (2); INSERT INTO t VALUES (3);")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryExecution);
    assert_eq!(values(&mut conn), vec![1]);
}

#[test]
fn test_disconnect_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flash.db");

    let factory = Arc::new(FileFactory(path.clone()));
    let options = ConnectionOptions::new().with_engine_factory(factory.clone());

    let mut conn = connect(options.clone()).unwrap();
    conn.execute("CREATE TABLE t (x INTEGER)", &[], false).unwrap();
    conn.begin_transaction().unwrap();
    conn.execute("INSERT INTO t VALUES (1)", &[], false).unwrap();
    disconnect(conn).unwrap();

    let mut conn = connect(options).unwrap();
    assert!(values(&mut conn).is_empty());
}

#[test]
fn test_unknown_engine() {
    let err = connect(ConnectionOptions::new().with_engine("postgres"))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
}

#[test]
fn test_logger_events() {
    let logger = Arc::new(RecordingLogger::default());
    let options = ConnectionOptions::new()
        .with_logger(logger.clone())
        .with_max_query_execution_time(Duration::from_secs(60));
    let mut conn = connect(options).unwrap();

    conn.execute("SELECT 1", &[], false).unwrap();
    let _ = conn.execute("SELECT * FROM missing_table", &[], false);

    let events = logger.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], Event::Query("SELECT 1".to_string()));
    assert_eq!(events[1], Event::Query("SELECT * FROM missing_table".to_string()));
    assert!(matches!(
        &events[2],
        Event::Error(ErrorKind::QueryExecution, message) if message.contains("no such table")
    ));
}

#[test]
fn test_transaction_state_errors_reach_the_logger() {
    let logger = Arc::new(RecordingLogger::default());
    let options = ConnectionOptions::new()
        .with_logger(logger.clone())
        .with_max_query_execution_time(Duration::from_secs(60));
    let mut conn = connect(options).unwrap();

    let err = conn.execute("COMMIT", &[], false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveTransaction);
    let err = conn.execute("SAVEPOINT a", &[], false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveTransaction);
    conn.execute("BEGIN", &[], false).unwrap();
    let err = conn.execute("BEGIN", &[], false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionAlreadyActive);

    let errors: Vec<_> = logger
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::Error(kind, _) => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        errors,
        vec![
            ErrorKind::NoActiveTransaction,
            ErrorKind::NoActiveTransaction,
            ErrorKind::TransactionAlreadyActive,
        ]
    );
    assert_eq!(logger.events().len(), 7);
    assert!(conn.is_transaction_active());
}

#[test]
fn test_trigger_definition() {
    let mut conn = open();
    conn.execute("CREATE TABLE log (x INTEGER)", &[], false).unwrap();
    conn.execute(
        "CREATE TRIGGER t_log AFTER INSERT ON t BEGIN INSERT INTO log VALUES (new.x); END",
        &[],
        false,
    )
    .unwrap();

    conn.execute("INSERT INTO t VALUES (?)", &params![7], false).unwrap();
    let rows = conn.query("SELECT x FROM log", &[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("x"), Some(&Value::Integer(7)));
}

#[test]
fn test_execute_batch_with_trigger() {
    let mut conn = open();
    let script = "
        CREATE TABLE log (x INTEGER, note TEXT);
        CREATE TRIGGER t_log AFTER INSERT ON t
        BEGIN
            INSERT INTO log VALUES (new.x, 'first');
            INSERT INTO log VALUES (new.x, CASE WHEN new.x > 1 THEN 'big' ELSE 'small' END);
        END;
        INSERT INTO t VALUES (2);
    ";
    assert_eq!(conn.execute_batch(script).unwrap(), 1);
    assert!(!conn.is_transaction_active());

    let notes: Vec<_> = conn
        .query("SELECT note FROM log ORDER BY rowid", &[])
        .unwrap()
        .iter()
        .filter_map(|row| row.get("note").and_then(Value::as_str).map(str::to_string))
        .collect();
    assert_eq!(notes, vec!["first", "big"]);
}

#[test]
fn test_slow_query_signal() {
    let logger = Arc::new(RecordingLogger::default());
    let options = ConnectionOptions::new()
        .with_logger(logger.clone())
        .with_max_query_execution_time(Duration::ZERO);
    let mut conn = connect(options).unwrap();

    let sql = "WITH RECURSIVE c(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM c WHERE n < 10000) SELECT count(*) AS total FROM c";
    let rows = conn.query(sql, &[]).unwrap();
    assert_eq!(rows[0].get("total"), Some(&Value::Integer(10000)));

    assert!(logger.events().contains(&Event::Slow(sql.to_string())));
}

#[test]
fn test_failed_savepoint_statement_keeps_transaction() {
    let mut conn = open();
    conn.execute("INSERT INTO t VALUES (1)", &[], false).unwrap();
    conn.begin_transaction().unwrap();

    let err = conn.execute("ROLLBACK TO nothing", &[], false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryExecution);
    assert!(conn.is_transaction_active());

    conn.rollback_transaction().unwrap();
    assert!(!conn.is_transaction_active());
}

struct FileFactory(std::path::PathBuf);

impl flashdb::EngineFactory for FileFactory {
    fn name(&self) -> &str {
        "sqlite-file"
    }

    fn open(&self) -> Result<Box<dyn flashdb::Engine>, flashdb::EngineError> {
        let conn = rusqlite::Connection::open(&self.0)?;
        Ok(Box::new(flashdb_engine::SqliteEngine::from_connection(conn)))
    }
}
