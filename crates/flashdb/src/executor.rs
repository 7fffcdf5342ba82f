//! Runs compiled statements on the engine and keeps the mutation count

use flashdb_engine::{Engine, EngineError, RowCursor};
use flashdb_sql::CompiledStatement;
use flashdb_types::Row;
use tracing::trace;

use crate::tracker::MutationTracker;

pub(crate) struct QueryExecutor {
    engine: Box<dyn Engine>,
    tracker: MutationTracker,
    max_rows: Option<u64>,
}

impl QueryExecutor {
    pub fn new(engine: Box<dyn Engine>, max_rows: Option<u64>) -> Self {
        Self {
            engine,
            tracker: MutationTracker::new(),
            max_rows,
        }
    }

    /// Run one statement and collect its rows. A failed statement leaves the
    /// tracker untouched, so callers reset it first.
    pub fn run(&mut self, statement: &CompiledStatement) -> Result<Vec<Row>, EngineError> {
        let mut cursor = RowCursor::new(self.max_rows);
        let changes = self.engine.run(statement, &mut cursor)?;
        self.tracker.record(statement.kind(), changes);

        trace!(
            engine = self.engine.name(),
            kind = statement.kind().name(),
            rows = cursor.row_count(),
            changes,
            "statement finished"
        );
        Ok(cursor.into_rows())
    }

    /// Transaction control and engine directives; they never change rows
    pub fn run_directive(&mut self, sql: &str) -> Result<(), EngineError> {
        self.engine.execute_batch(sql)?;
        self.tracker.reset();
        Ok(())
    }

    pub fn reset_affected(&mut self) {
        self.tracker.reset();
    }

    pub fn affected(&self) -> u64 {
        self.tracker.affected()
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> &mut dyn Engine {
        self.engine.as_mut()
    }

    pub fn into_engine(self) -> Box<dyn Engine> {
        self.engine
    }
}
