//! Connection handle

use std::sync::Arc;
use std::time::{Duration, Instant};

use flashdb_engine::Engine;
use flashdb_sql::{CompiledStatement, StatementKind, TransactionVerb};
use flashdb_types::{QueryOutput, QueryResult, Row, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::executor::QueryExecutor;
use crate::logger::QueryLogger;
use crate::options::ConnectionOptions;
use crate::transaction::{TransactionManager, TransactionState};

/// Statement context used to report a failed transaction-control statement
type Context<'a> = Option<(&'a str, &'a [Value])>;

/// One session on an engine.
///
/// A handle is driven by one caller at a time. Once [`release`](Self::release)d
/// every operation fails with `HandleAlreadyReleased`.
pub struct Connection {
    executor: QueryExecutor,
    transactions: TransactionManager,
    logger: Arc<dyn QueryLogger>,
    max_query_execution_time: Option<Duration>,
    released: bool,
}

impl Connection {
    pub(crate) fn new(engine: Box<dyn Engine>, options: &ConnectionOptions) -> Self {
        Self {
            executor: QueryExecutor::new(engine, options.max_rows),
            transactions: TransactionManager::new(options.nested_transactions),
            logger: Arc::clone(&options.logger),
            max_query_execution_time: options.max_query_execution_time,
            released: false,
        }
    }

    /// Execute one SQL statement with positional parameters.
    ///
    /// Returns the rows, or with `structured` the rows together with the
    /// number of rows the statement changed. Transaction-control statements
    /// (`BEGIN`, `COMMIT`, `ROLLBACK`, ...) go through the transaction manager.
    pub fn execute(&mut self, sql: &str, parameters: &[Value], structured: bool) -> Result<QueryOutput> {
        self.ensure_open()?;
        self.executor.reset_affected();

        let rows = self.observed(sql, parameters, |conn| conn.dispatch(sql, parameters))?;

        Ok(if structured {
            QueryOutput::Structured(QueryResult::new(rows, self.executor.affected()))
        } else {
            QueryOutput::Rows(rows)
        })
    }

    pub fn query(&mut self, sql: &str, parameters: &[Value]) -> Result<Vec<Row>> {
        self.execute(sql, parameters, false).map(QueryOutput::into_rows)
    }

    pub fn query_structured(&mut self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        let output = self.execute(sql, parameters, true)?;
        Ok(output.into_structured().unwrap_or_default())
    }

    /// Execute a `;`-separated script without parameters, statement by
    /// statement. Stops at the first failure and returns the total change count.
    pub fn execute_batch(&mut self, script: &str) -> Result<u64> {
        self.ensure_open()?;
        let statements = self
            .executor
            .engine()
            .dialect()
            .split(script)
            .map_err(|e| Error::query_failed(script, &[], e))?;

        let mut affected = 0;
        for statement in statements {
            self.execute(statement, &[], false)?;
            affected += self.executor.affected();
        }
        Ok(affected)
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.observed("BEGIN", &[], |conn| conn.begin_inner("BEGIN", None))
    }

    pub fn commit_transaction(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.observed("COMMIT", &[], |conn| conn.commit_inner("COMMIT", None))
    }

    pub fn rollback_transaction(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.observed("ROLLBACK", &[], |conn| conn.rollback_inner("ROLLBACK", None))
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transactions.state()
    }

    pub fn is_transaction_active(&self) -> bool {
        self.transactions.is_active()
    }

    /// Rows changed by the last statement; 0 unless it was a mutation
    pub fn affected_rows(&self) -> u64 {
        self.executor.affected()
    }

    pub fn engine_name(&self) -> &'static str {
        self.executor.engine().name()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Give the handle back. An open transaction is rolled back first.
    pub fn release(&mut self) -> Result<()> {
        self.ensure_open()?;

        let rolled_back = {
            let executor = &mut self.executor;
            self.transactions
                .rollback_all(|sql| run_directive(executor, sql, None))
        };
        self.released = true;
        rolled_back?;

        debug!(engine = self.engine_name(), "connection released");
        Ok(())
    }

    /// Release if needed and close the engine
    pub fn close(mut self) -> Result<()> {
        if !self.released {
            self.release()?;
        }
        let engine = self.engine_name().to_string();
        self.executor
            .into_engine()
            .close()
            .map_err(|source| Error::ConnectionFailed { engine, source })?;
        info!("connection closed");
        Ok(())
    }

    pub fn disconnect(self) -> Result<()> {
        self.close()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.released {
            return Err(Error::HandleAlreadyReleased);
        }
        Ok(())
    }

    pub(crate) fn engine_mut(&mut self) -> &mut dyn Engine {
        self.executor.engine_mut()
    }

    fn dispatch(&mut self, sql: &str, parameters: &[Value]) -> Result<Vec<Row>> {
        let statement = self
            .executor
            .engine()
            .dialect()
            .compile(sql, parameters)
            .map_err(|e| Error::query_failed(sql, parameters, e))?;

        match statement.kind() {
            StatementKind::Transaction(verb) => {
                self.transaction_statement(verb, &statement, Some((sql, parameters)))?;
                Ok(Vec::new())
            }
            _ => self
                .executor
                .run(&statement)
                .map_err(|e| Error::query_failed(sql, parameters, e)),
        }
    }

    fn transaction_statement(
        &mut self,
        verb: TransactionVerb,
        statement: &CompiledStatement,
        context: Context<'_>,
    ) -> Result<()> {
        match verb {
            TransactionVerb::Begin => self.begin_inner(statement.sql(), context),
            TransactionVerb::Commit => self.commit_inner(statement.sql(), context),
            TransactionVerb::Rollback => self.rollback_inner(statement.sql(), context),
            TransactionVerb::Savepoint | TransactionVerb::Release | TransactionVerb::RollbackTo => {
                if !self.transactions.is_active() {
                    return Err(Error::NoActiveTransaction);
                }
                run_directive(&mut self.executor, statement.sql(), context)
            }
        }
    }

    fn begin_inner(&mut self, outer: &str, context: Context<'_>) -> Result<()> {
        let executor = &mut self.executor;
        self.transactions
            .begin(outer, |sql| run_directive(executor, sql, context))
    }

    fn commit_inner(&mut self, outer: &str, context: Context<'_>) -> Result<()> {
        let executor = &mut self.executor;
        self.transactions
            .commit(outer, |sql| run_directive(executor, sql, context))
    }

    fn rollback_inner(&mut self, outer: &str, context: Context<'_>) -> Result<()> {
        let executor = &mut self.executor;
        self.transactions
            .rollback(outer, |sql| run_directive(executor, sql, context))
    }

    /// Time `op` and report it to the logger
    fn observed<T, F>(&mut self, sql: &str, parameters: &[Value], op: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let started = Instant::now();
        let result = op(self);
        let duration = started.elapsed();

        self.logger.log_query(sql, parameters, duration);
        if let Some(threshold) = self.max_query_execution_time {
            if duration > threshold {
                self.logger.log_query_slow(duration, sql, parameters);
            }
        }

        if let Err(error) = &result {
            self.logger.log_query_error(error, sql, parameters);
            if matches!(error, Error::QueryFailed(_)) {
                self.transactions
                    .reconcile(self.executor.engine().in_transaction());
            }
        }
        result
    }
}

/// Run a control statement, reporting failures against the caller's
/// statement when there is one
fn run_directive(executor: &mut QueryExecutor, directive: &str, context: Context<'_>) -> Result<()> {
    executor.run_directive(directive).map_err(|e| {
        let (query, parameters) = match context {
            Some(context) => context,
            None => (directive, &[][..]),
        };
        Error::query_failed(query, parameters, e)
    })
}
