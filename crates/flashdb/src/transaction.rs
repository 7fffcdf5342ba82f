//! Transaction manager
//!
//! Tracks whether the handle has an explicit transaction open and issues the
//! control statements through a caller-supplied runner, so the state only
//! moves once the engine accepted the statement. With
//! [`NestingPolicy::Savepoint`] a nested `begin` opens a savepoint instead of
//! failing; the outermost level is always a real transaction.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::options::NestingPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction was ever started on this handle
    #[default]
    None,
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::None => "none",
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled_back",
        }
    }
}

#[derive(Debug)]
pub struct TransactionManager {
    state: TransactionState,
    depth: usize,
    policy: NestingPolicy,
}

fn savepoint_name(level: usize) -> String {
    format!("flashdb_sp_{}", level)
}

impl TransactionManager {
    pub fn new(policy: NestingPolicy) -> Self {
        Self {
            state: TransactionState::None,
            depth: 0,
            policy,
        }
    }

    /// Open a transaction with `outer`, or a savepoint when one is already
    /// open and nesting is allowed
    pub fn begin<F>(&mut self, outer: &str, mut run: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        if self.is_active() {
            if self.policy == NestingPolicy::Reject {
                return Err(Error::TransactionAlreadyActive);
            }
            run(&format!("SAVEPOINT {}", savepoint_name(self.depth)))?;
            self.depth += 1;
            debug!(depth = self.depth, "savepoint opened");
            return Ok(());
        }

        run(outer)?;
        self.state = TransactionState::Active;
        self.depth = 1;
        debug!("transaction started");
        Ok(())
    }

    /// Commit the innermost level. If the engine refuses the outer commit the
    /// transaction stays active.
    pub fn commit<F>(&mut self, outer: &str, mut run: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        if !self.is_active() {
            return Err(Error::NoActiveTransaction);
        }

        if self.depth > 1 {
            run(&format!("RELEASE SAVEPOINT {}", savepoint_name(self.depth - 1)))?;
            self.depth -= 1;
            return Ok(());
        }

        run(outer)?;
        self.finish(TransactionState::Committed);
        debug!("transaction committed");
        Ok(())
    }

    /// Roll back the innermost level
    pub fn rollback<F>(&mut self, outer: &str, mut run: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        if !self.is_active() {
            return Err(Error::NoActiveTransaction);
        }

        if self.depth > 1 {
            let name = savepoint_name(self.depth - 1);
            run(&format!("ROLLBACK TO SAVEPOINT {}", name))?;
            run(&format!("RELEASE SAVEPOINT {}", name))?;
            self.depth -= 1;
            return Ok(());
        }

        run(outer)?;
        self.finish(TransactionState::RolledBack);
        debug!("transaction rolled back");
        Ok(())
    }

    /// Roll back every level at once. No-op without an active transaction.
    pub fn rollback_all<F>(&mut self, mut run: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        if !self.is_active() {
            return Ok(());
        }
        run("ROLLBACK")?;
        self.finish(TransactionState::RolledBack);
        debug!("open transaction rolled back");
        Ok(())
    }

    /// Follow the engine after a failed statement: some errors make the
    /// engine abort the transaction on its own
    pub fn reconcile(&mut self, engine_in_transaction: Option<bool>) {
        if self.is_active() && engine_in_transaction == Some(false) {
            warn!("engine rolled back the active transaction after an error");
            self.finish(TransactionState::RolledBack);
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// 0 outside a transaction, 1 for the outer transaction, +1 per savepoint
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn finish(&mut self, state: TransactionState) {
        self.state = state;
        self.depth = 0;
    }
}
