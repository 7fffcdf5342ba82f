//! Mutation tracker: rows changed by the most recent statement

use flashdb_sql::StatementKind;

#[derive(Debug, Default)]
pub struct MutationTracker {
    last: u64,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a statement starts, so a failure leaves 0 behind
    pub fn reset(&mut self) {
        self.last = 0;
    }

    /// Overwrite with the finished statement's count. Only mutations count.
    pub fn record(&mut self, kind: StatementKind, changes: u64) {
        self.last = if kind.is_mutation() { changes } else { 0 };
    }

    pub fn affected(&self) -> u64 {
        self.last
    }
}
