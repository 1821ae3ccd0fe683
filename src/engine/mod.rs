//! Rule evaluation engine: rules, chains, transactions, interventions.

mod intervention;
mod message;
mod phase;
mod properties;
pub mod rule;
pub mod ruleset;
mod transaction;

pub use intervention::Intervention;
pub use message::RuleMessage;
pub use phase::Phase;
pub use properties::ActionSet;
pub use ruleset::{RuleEngineMode, RuleSet};
pub use transaction::Transaction;

use crate::error::Result;
use std::sync::Arc;

/// A frozen rule set ready to process transactions.
///
/// Construction is the freeze point: the set is validated, wrapped in an
/// `Arc`, and from here on only read. Any number of threads may evaluate
/// transactions against the same engine concurrently.
pub struct Engine {
    ruleset: Arc<RuleSet>,
    /// Status code for deny actions that do not name one.
    default_status: u16,
}

impl Engine {
    /// Freeze a rule set into an engine.
    ///
    /// Fails when the set is structurally incomplete (an open chain).
    pub fn new(ruleset: RuleSet) -> Result<Self> {
        ruleset.validate()?;
        Ok(Self {
            ruleset: Arc::new(ruleset),
            default_status: 403,
        })
    }

    /// Set the status code used by `deny` actions without an explicit one.
    pub fn set_default_status(&mut self, status: u16) {
        self.default_status = status;
    }

    /// Create a transaction for one request/response exchange.
    pub fn new_transaction(&self) -> Transaction {
        Transaction::with_default_status(self.ruleset.mode(), self.default_status)
    }

    /// The frozen rule set.
    pub fn ruleset(&self) -> &RuleSet {
        &self.ruleset
    }

    /// Total number of rules, chain links included.
    pub fn rule_count(&self) -> usize {
        self.ruleset.rule_count()
    }

    /// Run every phase in order against the transaction.
    pub fn evaluate(&self, tx: &mut Transaction) {
        self.ruleset.evaluate(tx);
    }

    /// Run one phase against the transaction.
    pub fn evaluate_phase(&self, tx: &mut Transaction, phase: Phase) {
        self.ruleset.evaluate_phase(tx, phase);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("rule_count", &self.ruleset.rule_count())
            .field("mode", &self.ruleset.mode())
            .field("default_status", &self.default_status)
            .finish()
    }
}
