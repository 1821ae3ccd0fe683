//! Data actions (setvar, capture, setuid, setsid, setenv).

use crate::engine::Transaction;
use crate::runtime_string::{RuleInfo, RuntimeString};
use crate::variables::MutableCollection;

/// Data actions.
#[derive(Debug, Clone)]
pub enum DataAction {
    /// Set, adjust, or delete a TX variable.
    SetVar(SetVar),
    /// Commit the matcher's capture groups to TX.0 through TX.9.
    Capture,
    /// Attach a user identity to the transaction.
    SetUid(RuntimeString),
    /// Attach a session identity to the transaction.
    SetSid(RuntimeString),
    /// Record an environment value on the transaction.
    SetEnv {
        /// Environment key.
        name: String,
        /// Value, expanded at evaluation time.
        value: RuntimeString,
    },
}

/// The operation a setvar performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetVarOp {
    /// Assign the value.
    Set,
    /// Add the value to the current number.
    Increment,
    /// Subtract the value from the current number.
    Decrement,
    /// Remove the variable.
    Delete,
}

/// A deferred variable update, `setvar:tx.key=value` and friends.
///
/// Both key and value may contain macros; they expand against the
/// transaction at execution time. A missing value stands for `1`.
#[derive(Debug, Clone)]
pub struct SetVar {
    op: SetVarOp,
    key: RuntimeString,
    value: Option<RuntimeString>,
}

impl SetVar {
    /// `setvar:tx.key=value`
    pub fn set(key: RuntimeString, value: RuntimeString) -> Self {
        Self {
            op: SetVarOp::Set,
            key,
            value: Some(value),
        }
    }

    /// `setvar:tx.key` (assigns "1")
    pub fn set_default(key: RuntimeString) -> Self {
        Self {
            op: SetVarOp::Set,
            key,
            value: None,
        }
    }

    /// `setvar:tx.key=+amount`
    pub fn increment(key: RuntimeString, amount: Option<RuntimeString>) -> Self {
        Self {
            op: SetVarOp::Increment,
            key,
            value: amount,
        }
    }

    /// `setvar:tx.key=-amount`
    pub fn decrement(key: RuntimeString, amount: Option<RuntimeString>) -> Self {
        Self {
            op: SetVarOp::Decrement,
            key,
            value: amount,
        }
    }

    /// `setvar:!tx.key`
    pub fn delete(key: RuntimeString) -> Self {
        Self {
            op: SetVarOp::Delete,
            key,
            value: None,
        }
    }

    /// The operation performed.
    pub fn op(&self) -> SetVarOp {
        self.op
    }

    pub(crate) fn is_deferred(&self) -> bool {
        self.key.is_deferred() || self.value.as_ref().is_some_and(|v| v.is_deferred())
    }

    pub(crate) fn populate(&mut self, owner: Option<&RuleInfo>) {
        self.key.populate(owner);
        if let Some(value) = &mut self.value {
            value.populate(owner);
        }
    }

    /// Apply the update to the transaction's TX collection.
    pub fn execute(&self, tx: &mut Transaction) {
        let key = self.key.resolve(tx);
        match self.op {
            SetVarOp::Set => {
                let value = self
                    .value
                    .as_ref()
                    .map(|v| v.resolve(tx))
                    .unwrap_or_else(|| "1".to_string());
                tx.tx_mut().set(key, value);
            }
            SetVarOp::Increment => {
                let amount = self.resolve_amount(tx);
                tx.tx_mut().increment(&key, amount);
            }
            SetVarOp::Decrement => {
                let amount = self.resolve_amount(tx);
                tx.tx_mut().decrement(&key, amount);
            }
            SetVarOp::Delete => {
                tx.tx_mut().delete(&key);
            }
        }
    }

    /// Amount for increment and decrement; non-numeric or missing means 1.
    fn resolve_amount(&self, tx: &Transaction) -> i64 {
        self.value
            .as_ref()
            .map(|v| v.resolve(tx))
            .and_then(|s| s.parse().ok())
            .unwrap_or(1)
    }
}
