//! Control actions (ctl:) that tune engine behavior for one transaction.

use crate::engine::Transaction;
use crate::error::{Error, Result};

/// Letters accepted in an audit log parts specification, in display order.
const VALID_PARTS: &str = "ABCDEFGHIJKZ";

/// Control actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    /// `ctl:auditLogParts` adjusts which parts the audit log records.
    AuditLogParts(AuditLogParts),
}

/// A set of audit log parts, one bit per letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditParts(u32);

impl AuditParts {
    /// The stock recording set, ABCFHZ.
    pub const DEFAULT: Self = Self(1 | 1 << 1 | 1 << 2 | 1 << 5 | 1 << 7 | 1 << 25);

    /// An empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Parse a letter specification like "ABCFHZ".
    pub fn from_letters(letters: &str) -> Result<Self> {
        if letters.is_empty() {
            return Err(Error::InvalidActionArgument {
                action: "ctl:auditLogParts".to_string(),
                message: "missing audit log parts".to_string(),
            });
        }
        let mut bits = 0u32;
        for c in letters.chars() {
            if !VALID_PARTS.contains(c) {
                return Err(Error::InvalidActionArgument {
                    action: "ctl:auditLogParts".to_string(),
                    message: format!("invalid audit log part '{c}'"),
                });
            }
            bits |= 1 << (c as u8 - b'A');
        }
        Ok(Self(bits))
    }

    /// Union with another set.
    pub fn add(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Remove another set's letters.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Whether a letter is in the set.
    pub fn contains(&self, part: char) -> bool {
        VALID_PARTS.contains(part) && self.0 & (1 << (part as u8 - b'A')) != 0
    }

    /// The letters in the set, in canonical order.
    pub fn letters(&self) -> String {
        VALID_PARTS.chars().filter(|&c| self.contains(c)).collect()
    }
}

impl Default for AuditParts {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How a parts specification combines with the transaction's current set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartsMode {
    /// `+LETTERS` adds to the set.
    Add,
    /// `-LETTERS` removes from the set.
    Remove,
    /// Bare letters replace the set.
    Assign,
}

/// Parsed `ctl:auditLogParts=<spec>` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogParts {
    mode: PartsMode,
    parts: AuditParts,
}

impl AuditLogParts {
    /// Parse a specification, `+IJ`, `-E`, or a full replacement set.
    pub fn new(spec: &str) -> Result<Self> {
        let (mode, letters) = match spec.as_bytes().first() {
            Some(b'+') => (PartsMode::Add, &spec[1..]),
            Some(b'-') => (PartsMode::Remove, &spec[1..]),
            _ => (PartsMode::Assign, spec),
        };
        Ok(Self {
            mode,
            parts: AuditParts::from_letters(letters)?,
        })
    }

    /// How the specification combines with the existing set.
    pub fn mode(&self) -> PartsMode {
        self.mode
    }

    /// Apply the adjustment to the transaction.
    pub fn execute(&self, tx: &mut Transaction) {
        match self.mode {
            PartsMode::Add => tx.audit_parts_mut().add(self.parts),
            PartsMode::Remove => tx.audit_parts_mut().remove(self.parts),
            PartsMode::Assign => *tx.audit_parts_mut() = self.parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ruleset::RuleEngineMode;

    #[test]
    fn test_default_parts() {
        let parts = AuditParts::default();
        assert_eq!(parts.letters(), "ABCFHZ");
        assert!(parts.contains('A'));
        assert!(!parts.contains('E'));
    }

    #[test]
    fn test_from_letters_rejects_unknown() {
        assert!(AuditParts::from_letters("ABX").is_err());
        assert!(AuditParts::from_letters("").is_err());
        assert!(AuditParts::from_letters("abc").is_err());
    }

    #[test]
    fn test_spec_modes() {
        assert_eq!(AuditLogParts::new("+IJ").unwrap().mode(), PartsMode::Add);
        assert_eq!(AuditLogParts::new("-E").unwrap().mode(), PartsMode::Remove);
        assert_eq!(AuditLogParts::new("ABZ").unwrap().mode(), PartsMode::Assign);
        assert!(AuditLogParts::new("+").is_err());
    }

    #[test]
    fn test_execute_adjusts_transaction() {
        let mut tx = Transaction::new(RuleEngineMode::On);
        assert_eq!(tx.audit_parts().letters(), "ABCFHZ");

        AuditLogParts::new("+IJ").unwrap().execute(&mut tx);
        assert_eq!(tx.audit_parts().letters(), "ABCFHIJZ");

        AuditLogParts::new("-BC").unwrap().execute(&mut tx);
        assert_eq!(tx.audit_parts().letters(), "AFHIJZ");

        AuditLogParts::new("AZ").unwrap().execute(&mut tx);
        assert_eq!(tx.audit_parts().letters(), "AZ");
    }
}
