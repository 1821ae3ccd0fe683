//! Per-match messages collected on the transaction.

use super::phase::Phase;
use crate::actions::Severity;

/// Everything worth reporting about one rule match.
///
/// Built after a rule (or a full chain) matches, with all run-time strings
/// already expanded.
#[derive(Debug, Clone, Default)]
pub struct RuleMessage {
    /// ID of the matching rule.
    pub rule_id: u64,
    /// Phase the match happened in.
    pub phase: Phase,
    /// Expanded `msg` text.
    pub message: String,
    /// Expanded `logdata` text.
    pub log_data: String,
    /// Rule severity, if set.
    pub severity: Option<u8>,
    /// Rule maturity, if set.
    pub maturity: Option<u8>,
    /// Rule accuracy, if set.
    pub accuracy: Option<u8>,
    /// Rule revision, if set.
    pub revision: Option<String>,
    /// Rule version, if set.
    pub version: Option<String>,
    /// Expanded tags, defaults first.
    pub tags: Vec<String>,
    /// Configuration file the rule came from.
    pub file_name: Option<String>,
    /// Line number of the rule definition.
    pub line_number: u32,
    /// The value the matcher accepted.
    pub matched: String,
    /// Whether the rule's effective disruptive action blocks.
    pub is_disruptive: bool,
}

impl RuleMessage {
    /// Format as a bracketed error-log entry.
    pub fn log(&self) -> String {
        let mut parts = Vec::new();

        if let Some(ref file) = self.file_name {
            parts.push(format!("[file \"{}\"]", file));
            parts.push(format!("[line \"{}\"]", self.line_number));
        }

        parts.push(format!("[id \"{}\"]", self.rule_id));

        if let Some(ref rev) = self.revision {
            parts.push(format!("[rev \"{}\"]", rev));
        }

        if !self.message.is_empty() {
            parts.push(format!("[msg \"{}\"]", self.message));
        }

        if !self.log_data.is_empty() {
            parts.push(format!("[data \"{}\"]", self.log_data));
        }

        if let Some(severity) = self.severity {
            parts.push(format!("[severity \"{}\"]", Severity::from(severity).name()));
        }

        if let Some(ref ver) = self.version {
            parts.push(format!("[ver \"{}\"]", ver));
        }

        if let Some(maturity) = self.maturity {
            parts.push(format!("[maturity \"{}\"]", maturity));
        }

        if let Some(accuracy) = self.accuracy {
            parts.push(format!("[accuracy \"{}\"]", accuracy));
        }

        for tag in &self.tags {
            parts.push(format!("[tag \"{}\"]", tag));
        }

        parts.push(format!("[phase \"{}\"]", self.phase.number()));

        parts.join(" ")
    }
}
