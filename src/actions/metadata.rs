//! Metadata actions (id, phase, msg, severity, tag, etc.).

use crate::runtime_string::RuntimeString;

/// Metadata actions.
///
/// These describe the rule rather than act on the transaction; a rule
/// absorbs them into its own fields at construction time.
#[derive(Debug, Clone)]
pub enum MetadataAction {
    /// Rule ID.
    Id(u64),
    /// Processing phase.
    Phase(u8),
    /// Severity level (0-7).
    Severity(u8),
    /// Maturity level (1-9).
    Maturity(u8),
    /// Accuracy level (1-9).
    Accuracy(u8),
    /// Revision.
    Rev(String),
    /// Version.
    Ver(String),
    /// Message, expanded at evaluation time.
    Msg(RuntimeString),
    /// Log data, expanded at evaluation time.
    LogData(RuntimeString),
    /// Tag, expanded at evaluation time.
    Tag(RuntimeString),
    /// XML namespace for validation operators.
    XmlNs(XmlNamespace),
}

/// An XML namespace declared by an `xmlns` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNamespace {
    /// Namespace prefix.
    pub prefix: String,
    /// Namespace URI.
    pub uri: String,
}

/// Severity levels, syslog style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl From<u8> for Severity {
    fn from(value: u8) -> Self {
        match value {
            0 => Severity::Emergency,
            1 => Severity::Alert,
            2 => Severity::Critical,
            3 => Severity::Error,
            4 => Severity::Warning,
            5 => Severity::Notice,
            6 => Severity::Info,
            _ => Severity::Debug,
        }
    }
}

impl Severity {
    /// Get severity name.
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_u8() {
        assert_eq!(Severity::from(0), Severity::Emergency);
        assert_eq!(Severity::from(2), Severity::Critical);
        assert_eq!(Severity::from(4), Severity::Warning);
        assert_eq!(Severity::from(99), Severity::Debug);
    }

    #[test]
    fn test_severity_name() {
        assert_eq!(Severity::Critical.name(), "CRITICAL");
        assert_eq!(Severity::from(7).name(), "DEBUG");
    }
}
