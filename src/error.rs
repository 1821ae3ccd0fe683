//! Error types for rampart.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rampart operations.
///
/// All variants are configuration-time errors. Evaluation never fails with
/// an `Error`: transformation steps record their own success flag and macro
/// expansion falls back to the empty string.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed `%{...}` expression in a run-time string.
    #[error("invalid macro expression '{expression}': {message}")]
    MacroSyntax {
        /// The expression that failed to parse.
        expression: String,
        /// Error message.
        message: String,
    },

    /// Error compiling a regex pattern.
    #[error("invalid regex pattern '{pattern}': {source}")]
    RegexCompile {
        /// The pattern that failed to compile.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// Unknown transformation name.
    #[error("unknown transformation: t:{name}")]
    UnknownTransformation {
        /// The unknown transformation name.
        name: String,
    },

    /// Invalid action argument.
    #[error("invalid argument for action '{action}': {message}")]
    InvalidActionArgument {
        /// The action name.
        action: String,
        /// Error message.
        message: String,
    },

    /// Rule metadata value outside its documented range.
    #[error("{what} value {value} out of range {min}..={max}")]
    ValueOutOfRange {
        /// Name of the metadata field.
        what: &'static str,
        /// The rejected value.
        value: u8,
        /// Lower bound (inclusive).
        min: u8,
        /// Upper bound (inclusive).
        max: u8,
    },

    /// Action that may not appear in a default-action set.
    #[error("action '{action}' is not allowed in default actions")]
    ActionNotAllowedInDefaults {
        /// The rejected action name.
        action: String,
    },

    /// Chained rule declared in a different phase than its parent.
    #[error("chained rule phase {found} does not match parent phase {expected}")]
    ChainPhaseMismatch {
        /// Phase of the chain parent.
        expected: u8,
        /// Phase of the rule being attached.
        found: u8,
    },

    /// Rule chain is incomplete.
    #[error("incomplete rule chain: chain action without following rule")]
    IncompleteChain,

    /// Duplicate rule ID.
    #[error("duplicate rule id: {id}")]
    DuplicateRuleId {
        /// The duplicate ID.
        id: u64,
    },
}
