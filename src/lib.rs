//! # rampart
//!
//! Rule-action engine core for web application firewall request inspection.
//!
//! This crate models the actionable half of a WAF rule language: the actions
//! attached to a rule (disruptive, logging, metadata, data, transformation),
//! the default-action overlay merged from the configuration, rule chains, and
//! the evaluation-time logic that decides what a matched rule does next.
//! Variable resolution and operator matching stay behind the [`Matcher`]
//! seam, so any matching engine can drive it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rampart::{Action, Rule, RuleSet, Transaction};
//! use rampart::actions::{DisruptiveAction, MetadataAction};
//!
//! let mut rules = RuleSet::new();
//! rules.add_rule(Rule::new(
//!     vec![
//!         Action::Metadata(MetadataAction::Id(1001)),
//!         Action::Disruptive(DisruptiveAction::deny()),
//!     ],
//!     None,
//!     Some("demo.conf".to_string()),
//!     1,
//! )?)?;
//!
//! let mut tx = rules.new_transaction();
//! rules.evaluate(&mut tx);
//! if let Some(intervention) = tx.intervention() {
//!     println!("blocked: status={}", intervention.status);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod actions;
pub mod engine;
pub mod error;
pub mod runtime_string;
pub mod transformations;
pub mod variables;

// Re-export main types at crate root
pub use actions::Action;
pub use engine::rule::{Matcher, Rule};
pub use engine::ruleset::{RuleEngineMode, RuleSet};
pub use engine::{Engine, Intervention, Phase, RuleMessage, Transaction};
pub use error::{Error, Result};
pub use runtime_string::RuntimeString;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
