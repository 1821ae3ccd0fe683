//! Run-time strings with `%{...}` macro expansion.
//!
//! Action arguments like `msg:'Attack on %{tx.target}'` or
//! `setvar:tx.%{rule.id}_hits=+1` are parsed once at configuration time into
//! a [`RuntimeString`] and expanded at evaluation time against the
//! transaction and the owning rule. Macro syntax errors are configuration
//! errors; an unknown variable at evaluation time expands to the empty
//! string.

use crate::engine::Transaction;
use crate::error::{Error, Result};
use crate::variables::Collection;
use once_cell::sync::Lazy;
use regex::Regex;

/// Accepted characters inside a `%{...}` expression.
static MACRO_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)?$").unwrap());

/// Identity snapshot of the rule a run-time string is bound to.
///
/// Binding a snapshot rather than a rule reference keeps frozen rules freely
/// shareable; the snapshot is refreshed whenever rule identity changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleInfo {
    /// Rule ID (0 when the rule carries no id action).
    pub id: u64,
    /// Rule revision.
    pub revision: Option<String>,
    /// Rule version.
    pub version: Option<String>,
    /// Severity 0 (emergency) through 7 (debug).
    pub severity: Option<u8>,
    /// Maturity 1 (experimental) through 9 (extensively tested).
    pub maturity: Option<u8>,
    /// Accuracy 1 (many false positives) through 9 (very strong).
    pub accuracy: Option<u8>,
    /// Configuration file the rule was defined in.
    pub file_name: Option<String>,
    /// Line number of the rule definition.
    pub line_number: u32,
}

/// One field of the owning rule addressable as `%{rule.<field>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleField {
    Id,
    Revision,
    Version,
    Severity,
    Maturity,
    Accuracy,
}

/// A parsed macro reference.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MacroSpec {
    /// `%{tx.<key>}`
    Tx(String),
    /// `%{env.<key>}`
    Env(String),
    /// `%{rule.<field>}` resolved against the bound owner.
    Rule(RuleField),
    /// `%{matched_var}`
    MatchedVar,
    /// `%{matched_var_name}`
    MatchedVarName,
    /// `%{unique_id}`
    UniqueId,
    /// Syntactically valid but unrecognized; expands to the empty string.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Element {
    Literal(String),
    Macro(MacroSpec),
}

/// A configuration-time template expanded at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeString {
    elements: Vec<Element>,
    has_macro: bool,
    owner: Option<RuleInfo>,
}

impl RuntimeString {
    /// Parse a template. Fails on malformed `%{...}` syntax.
    pub fn parse(input: &str) -> Result<Self> {
        let mut elements = Vec::new();
        let mut has_macro = false;
        let mut literal = String::new();
        let mut chars = input.char_indices().peekable();

        while let Some((_, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.peek().map(|&(_, n)| n) != Some('{') {
                // A bare percent is an ordinary character.
                literal.push('%');
                continue;
            }
            let (brace_pos, _) = match chars.next() {
                Some(p) => p,
                None => break,
            };
            let rest = &input[brace_pos + 1..];
            let Some(end) = rest.find('}') else {
                return Err(Error::MacroSyntax {
                    expression: input.to_string(),
                    message: "unterminated %{ expression".to_string(),
                });
            };
            let name = &rest[..end];
            if !MACRO_NAME_RE.is_match(name) {
                return Err(Error::MacroSyntax {
                    expression: input.to_string(),
                    message: format!("invalid variable reference '{name}'"),
                });
            }
            if !literal.is_empty() {
                elements.push(Element::Literal(std::mem::take(&mut literal)));
            }
            elements.push(Element::Macro(Self::parse_macro(name)));
            has_macro = true;
            // Skip past the consumed expression body and closing brace.
            for _ in 0..=end {
                chars.next();
            }
        }

        if !literal.is_empty() {
            elements.push(Element::Literal(literal));
        }

        Ok(Self {
            elements,
            has_macro,
            owner: None,
        })
    }

    /// A plain literal with no macros.
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        let elements = if text.is_empty() {
            Vec::new()
        } else {
            vec![Element::Literal(text)]
        };
        Self {
            elements,
            has_macro: false,
            owner: None,
        }
    }

    fn parse_macro(name: &str) -> MacroSpec {
        let (collection, key) = match name.split_once('.') {
            Some((c, k)) => (c.to_ascii_lowercase(), k),
            None => (String::new(), name),
        };
        match collection.as_str() {
            "tx" => MacroSpec::Tx(key.to_ascii_lowercase()),
            "env" => MacroSpec::Env(key.to_string()),
            "rule" => match key.to_ascii_lowercase().as_str() {
                "id" => MacroSpec::Rule(RuleField::Id),
                "rev" => MacroSpec::Rule(RuleField::Revision),
                "ver" => MacroSpec::Rule(RuleField::Version),
                "severity" => MacroSpec::Rule(RuleField::Severity),
                "maturity" => MacroSpec::Rule(RuleField::Maturity),
                "accuracy" => MacroSpec::Rule(RuleField::Accuracy),
                _ => MacroSpec::Unknown(name.to_string()),
            },
            "" => match key.to_ascii_lowercase().as_str() {
                "matched_var" => MacroSpec::MatchedVar,
                "matched_var_name" => MacroSpec::MatchedVarName,
                "unique_id" => MacroSpec::UniqueId,
                _ => MacroSpec::Unknown(name.to_string()),
            },
            _ => MacroSpec::Unknown(name.to_string()),
        }
    }

    /// Whether expansion depends on evaluation-time or owner state.
    pub fn is_deferred(&self) -> bool {
        self.has_macro
    }

    /// Bind (or unbind) the owning rule's identity snapshot.
    pub fn populate(&mut self, owner: Option<&RuleInfo>) {
        self.owner = owner.cloned();
    }

    /// The bound owner, if any.
    pub fn owner(&self) -> Option<&RuleInfo> {
        self.owner.as_ref()
    }

    /// Expand the template against the transaction and the bound owner.
    pub fn resolve(&self, tx: &Transaction) -> String {
        let mut out = String::new();
        for element in &self.elements {
            match element {
                Element::Literal(s) => out.push_str(s),
                Element::Macro(spec) => out.push_str(&self.resolve_macro(spec, tx)),
            }
        }
        out
    }

    fn resolve_macro(&self, spec: &MacroSpec, tx: &Transaction) -> String {
        match spec {
            MacroSpec::Tx(key) => tx.tx().first(key).unwrap_or_default().to_string(),
            MacroSpec::Env(key) => tx.env().first(key).unwrap_or_default().to_string(),
            MacroSpec::Rule(field) => match &self.owner {
                Some(info) => resolve_rule_field(info, *field),
                None => String::new(),
            },
            MacroSpec::MatchedVar => tx
                .matched_var()
                .map(|(_, v)| v.to_string())
                .unwrap_or_default(),
            MacroSpec::MatchedVarName => tx
                .matched_var()
                .map(|(n, _)| n.to_string())
                .unwrap_or_default(),
            MacroSpec::UniqueId => tx.unique_id().to_string(),
            MacroSpec::Unknown(name) => {
                tracing::debug!(variable = %name, "unknown variable in run-time string");
                String::new()
            }
        }
    }
}

fn resolve_rule_field(info: &RuleInfo, field: RuleField) -> String {
    match field {
        RuleField::Id => info.id.to_string(),
        RuleField::Revision => info.revision.clone().unwrap_or_default(),
        RuleField::Version => info.version.clone().unwrap_or_default(),
        RuleField::Severity => info
            .severity
            .map(|s| s.to_string())
            .unwrap_or_default(),
        RuleField::Maturity => info
            .maturity
            .map(|m| m.to_string())
            .unwrap_or_default(),
        RuleField::Accuracy => info
            .accuracy
            .map(|a| a.to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ruleset::RuleEngineMode;
    use crate::variables::MutableCollection;

    fn tx() -> Transaction {
        Transaction::new(RuleEngineMode::On)
    }

    #[test]
    fn test_parse_literal_only() {
        let s = RuntimeString::parse("plain text with 100% effort").unwrap();
        assert!(!s.is_deferred());
        assert_eq!(s.resolve(&tx()), "plain text with 100% effort");
    }

    #[test]
    fn test_parse_macro_mix() {
        let s = RuntimeString::parse("score is %{tx.score}!").unwrap();
        assert!(s.is_deferred());
        let mut t = tx();
        t.tx_mut().set("score".to_string(), "5".to_string());
        assert_eq!(s.resolve(&t), "score is 5!");
    }

    #[test]
    fn test_parse_unterminated() {
        assert!(matches!(
            RuntimeString::parse("bad %{tx.score"),
            Err(Error::MacroSyntax { .. })
        ));
    }

    #[test]
    fn test_parse_invalid_name() {
        assert!(matches!(
            RuntimeString::parse("bad %{tx score}"),
            Err(Error::MacroSyntax { .. })
        ));
        assert!(matches!(
            RuntimeString::parse("bad %{}"),
            Err(Error::MacroSyntax { .. })
        ));
    }

    #[test]
    fn test_rule_macro_unbound_is_empty() {
        let s = RuntimeString::parse("rule %{rule.id}").unwrap();
        assert_eq!(s.resolve(&tx()), "rule ");
    }

    #[test]
    fn test_rule_macro_follows_binding() {
        let mut s = RuntimeString::parse("%{rule.id}/%{rule.severity}").unwrap();
        let info = RuleInfo {
            id: 942100,
            severity: Some(2),
            ..RuleInfo::default()
        };
        s.populate(Some(&info));
        assert_eq!(s.resolve(&tx()), "942100/2");

        // A clone re-bound elsewhere leaves the original untouched.
        let mut copy = s.clone();
        let other = RuleInfo {
            id: 7,
            ..RuleInfo::default()
        };
        copy.populate(Some(&other));
        assert_eq!(copy.resolve(&tx()), "7/");
        assert_eq!(s.resolve(&tx()), "942100/2");

        s.populate(None);
        assert_eq!(s.resolve(&tx()), "/");
    }

    #[test]
    fn test_unknown_variable_expands_empty() {
        let s = RuntimeString::parse("[%{request.method}]").unwrap();
        assert_eq!(s.resolve(&tx()), "[]");
    }

    #[test]
    fn test_matched_var() {
        let s = RuntimeString::parse("%{matched_var_name}=%{matched_var}").unwrap();
        let mut t = tx();
        t.set_matched_var("ARGS:q".to_string(), "1 or 1=1".to_string());
        assert_eq!(s.resolve(&t), "ARGS:q=1 or 1=1");
    }
}
