//! Action system for rule execution.
//!
//! Actions split along two axes. By kind: disruptive, flow, data, metadata,
//! logging, control, transformation. By lifetime: most actions are frozen at
//! configuration time and can be shared between a rule and its copies, while
//! actions carrying run-time strings stay owned per rule so their owner
//! binding can differ (see [`ActionSlot`]).

mod ctl;
mod data;
mod disruptive;
mod metadata;

pub use ctl::{AuditLogParts, AuditParts, ControlAction, PartsMode};
pub use data::{DataAction, SetVar, SetVarOp};
pub use disruptive::{AllowScope, DisruptiveAction};
pub use metadata::{MetadataAction, Severity, XmlNamespace};

use crate::engine::Transaction;
use crate::runtime_string::RuleInfo;
use crate::transformations::Transformation;
use crate::variables::MutableCollection;
use std::sync::Arc;

/// Flow control actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    /// Chain to the next rule.
    Chain,
    /// Match against the value after every transformation step, not just the
    /// final one.
    MultiMatch,
}

/// Logging actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingAction {
    /// Enable error logging.
    Log,
    /// Disable error logging.
    NoLog,
    /// Enable audit logging.
    AuditLog,
    /// Disable audit logging.
    NoAuditLog,
}

/// An action attached to a rule or to a default action template.
#[derive(Clone)]
pub enum Action {
    /// Disruptive action (deny, drop, pass, allow, redirect, block).
    Disruptive(DisruptiveAction),
    /// Flow control action (chain, multiMatch).
    Flow(FlowAction),
    /// Data action (setvar, capture, setuid, setsid, setenv).
    Data(DataAction),
    /// Metadata action (id, phase, severity, msg, tag, etc.).
    Metadata(MetadataAction),
    /// Logging action (log, nolog, auditlog, noauditlog).
    Logging(LoggingAction),
    /// Control action (ctl).
    Control(ControlAction),
    /// Transformation (t:xxx).
    Transformation(Arc<dyn Transformation>),
}

impl Action {
    /// The action's configuration-language name.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Disruptive(DisruptiveAction::Deny { .. }) => "deny",
            Action::Disruptive(DisruptiveAction::Drop) => "drop",
            Action::Disruptive(DisruptiveAction::Pass) => "pass",
            Action::Disruptive(DisruptiveAction::Redirect { .. }) => "redirect",
            Action::Disruptive(DisruptiveAction::Allow(_)) => "allow",
            Action::Disruptive(DisruptiveAction::Block) => "block",
            Action::Flow(FlowAction::Chain) => "chain",
            Action::Flow(FlowAction::MultiMatch) => "multiMatch",
            Action::Data(DataAction::SetVar(_)) => "setvar",
            Action::Data(DataAction::Capture) => "capture",
            Action::Data(DataAction::SetUid(_)) => "setuid",
            Action::Data(DataAction::SetSid(_)) => "setsid",
            Action::Data(DataAction::SetEnv { .. }) => "setenv",
            Action::Metadata(MetadataAction::Id(_)) => "id",
            Action::Metadata(MetadataAction::Phase(_)) => "phase",
            Action::Metadata(MetadataAction::Severity(_)) => "severity",
            Action::Metadata(MetadataAction::Maturity(_)) => "maturity",
            Action::Metadata(MetadataAction::Accuracy(_)) => "accuracy",
            Action::Metadata(MetadataAction::Rev(_)) => "rev",
            Action::Metadata(MetadataAction::Ver(_)) => "ver",
            Action::Metadata(MetadataAction::Msg(_)) => "msg",
            Action::Metadata(MetadataAction::LogData(_)) => "logdata",
            Action::Metadata(MetadataAction::Tag(_)) => "tag",
            Action::Metadata(MetadataAction::XmlNs(_)) => "xmlns",
            Action::Logging(LoggingAction::Log) => "log",
            Action::Logging(LoggingAction::NoLog) => "nolog",
            Action::Logging(LoggingAction::AuditLog) => "auditlog",
            Action::Logging(LoggingAction::NoAuditLog) => "noauditlog",
            Action::Control(ControlAction::AuditLogParts(_)) => "ctl:auditLogParts",
            Action::Transformation(t) => t.name(),
        }
    }

    /// Whether the action carries run-time strings whose expansion depends
    /// on evaluation-time or owner state.
    pub fn is_deferred(&self) -> bool {
        match self {
            Action::Disruptive(DisruptiveAction::Redirect { target, .. }) => target.is_deferred(),
            Action::Data(DataAction::SetVar(sv)) => sv.is_deferred(),
            Action::Data(DataAction::SetUid(s)) | Action::Data(DataAction::SetSid(s)) => {
                s.is_deferred()
            }
            Action::Data(DataAction::SetEnv { value, .. }) => value.is_deferred(),
            Action::Metadata(MetadataAction::Msg(s))
            | Action::Metadata(MetadataAction::LogData(s))
            | Action::Metadata(MetadataAction::Tag(s)) => s.is_deferred(),
            _ => false,
        }
    }

    /// Bind (or unbind) the run-time strings in this action to a rule.
    pub fn populate(&mut self, owner: Option<&RuleInfo>) {
        match self {
            Action::Disruptive(DisruptiveAction::Redirect { target, .. }) => {
                target.populate(owner)
            }
            Action::Data(DataAction::SetVar(sv)) => sv.populate(owner),
            Action::Data(DataAction::SetUid(s)) | Action::Data(DataAction::SetSid(s)) => {
                s.populate(owner)
            }
            Action::Data(DataAction::SetEnv { value, .. }) => value.populate(owner),
            Action::Metadata(MetadataAction::Msg(s))
            | Action::Metadata(MetadataAction::LogData(s))
            | Action::Metadata(MetadataAction::Tag(s)) => s.populate(owner),
            _ => {}
        }
    }

    /// Execute the action's transaction side effect, if it has one.
    ///
    /// Disruptive execution and flag absorption happen at the rule level;
    /// here only the state-mutating actions do work.
    pub fn execute(&self, tx: &mut Transaction) {
        match self {
            Action::Data(DataAction::SetVar(sv)) => sv.execute(tx),
            Action::Data(DataAction::SetUid(uid)) => {
                let id = uid.resolve(tx);
                tx.set_user_id(id);
            }
            Action::Data(DataAction::SetSid(sid)) => {
                let id = sid.resolve(tx);
                tx.set_session_id(id);
            }
            Action::Data(DataAction::SetEnv { name, value }) => {
                let v = value.resolve(tx);
                tx.env_mut().set(name.clone(), v);
            }
            Action::Control(ControlAction::AuditLogParts(parts)) => parts.execute(tx),
            _ => {}
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Disruptive(d) => f.debug_tuple("Disruptive").field(d).finish(),
            Action::Flow(fl) => f.debug_tuple("Flow").field(fl).finish(),
            Action::Data(d) => f.debug_tuple("Data").field(d).finish(),
            Action::Metadata(m) => f.debug_tuple("Metadata").field(m).finish(),
            Action::Logging(l) => f.debug_tuple("Logging").field(l).finish(),
            Action::Control(c) => f.debug_tuple("Control").field(c).finish(),
            Action::Transformation(t) => f.debug_tuple("Transformation").field(&t.name()).finish(),
        }
    }
}

/// Storage for one action inside an action set.
///
/// Copying a rule shares frozen actions behind their `Arc` and deep-clones
/// deferred ones with the owner binding cleared, so the copy resolves
/// `%{rule.*}` against whichever rule it ends up attached to.
#[derive(Debug)]
pub enum ActionSlot {
    /// Immutable action shared between the original and its copies.
    Shared(Arc<Action>),
    /// Per-rule action carrying owner-bound run-time strings.
    Owned(Action),
}

impl ActionSlot {
    /// Wrap an action, owning it only when it must stay per-rule.
    pub fn new(action: Action) -> Self {
        if action.is_deferred() {
            Self::Owned(action)
        } else {
            Self::Shared(Arc::new(action))
        }
    }

    /// Copy for another rule. Shared stays shared; owned is cloned with its
    /// owner binding cleared.
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Shared(action) => Self::Shared(Arc::clone(action)),
            Self::Owned(action) => {
                let mut copy = action.clone();
                copy.populate(None);
                Self::Owned(copy)
            }
        }
    }

    /// The wrapped action.
    pub fn get(&self) -> &Action {
        match self {
            Self::Shared(action) => action,
            Self::Owned(action) => action,
        }
    }

    /// Re-bind the owner; shared actions have nothing to bind.
    pub fn populate(&mut self, owner: Option<&RuleInfo>) {
        if let Self::Owned(action) = self {
            action.populate(owner);
        }
    }
}

/// Whether an action may appear in a default action template.
///
/// Defaults carry behavior shared by many rules; identity metadata and
/// chain structure stay per-rule.
pub(crate) fn default_action_allowed(action: &Action) -> bool {
    match action {
        Action::Disruptive(_)
        | Action::Logging(_)
        | Action::Control(_)
        | Action::Transformation(_) => true,
        Action::Flow(FlowAction::MultiMatch) => true,
        Action::Flow(FlowAction::Chain) => false,
        Action::Data(DataAction::SetVar(_)) => true,
        Action::Data(_) => false,
        Action::Metadata(MetadataAction::Tag(_)) | Action::Metadata(MetadataAction::Phase(_)) => {
            true
        }
        Action::Metadata(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ruleset::RuleEngineMode;
    use crate::runtime_string::RuntimeString;
    use crate::transformations::create_transformation;

    fn rts(s: &str) -> RuntimeString {
        RuntimeString::parse(s).unwrap()
    }

    #[test]
    fn test_literal_actions_are_shared() {
        let slot = ActionSlot::new(Action::Disruptive(DisruptiveAction::deny()));
        assert!(matches!(slot, ActionSlot::Shared(_)));

        // A macro-free tag has nothing to bind either
        let slot = ActionSlot::new(Action::Metadata(MetadataAction::Tag(rts("attack-sqli"))));
        assert!(matches!(slot, ActionSlot::Shared(_)));
    }

    #[test]
    fn test_deferred_actions_are_owned() {
        let slot = ActionSlot::new(Action::Metadata(MetadataAction::Msg(rts(
            "hit on %{matched_var_name}",
        ))));
        assert!(matches!(slot, ActionSlot::Owned(_)));
    }

    #[test]
    fn test_duplicate_shares_frozen_actions() {
        let slot = ActionSlot::new(Action::Disruptive(DisruptiveAction::deny()));
        let copy = slot.duplicate();
        match (&slot, &copy) {
            (ActionSlot::Shared(a), ActionSlot::Shared(b)) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => panic!("expected both shared"),
        }
    }

    #[test]
    fn test_duplicate_detaches_owner_binding() {
        let tx = Transaction::new(RuleEngineMode::On);
        let info = RuleInfo {
            id: 920100,
            ..RuleInfo::default()
        };

        let mut slot = ActionSlot::new(Action::Metadata(MetadataAction::Msg(rts(
            "rule %{rule.id}",
        ))));
        slot.populate(Some(&info));

        let copy = slot.duplicate();
        let resolve = |s: &ActionSlot| match s.get() {
            Action::Metadata(MetadataAction::Msg(m)) => m.resolve(&tx),
            _ => panic!("expected msg"),
        };

        assert_eq!(resolve(&slot), "rule 920100");
        assert_eq!(resolve(&copy), "rule ");
    }

    #[test]
    fn test_execute_side_effects() {
        let mut tx = Transaction::new(RuleEngineMode::On);
        Action::Data(DataAction::SetUid(rts("user-7"))).execute(&mut tx);
        Action::Data(DataAction::SetSid(rts("sess-9"))).execute(&mut tx);
        assert_eq!(tx.user_id(), Some("user-7"));
        assert_eq!(tx.session_id(), Some("sess-9"));

        // Actions without side effects are no-ops
        Action::Logging(LoggingAction::Log).execute(&mut tx);
        Action::Disruptive(DisruptiveAction::deny()).execute(&mut tx);
        assert!(tx.intervention().is_none());
    }

    #[test]
    fn test_default_action_gate() {
        assert!(default_action_allowed(&Action::Disruptive(
            DisruptiveAction::Block
        )));
        assert!(default_action_allowed(&Action::Logging(LoggingAction::Log)));
        assert!(default_action_allowed(&Action::Metadata(
            MetadataAction::Phase(2)
        )));
        assert!(default_action_allowed(&Action::Transformation(
            create_transformation("lowercase").unwrap()
        )));

        assert!(!default_action_allowed(&Action::Flow(FlowAction::Chain)));
        assert!(!default_action_allowed(&Action::Metadata(
            MetadataAction::Id(1)
        )));
        assert!(!default_action_allowed(&Action::Metadata(
            MetadataAction::Msg(rts("x"))
        )));
        assert!(!default_action_allowed(&Action::Data(DataAction::Capture)));
    }
}
