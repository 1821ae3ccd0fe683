//! The set of actions a rule (or a default action template) carries.

use crate::actions::{
    Action, ActionSlot, DataAction, DisruptiveAction, FlowAction, LoggingAction, MetadataAction,
};
use crate::runtime_string::RuleInfo;
use crate::transformations::{Transformation, TransformationPipeline};
use std::sync::Arc;

/// A rule's executable actions, flags, and transformations.
///
/// Rules hold two of these: their own actions and the inherited defaults.
/// Copying shares everything frozen and deep-clones only the actions whose
/// run-time strings must re-bind to the new owner; the disruptive slot is
/// always shared and keeps its original binding.
#[derive(Debug)]
pub struct ActionSet {
    /// The one disruptive action, latest wins. `block` never lands here.
    disruptive: Option<Arc<DisruptiveAction>>,
    /// Actions executed in order after a full match (ctl, setuid, setsid,
    /// setenv).
    positional: Vec<ActionSlot>,
    /// Variable updates executed per matching rule, even mid-chain.
    set_var: Vec<ActionSlot>,
    /// Tags attached to match messages.
    tags: Vec<ActionSlot>,
    contains_audit_log: bool,
    contains_log: bool,
    contains_multi_match: bool,
    contains_no_audit_log: bool,
    contains_no_log: bool,
    contains_block: bool,
    transformations: TransformationPipeline,
}

impl ActionSet {
    /// Create an action set, optionally seeded with transformations.
    pub fn new(transformations: Option<TransformationPipeline>) -> Self {
        Self {
            disruptive: None,
            positional: Vec::new(),
            set_var: Vec::new(),
            tags: Vec::new(),
            contains_audit_log: false,
            contains_log: false,
            contains_multi_match: false,
            contains_no_audit_log: false,
            contains_no_log: false,
            contains_block: false,
            transformations: transformations.unwrap_or_default(),
        }
    }

    /// Route an action into its slot, sequence, flag, or pipeline.
    ///
    /// Rule-level actions (id, phase, chain, capture, and other rule
    /// metadata) do not belong to an action set and are ignored.
    pub fn add_action(&mut self, action: Action) {
        match action {
            Action::Disruptive(DisruptiveAction::Block) => {
                self.contains_block = true;
            }
            Action::Disruptive(disruptive) => {
                self.disruptive = Some(Arc::new(disruptive));
            }
            Action::Flow(FlowAction::MultiMatch) => {
                self.contains_multi_match = true;
            }
            Action::Logging(LoggingAction::Log) => {
                self.contains_log = true;
            }
            Action::Logging(LoggingAction::NoLog) => {
                self.contains_no_log = true;
            }
            Action::Logging(LoggingAction::AuditLog) => {
                self.contains_audit_log = true;
            }
            Action::Logging(LoggingAction::NoAuditLog) => {
                self.contains_no_audit_log = true;
            }
            Action::Data(DataAction::SetVar(_)) => {
                self.set_var.push(ActionSlot::new(action));
            }
            Action::Data(DataAction::SetUid(_))
            | Action::Data(DataAction::SetSid(_))
            | Action::Data(DataAction::SetEnv { .. }) => {
                self.positional.push(ActionSlot::new(action));
            }
            Action::Control(_) => {
                self.positional.push(ActionSlot::new(action));
            }
            Action::Metadata(MetadataAction::Tag(_)) => {
                self.tags.push(ActionSlot::new(action));
            }
            Action::Transformation(t) => {
                self.transformations.add(t);
            }
            Action::Flow(FlowAction::Chain)
            | Action::Data(DataAction::Capture)
            | Action::Metadata(_) => {
                tracing::debug!(action = action.name(), "rule-level action ignored by action set");
            }
        }
    }

    /// Append a transformation.
    pub fn add_transformation(&mut self, transformation: Arc<dyn Transformation>) {
        self.transformations.add(transformation);
    }

    /// Bind the owner into every owned run-time string.
    ///
    /// The disruptive slot is shared and stays bound to its first owner.
    pub fn populate(&mut self, owner: Option<&RuleInfo>) {
        for slot in self
            .positional
            .iter_mut()
            .chain(&mut self.set_var)
            .chain(&mut self.tags)
        {
            slot.populate(owner);
        }
    }

    /// Replace this set's action sequences with copies of another set's,
    /// sharing frozen actions and deep-cloning deferred ones unbound.
    pub fn copy_actions_with_runtime_strings(&mut self, other: &ActionSet) {
        self.positional = other.positional.iter().map(ActionSlot::duplicate).collect();
        self.set_var = other.set_var.iter().map(ActionSlot::duplicate).collect();
        self.tags = other.tags.iter().map(ActionSlot::duplicate).collect();
    }

    /// Reset to an empty set.
    pub fn clear(&mut self) {
        *self = Self::new(None);
    }

    /// The disruptive action, if one was set.
    pub fn disruptive(&self) -> Option<&DisruptiveAction> {
        self.disruptive.as_deref()
    }

    /// Per-match variable updates, in configuration order.
    pub fn set_var_actions(&self) -> impl Iterator<Item = &Action> {
        self.set_var.iter().map(ActionSlot::get)
    }

    /// After-match actions, in configuration order.
    pub fn positional_actions(&self) -> impl Iterator<Item = &Action> {
        self.positional.iter().map(ActionSlot::get)
    }

    /// Tag actions, in configuration order.
    pub fn tag_actions(&self) -> impl Iterator<Item = &Action> {
        self.tags.iter().map(ActionSlot::get)
    }

    /// Whether a `block` action was seen.
    pub fn contains_block(&self) -> bool {
        self.contains_block
    }

    /// Whether a `log` action was seen.
    pub fn contains_log(&self) -> bool {
        self.contains_log
    }

    /// Whether a `nolog` action was seen.
    pub fn contains_no_log(&self) -> bool {
        self.contains_no_log
    }

    /// Whether an `auditlog` action was seen.
    pub fn contains_audit_log(&self) -> bool {
        self.contains_audit_log
    }

    /// Whether a `noauditlog` action was seen.
    pub fn contains_no_audit_log(&self) -> bool {
        self.contains_no_audit_log
    }

    /// Whether a `multiMatch` action was seen.
    pub fn contains_multi_match(&self) -> bool {
        self.contains_multi_match
    }

    /// The transformation pipeline.
    pub fn transformations(&self) -> &TransformationPipeline {
        &self.transformations
    }
}

impl Default for ActionSet {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Clone for ActionSet {
    fn clone(&self) -> Self {
        let mut copy = Self {
            disruptive: self.disruptive.clone(),
            positional: Vec::new(),
            set_var: Vec::new(),
            tags: Vec::new(),
            contains_audit_log: self.contains_audit_log,
            contains_log: self.contains_log,
            contains_multi_match: self.contains_multi_match,
            contains_no_audit_log: self.contains_no_audit_log,
            contains_no_log: self.contains_no_log,
            contains_block: self.contains_block,
            transformations: self.transformations.clone(),
        };
        copy.copy_actions_with_runtime_strings(self);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{AuditLogParts, ControlAction, SetVar};
    use crate::engine::ruleset::RuleEngineMode;
    use crate::engine::Transaction;
    use crate::runtime_string::RuntimeString;
    use crate::transformations::create_transformation;

    fn rts(s: &str) -> RuntimeString {
        RuntimeString::parse(s).unwrap()
    }

    #[test]
    fn test_disruptive_slot_latest_wins() {
        let mut set = ActionSet::new(None);
        set.add_action(Action::Disruptive(DisruptiveAction::Pass));
        set.add_action(Action::Disruptive(DisruptiveAction::deny()));
        assert!(matches!(
            set.disruptive(),
            Some(DisruptiveAction::Deny { .. })
        ));
    }

    #[test]
    fn test_block_sets_flag_not_slot() {
        let mut set = ActionSet::new(None);
        set.add_action(Action::Disruptive(DisruptiveAction::Block));
        assert!(set.contains_block());
        assert!(set.disruptive().is_none());
    }

    #[test]
    fn test_logging_flags_never_unset() {
        let mut set = ActionSet::new(None);
        set.add_action(Action::Logging(LoggingAction::Log));
        set.add_action(Action::Logging(LoggingAction::NoLog));
        assert!(set.contains_log());
        assert!(set.contains_no_log());
    }

    #[test]
    fn test_sequence_routing() {
        let mut set = ActionSet::new(None);
        set.add_action(Action::Data(DataAction::SetVar(SetVar::set_default(rts(
            "seen",
        )))));
        set.add_action(Action::Metadata(MetadataAction::Tag(rts("attack-sqli"))));
        set.add_action(Action::Control(ControlAction::AuditLogParts(
            AuditLogParts::new("+I").unwrap(),
        )));
        set.add_action(Action::Data(DataAction::SetUid(rts("u"))));

        assert_eq!(set.set_var_actions().count(), 1);
        assert_eq!(set.tag_actions().count(), 1);
        assert_eq!(set.positional_actions().count(), 2);
    }

    #[test]
    fn test_rule_level_actions_ignored() {
        let mut set = ActionSet::new(None);
        set.add_action(Action::Metadata(MetadataAction::Id(1)));
        set.add_action(Action::Flow(FlowAction::Chain));
        set.add_action(Action::Data(DataAction::Capture));
        assert_eq!(set.set_var_actions().count(), 0);
        assert_eq!(set.positional_actions().count(), 0);
        assert!(set.disruptive().is_none());
    }

    #[test]
    fn test_transformations_routed_to_pipeline() {
        let mut set = ActionSet::new(None);
        set.add_action(Action::Transformation(
            create_transformation("lowercase").unwrap(),
        ));
        assert_eq!(set.transformations().len(), 1);
    }

    #[test]
    fn test_clone_shares_disruptive_slot() {
        let mut set = ActionSet::new(None);
        set.add_action(Action::Disruptive(DisruptiveAction::deny()));
        let copy = set.clone();
        match (&set.disruptive, &copy.disruptive) {
            (Some(a), Some(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected both slots filled"),
        }
    }

    #[test]
    fn test_clone_copies_each_flag() {
        let mut set = ActionSet::new(None);
        set.add_action(Action::Logging(LoggingAction::NoLog));
        set.add_action(Action::Logging(LoggingAction::AuditLog));

        let copy = set.clone();
        assert!(copy.contains_no_log());
        assert!(copy.contains_audit_log());
        assert!(!copy.contains_no_audit_log());
        assert!(!copy.contains_log());
        assert!(!copy.contains_block());
    }

    #[test]
    fn test_clone_detaches_deferred_bindings() {
        let tx = Transaction::new(RuleEngineMode::On);
        let owner = RuleInfo {
            id: 941100,
            ..RuleInfo::default()
        };

        let mut set = ActionSet::new(None);
        set.add_action(Action::Metadata(MetadataAction::Tag(rts(
            "rule-%{rule.id}",
        ))));
        set.populate(Some(&owner));

        let copy = set.clone();
        let resolve_first_tag = |s: &ActionSet| match s.tag_actions().next() {
            Some(Action::Metadata(MetadataAction::Tag(t))) => t.resolve(&tx),
            _ => panic!("expected tag"),
        };

        assert_eq!(resolve_first_tag(&set), "rule-941100");
        assert_eq!(resolve_first_tag(&copy), "rule-");
    }

    #[test]
    fn test_copy_actions_replaces_sequences() {
        let mut source = ActionSet::new(None);
        source.add_action(Action::Metadata(MetadataAction::Tag(rts("a"))));
        source.add_action(Action::Metadata(MetadataAction::Tag(rts("b"))));

        let mut target = ActionSet::new(None);
        target.add_action(Action::Metadata(MetadataAction::Tag(rts("old"))));
        target.copy_actions_with_runtime_strings(&source);

        let tags: Vec<_> = target.tag_actions().map(Action::name).collect();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut set = ActionSet::new(None);
        set.add_action(Action::Disruptive(DisruptiveAction::deny()));
        set.add_action(Action::Logging(LoggingAction::Log));
        set.add_action(Action::Transformation(
            create_transformation("trim").unwrap(),
        ));
        set.clear();

        assert!(set.disruptive().is_none());
        assert!(!set.contains_log());
        assert!(set.transformations().is_empty());
    }
}
