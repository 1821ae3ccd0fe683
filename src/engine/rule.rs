//! Rules: condition matching, transformations, and action execution.

use crate::actions::{Action, DataAction, DisruptiveAction, FlowAction, MetadataAction, XmlNamespace};
use crate::error::{Error, Result};
use crate::runtime_string::{RuleInfo, RuntimeString};
use crate::transformations::{
    Transformation, TransformationPipeline, TransformationResult, TransformationResults,
};

use super::intervention::Intervention;
use super::message::RuleMessage;
use super::phase::Phase;
use super::properties::ActionSet;
use super::ruleset::RuleEngineMode;
use super::transaction::Transaction;
use std::sync::Arc;

/// The condition side of a rule.
///
/// Implementations pull candidate values out of the transaction and decide
/// whether a transformed value satisfies the condition. A matcher may stage
/// captures on the transaction when it matches; the rule commits them only
/// when a `capture` action is present.
pub trait Matcher: Send + Sync {
    /// Candidate `(variable name, value)` pairs drawn from the transaction.
    fn candidates(&self, tx: &Transaction) -> Vec<(String, String)>;

    /// Whether a transformed candidate value satisfies the condition.
    fn matches(&self, tx: &mut Transaction, value: &str) -> bool;
}

/// A rule: a matcher, two action sets (own and inherited defaults), rule
/// metadata, and an optional chained child.
///
/// Rules are built during configuration loading and frozen before evaluation;
/// every execution method takes `&self` and writes only to the transaction.
pub struct Rule {
    /// Rule id, 0 while unassigned (chain links without an `id` action).
    id: u64,
    phase: Phase,
    matcher: Option<Arc<dyn Matcher>>,
    actions: ActionSet,
    /// SecDefaultAction overlay. Consulted only where the own set is silent.
    default_actions: ActionSet,
    severity: Option<u8>,
    maturity: Option<u8>,
    accuracy: Option<u8>,
    revision: Option<String>,
    version: Option<String>,
    msg: Option<RuntimeString>,
    log_data: Option<RuntimeString>,
    xml_namespaces: Vec<XmlNamespace>,
    contains_capture: bool,
    /// Whether a `chain` action declared the next rule to be our child.
    is_chained: bool,
    /// Owned child link; dropping a head drops the whole chain.
    chained_child: Option<Box<Rule>>,
    /// Parent id, traversal only. Never followed for destruction.
    chained_parent: Option<u64>,
    file_name: Option<String>,
    line_number: u32,
}

impl Rule {
    /// Build a rule from its action list and transformation pipeline.
    ///
    /// Rule-level metadata actions (id, phase, severity, msg, ...) become
    /// fields; everything else is routed into the own action set. Metadata
    /// values outside their documented ranges are rejected.
    pub fn new(
        actions: Vec<Action>,
        transformations: Option<TransformationPipeline>,
        file_name: Option<String>,
        line_number: u32,
    ) -> Result<Self> {
        let mut rule = Self {
            id: 0,
            phase: Phase::RequestBody,
            matcher: None,
            actions: ActionSet::new(transformations),
            default_actions: ActionSet::new(None),
            severity: None,
            maturity: None,
            accuracy: None,
            revision: None,
            version: None,
            msg: None,
            log_data: None,
            xml_namespaces: Vec::new(),
            contains_capture: false,
            is_chained: false,
            chained_child: None,
            chained_parent: None,
            file_name,
            line_number,
        };

        for action in actions {
            match action {
                Action::Metadata(MetadataAction::Id(id)) => rule.id = id,
                Action::Metadata(MetadataAction::Phase(number)) => {
                    rule.phase = Phase::from_number(number).ok_or(Error::ValueOutOfRange {
                        what: "phase",
                        value: number,
                        min: 1,
                        max: 5,
                    })?;
                }
                Action::Metadata(MetadataAction::Severity(value)) => {
                    if value > 7 {
                        return Err(Error::ValueOutOfRange {
                            what: "severity",
                            value,
                            min: 0,
                            max: 7,
                        });
                    }
                    rule.severity = Some(value);
                }
                Action::Metadata(MetadataAction::Maturity(value)) => {
                    if !(1..=9).contains(&value) {
                        return Err(Error::ValueOutOfRange {
                            what: "maturity",
                            value,
                            min: 1,
                            max: 9,
                        });
                    }
                    rule.maturity = Some(value);
                }
                Action::Metadata(MetadataAction::Accuracy(value)) => {
                    if !(1..=9).contains(&value) {
                        return Err(Error::ValueOutOfRange {
                            what: "accuracy",
                            value,
                            min: 1,
                            max: 9,
                        });
                    }
                    rule.accuracy = Some(value);
                }
                Action::Metadata(MetadataAction::Rev(rev)) => rule.revision = Some(rev),
                Action::Metadata(MetadataAction::Ver(ver)) => rule.version = Some(ver),
                Action::Metadata(MetadataAction::Msg(msg)) => rule.msg = Some(msg),
                Action::Metadata(MetadataAction::LogData(data)) => rule.log_data = Some(data),
                Action::Metadata(MetadataAction::XmlNs(ns)) => rule.xml_namespaces.push(ns),
                Action::Flow(FlowAction::Chain) => rule.is_chained = true,
                Action::Data(DataAction::Capture) => rule.contains_capture = true,
                other => rule.actions.add_action(other),
            }
        }

        rule.populate();
        Ok(rule)
    }

    /// Inject the matching engine. Rules without a matcher match every
    /// transaction unconditionally.
    pub fn set_matcher(&mut self, matcher: Arc<dyn Matcher>) {
        self.matcher = Some(matcher);
    }

    /// Rule id (0 = unassigned).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Assign the rule id and re-bind deferred strings to the new identity.
    pub fn set_id(&mut self, id: u64) {
        self.id = id;
        self.populate();
    }

    /// The phase this rule runs in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Rule severity, if set (0 emergency .. 7 debug).
    pub fn severity(&self) -> Option<u8> {
        self.severity
    }

    /// Rule maturity, if set (1..9).
    pub fn maturity(&self) -> Option<u8> {
        self.maturity
    }

    /// Rule accuracy, if set (1..9).
    pub fn accuracy(&self) -> Option<u8> {
        self.accuracy
    }

    /// Rule revision string, if set.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Rule version string, if set.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The `msg` template, if set.
    pub fn msg(&self) -> Option<&RuntimeString> {
        self.msg.as_ref()
    }

    /// The `logdata` template, if set.
    pub fn log_data(&self) -> Option<&RuntimeString> {
        self.log_data.as_ref()
    }

    /// Registered XML namespaces.
    pub fn xml_namespaces(&self) -> &[XmlNamespace] {
        &self.xml_namespaces
    }

    /// Source file this rule was loaded from.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Source line this rule was loaded from.
    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    /// Whether a `capture` action is present.
    pub fn has_capture_action(&self) -> bool {
        self.contains_capture
    }

    /// Whether a `chain` action declared the next rule to be our child.
    pub fn is_chained(&self) -> bool {
        self.is_chained
    }

    /// The owned chained child, if any.
    pub fn chained_child(&self) -> Option<&Rule> {
        self.chained_child.as_deref()
    }

    /// Mutable access to the chained child.
    pub fn chained_child_mut(&mut self) -> Option<&mut Rule> {
        self.chained_child.as_deref_mut()
    }

    /// Attach a child link, taking ownership and recording the back handle.
    pub fn set_chained_child(&mut self, mut child: Rule) {
        child.chained_parent = Some(self.id);
        self.chained_child = Some(Box::new(child));
    }

    /// Id of the chain parent, if this rule is a child link.
    pub fn chained_parent(&self) -> Option<u64> {
        self.chained_parent
    }

    /// The deepest link of this chain (self when unchained).
    pub fn last_chain_link_mut(&mut self) -> &mut Rule {
        match self.chained_child {
            Some(ref mut child) => child.last_chain_link_mut(),
            None => self,
        }
    }

    /// Merge one action from a SecDefaultAction template.
    ///
    /// Routes into the default set only, never into the own properties.
    /// Rule metadata actions are rejected: defaults may carry a disruptive
    /// action, flags, setvar, tag, ctl, and transformations, but not an
    /// identity.
    pub fn add_default_action(&mut self, action: Action) -> Result<()> {
        if !crate::actions::default_action_allowed(&action) {
            return Err(Error::ActionNotAllowedInDefaults {
                action: action.name().to_string(),
            });
        }
        self.default_actions.add_action(action);
        self.populate();
        Ok(())
    }

    /// Drop the inherited default-action overlay.
    pub fn clear_default_actions(&mut self) {
        self.default_actions.clear();
    }

    /// Re-bind every owned deferred string to this rule's current identity.
    ///
    /// Must run before evaluation whenever the identity changed (after
    /// construction, cloning, `set_id`, default-action merges).
    pub fn populate(&mut self) {
        let info = self.rule_info();
        self.actions.populate(Some(&info));
        self.default_actions.populate(Some(&info));
        if let Some(msg) = &mut self.msg {
            msg.populate(Some(&info));
        }
        if let Some(log_data) = &mut self.log_data {
            log_data.populate(Some(&info));
        }
    }

    fn rule_info(&self) -> RuleInfo {
        RuleInfo {
            id: self.id,
            revision: self.revision.clone(),
            version: self.version.clone(),
            severity: self.severity,
            maturity: self.maturity,
            accuracy: self.accuracy,
            file_name: self.file_name.clone(),
            line_number: self.line_number,
        }
    }

    /// Own disruptive action if present, else the default's.
    pub fn disruptive_action(&self) -> Option<&DisruptiveAction> {
        self.actions
            .disruptive()
            .or_else(|| self.default_actions.disruptive())
    }

    /// Whether a disruptive action is present, own or inherited.
    pub fn has_disruptive_action(&self) -> bool {
        self.disruptive_action().is_some()
    }

    /// Whether a static `block` was seen, own or inherited.
    pub fn has_block_action(&self) -> bool {
        self.actions.contains_block() || self.default_actions.contains_block()
    }

    /// Whether `multiMatch` was seen, own or inherited.
    pub fn has_multimatch_action(&self) -> bool {
        self.actions.contains_multi_match() || self.default_actions.contains_multi_match()
    }

    /// Whether the rule's own actions include `log`.
    pub fn has_log_action(&self) -> bool {
        self.actions.contains_log()
    }

    /// Whether the rule's own actions include `nolog`.
    pub fn has_no_log_action(&self) -> bool {
        self.actions.contains_no_log()
    }

    /// Whether the rule's own actions include `auditlog`.
    pub fn has_audit_log_action(&self) -> bool {
        self.actions.contains_audit_log()
    }

    /// Whether the rule's own actions include `noauditlog`.
    pub fn has_no_audit_log_action(&self) -> bool {
        self.actions.contains_no_audit_log()
    }

    /// Whether a match of this rule is written to the match log.
    ///
    /// Own `nolog` is an absolute veto; a default `nolog` silences the rule
    /// unless nothing disruptive is there to report anyway. Order matters.
    pub fn is_it_to_be_logged(&self) -> bool {
        if self.has_no_log_action() {
            return false;
        }
        if self.default_actions.contains_no_log() {
            return false;
        }
        if !self.has_disruptive_action() && !self.has_block_action() {
            return false;
        }
        true
    }

    /// Whether a match of this rule marks the transaction for audit logging.
    ///
    /// First match wins: own `auditlog`, then an un-vetoed default
    /// `auditlog`, then the match-log decision.
    pub fn is_it_to_be_audit_logged(&self) -> bool {
        if self.has_audit_log_action() {
            return true;
        }
        if self.default_actions.contains_audit_log() && !self.has_no_audit_log_action() {
            return true;
        }
        self.is_it_to_be_logged()
    }

    /// Whether any tag (own or inherited) resolves to `name`.
    pub fn contains_tag(&self, name: &str, tx: &Transaction) -> bool {
        self.default_actions
            .tag_actions()
            .chain(self.actions.tag_actions())
            .any(|action| match action {
                Action::Metadata(MetadataAction::Tag(tag)) => tag.resolve(tx) == name,
                _ => false,
            })
    }

    /// Whether the rule's `msg` resolves to `name`.
    pub fn contains_msg(&self, name: &str, tx: &Transaction) -> bool {
        self.msg.as_ref().is_some_and(|msg| msg.resolve(tx) == name)
    }

    /// Evaluate this rule's condition against the transaction.
    ///
    /// Returns whether this link matched, independent of any chained child;
    /// the walker composes chain results. On a match the transformed value
    /// is stored as the matched variable and staged captures are committed
    /// when a `capture` action is present.
    pub fn evaluate(&self, tx: &mut Transaction) -> bool {
        tx.clear_captures();

        let Some(matcher) = self.matcher.as_ref() else {
            // No condition compiled in: matches unconditionally.
            return true;
        };

        for (name, value) in matcher.candidates(tx) {
            let mut results = TransformationResults::new();
            self.execute_transformations(&value, &mut results);

            let matched_value = if self.has_multimatch_action() {
                // The untransformed value and every intermediate step each
                // get a chance.
                std::iter::once(value.as_str())
                    .chain(results.iter().map(|r| r.value.as_str()))
                    .find(|candidate| matcher.matches(tx, candidate))
                    .map(str::to_string)
            } else {
                let final_value = results.last().map_or(value.as_str(), |r| r.value.as_str());
                matcher
                    .matches(tx, final_value)
                    .then(|| final_value.to_string())
            };

            if let Some(matched) = matched_value {
                tx.set_matched_var(name, matched);
                if self.contains_capture {
                    tx.commit_captures();
                }
                return true;
            }
        }

        false
    }

    /// Apply the transformation sequence to `input`, recording one result
    /// per step.
    ///
    /// Inherited default transformations run first unless the own sequence
    /// was reset with `t:none`; the own sequence always runs after.
    pub fn execute_transformations(&self, input: &str, results: &mut TransformationResults) {
        if !self.actions.transformations().has_none_reset() {
            for transformation in self.default_actions.transformations().transformations() {
                Self::execute_transformation_chained(transformation.as_ref(), input, results);
            }
        }
        for transformation in self.actions.transformations().transformations() {
            Self::execute_transformation_chained(transformation.as_ref(), input, results);
        }
    }

    /// Apply one transformation to an explicit input and record the result.
    ///
    /// A failed transformation is recorded with `success: false` and the
    /// input value carried over unchanged; the sequence never aborts.
    pub fn execute_transformation(
        transformation: &dyn Transformation,
        input: &str,
        results: &mut TransformationResults,
    ) {
        let (value, success) = transformation.transform(input);
        if !success {
            tracing::debug!(
                transformation = transformation.name(),
                "transformation failed, keeping prior value"
            );
        }
        let value = if success {
            value.into_owned()
        } else {
            input.to_string()
        };
        results.push(TransformationResult {
            value,
            name: transformation.name(),
            success,
        });
    }

    /// Apply one transformation to the last recorded value, falling back to
    /// `original` when the sequence is still empty.
    pub fn execute_transformation_chained(
        transformation: &dyn Transformation,
        original: &str,
        results: &mut TransformationResults,
    ) {
        if let Some(last) = results.last() {
            let input = last.value.clone();
            Self::execute_transformation(transformation, &input, results);
        } else {
            Self::execute_transformation(transformation, original, results);
        }
    }

    /// Run the actions that fire for this link alone, whether or not the
    /// rest of the chain eventually matches.
    pub fn execute_actions_independent_of_chained_rule_result(&self, tx: &mut Transaction) {
        for action in self.actions.set_var_actions() {
            action.execute(tx);
        }
        for action in self.default_actions.set_var_actions() {
            action.execute(tx);
        }
    }

    /// Run the actions that fire once the entire chain has matched.
    ///
    /// Called exactly once per full match, on the chain head. The
    /// override-resolved disruptive action goes last so every side effect
    /// lands before the transaction is disposed.
    pub fn execute_actions_after_full_match(&self, tx: &mut Transaction) {
        for action in self.default_actions.positional_actions() {
            action.execute(tx);
        }
        for action in self.actions.positional_actions() {
            action.execute(tx);
        }

        if let Some(severity) = self.severity {
            tx.update_highest_severity(severity);
        }

        if self.is_it_to_be_audit_logged() {
            tx.mark_for_audit();
        }

        let message = self.build_message(tx);
        if self.is_it_to_be_logged() {
            tracing::info!(rule_id = self.id, msg = %message.message, "rule matched");
            tx.add_message(message);
        }

        self.execute_disruptive(tx);
    }

    fn build_message(&self, tx: &Transaction) -> RuleMessage {
        let mut message = RuleMessage {
            rule_id: self.id,
            phase: self.phase,
            severity: self.severity,
            maturity: self.maturity,
            accuracy: self.accuracy,
            revision: self.revision.clone(),
            version: self.version.clone(),
            file_name: self.file_name.clone(),
            line_number: self.line_number,
            ..RuleMessage::default()
        };
        if let Some(msg) = &self.msg {
            message.message = msg.resolve(tx);
        }
        if let Some(log_data) = &self.log_data {
            message.log_data = log_data.resolve(tx);
        }
        for action in self
            .default_actions
            .tag_actions()
            .chain(self.actions.tag_actions())
        {
            if let Action::Metadata(MetadataAction::Tag(tag)) = action {
                message.tags.push(tag.resolve(tx));
            }
        }
        if let Some((_, value)) = tx.matched_var() {
            message.matched = value.to_string();
        }
        message.is_disruptive = self
            .disruptive_action()
            .is_some_and(DisruptiveAction::is_blocking);
        message
    }

    fn execute_disruptive(&self, tx: &mut Transaction) {
        let Some(disruptive) = self.disruptive_action() else {
            return;
        };
        if tx.mode() == RuleEngineMode::DetectionOnly {
            tracing::debug!(
                rule_id = self.id,
                "detection-only mode, disruptive action not executed"
            );
            return;
        }
        match disruptive {
            DisruptiveAction::Deny { status } => {
                let status = status.unwrap_or(tx.default_status());
                let mut intervention = Intervention::deny(status, self.phase, Some(self.id));
                if let Some(msg) = &self.msg {
                    intervention.set_log(msg.resolve(tx));
                }
                tx.set_intervention(intervention);
            }
            DisruptiveAction::Drop => {
                tx.set_intervention(Intervention::drop(self.phase, Some(self.id)));
            }
            DisruptiveAction::Redirect { status, target } => {
                let url = target.resolve(tx);
                tx.set_intervention(Intervention::redirect(
                    *status,
                    url,
                    self.phase,
                    Some(self.id),
                ));
            }
            DisruptiveAction::Allow(scope) => {
                tx.allow(*scope);
            }
            // pass is a no-op and block never occupies the slot.
            DisruptiveAction::Pass | DisruptiveAction::Block => {}
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("has_matcher", &self.matcher.is_some())
            .field("is_chained", &self.is_chained)
            .field("chained_child", &self.chained_child)
            .finish()
    }
}

impl Clone for Rule {
    fn clone(&self) -> Self {
        let mut copy = Self {
            id: self.id,
            phase: self.phase,
            matcher: self.matcher.clone(),
            actions: self.actions.clone(),
            default_actions: self.default_actions.clone(),
            severity: self.severity,
            maturity: self.maturity,
            accuracy: self.accuracy,
            revision: self.revision.clone(),
            version: self.version.clone(),
            msg: self.msg.clone(),
            log_data: self.log_data.clone(),
            xml_namespaces: self.xml_namespaces.clone(),
            contains_capture: self.contains_capture,
            is_chained: self.is_chained,
            chained_child: self.chained_child.clone(),
            chained_parent: self.chained_parent,
            file_name: self.file_name.clone(),
            line_number: self.line_number,
        };
        copy.populate();
        copy
    }
}
