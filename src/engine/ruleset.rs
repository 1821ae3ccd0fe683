//! Rule sets: phase-bucketed chain heads, default-action templates, and the
//! chain walker.

use crate::actions::{Action, AllowScope, MetadataAction};
use crate::error::{Error, Result};

use super::phase::Phase;
use super::rule::Rule;
use super::transaction::Transaction;
use std::collections::{HashMap, HashSet};

/// Rule engine operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEngineMode {
    /// Rules are enabled and will block.
    On,
    /// Rules are enabled but will only detect.
    DetectionOnly,
    /// Rules are disabled.
    Off,
}

impl Default for RuleEngineMode {
    fn default() -> Self {
        RuleEngineMode::On
    }
}

/// An ordered collection of rules ready for transaction processing.
///
/// Chains are assembled at insertion time: a rule carrying `chain` leaves the
/// chain open, and the next rule added in the same phase becomes its child
/// rather than a new head. Only heads are stored per phase; children live
/// inside their parent.
pub struct RuleSet {
    by_phase: HashMap<Phase, Vec<Rule>>,
    /// Per-phase SecDefaultAction templates, merged into rules on insert.
    default_actions: HashMap<Phase, Vec<Action>>,
    mode: RuleEngineMode,
    /// Phase and head index of a chain still waiting for its next link.
    open_chain: Option<(Phase, usize)>,
    ids: HashSet<u64>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self {
            by_phase: HashMap::new(),
            default_actions: HashMap::new(),
            mode: RuleEngineMode::default(),
            open_chain: None,
            ids: HashSet::new(),
        }
    }

    /// The engine mode applied to transactions created from this set.
    pub fn mode(&self) -> RuleEngineMode {
        self.mode
    }

    /// Change the engine mode.
    pub fn set_mode(&mut self, mode: RuleEngineMode) {
        self.mode = mode;
    }

    /// Replace the default-action template for the phase named inside
    /// `actions` (phase 2 when unnamed).
    ///
    /// The template is validated once here; actions that carry rule identity
    /// are rejected. Later rules of that phase inherit the template on
    /// insert. Replaces, never merges with, an earlier template.
    pub fn set_default_actions(&mut self, actions: Vec<Action>) -> Result<()> {
        let mut phase = Phase::RequestBody;
        let mut template = Vec::new();

        for action in actions {
            match action {
                Action::Metadata(MetadataAction::Phase(number)) => {
                    phase = Phase::from_number(number).ok_or(Error::ValueOutOfRange {
                        what: "phase",
                        value: number,
                        min: 1,
                        max: 5,
                    })?;
                }
                other => {
                    if !crate::actions::default_action_allowed(&other) {
                        return Err(Error::ActionNotAllowedInDefaults {
                            action: other.name().to_string(),
                        });
                    }
                    template.push(other);
                }
            }
        }

        self.default_actions.insert(phase, template);
        Ok(())
    }

    /// Add a rule, merging the phase's default-action template and attaching
    /// it as a chain link when a chain is open.
    pub fn add_rule(&mut self, mut rule: Rule) -> Result<()> {
        if rule.id() != 0 && !self.ids.insert(rule.id()) {
            return Err(Error::DuplicateRuleId { id: rule.id() });
        }

        if let Some(template) = self.default_actions.get(&rule.phase()) {
            for action in template.clone() {
                rule.add_default_action(action)?;
            }
        }

        if let Some((phase, index)) = self.open_chain.take() {
            if rule.phase() != phase {
                // The chain is still waiting for a link.
                self.open_chain = Some((phase, index));
                return Err(Error::ChainPhaseMismatch {
                    expected: phase.number(),
                    found: rule.phase().number(),
                });
            }
            let still_open = rule.is_chained();
            if let Some(head) = self
                .by_phase
                .get_mut(&phase)
                .and_then(|rules| rules.get_mut(index))
            {
                head.last_chain_link_mut().set_chained_child(rule);
                if still_open {
                    self.open_chain = Some((phase, index));
                }
                return Ok(());
            }
        }

        let phase = rule.phase();
        let still_open = rule.is_chained();
        let rules = self.by_phase.entry(phase).or_default();
        rules.push(rule);
        if still_open {
            self.open_chain = Some((phase, rules.len() - 1));
        }
        Ok(())
    }

    /// Check structural completeness after loading.
    pub fn validate(&self) -> Result<()> {
        if self.open_chain.is_some() {
            return Err(Error::IncompleteChain);
        }
        Ok(())
    }

    /// Chain heads registered for a phase.
    pub fn rules_for_phase(&self, phase: Phase) -> &[Rule] {
        self.by_phase
            .get(&phase)
            .map(|rules| rules.as_slice())
            .unwrap_or(&[])
    }

    /// Total rule count, chain links included.
    pub fn rule_count(&self) -> usize {
        fn count(rule: &Rule) -> usize {
            1 + rule.chained_child().map_or(0, count)
        }
        self.by_phase.values().flatten().map(count).sum()
    }

    /// Create a transaction carrying this set's engine mode.
    pub fn new_transaction(&self) -> Transaction {
        Transaction::new(self.mode)
    }

    /// Run one phase of rules against the transaction.
    ///
    /// Stops at the first intervention or at an `allow` scope covering this
    /// phase. Each chain head is walked link by link: a link that fails to
    /// match aborts its chain; a fully matched chain fires the head's
    /// after-match actions exactly once.
    pub fn evaluate_phase(&self, tx: &mut Transaction, phase: Phase) {
        if self.mode == RuleEngineMode::Off {
            return;
        }
        tx.set_phase(phase);

        let Some(rules) = self.by_phase.get(&phase) else {
            return;
        };
        for head in rules {
            if tx.has_intervention() || allow_applies(tx.allow_scope(), phase) {
                break;
            }
            walk_chain(head, tx);
        }
    }

    /// Run every phase in order against the transaction.
    pub fn evaluate(&self, tx: &mut Transaction) {
        for &phase in Phase::all() {
            self.evaluate_phase(tx, phase);
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an `allow` scope granted earlier suppresses this phase.
fn allow_applies(scope: Option<AllowScope>, phase: Phase) -> bool {
    match scope {
        // Logging always runs, even for an allowed transaction.
        Some(AllowScope::Full) => phase != Phase::Logging,
        Some(AllowScope::Request) => phase.is_request_phase(),
        // Cleared on the next phase change; reaching here means it was
        // granted during the current phase.
        Some(AllowScope::Phase) => true,
        None => false,
    }
}

/// Walk one chain: every link must match for the head's after-match actions
/// to fire; per-link actions fire as each link matches.
fn walk_chain(head: &Rule, tx: &mut Transaction) {
    let mut link = head;
    loop {
        if !link.evaluate(tx) {
            return;
        }
        link.execute_actions_independent_of_chained_rule_result(tx);
        match link.chained_child() {
            Some(child) => link = child,
            None => break,
        }
    }
    head.execute_actions_after_full_match(tx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{DataAction, DisruptiveAction, FlowAction, SetVar};
    use crate::engine::rule::Matcher;
    use crate::runtime_string::RuntimeString;
    use crate::variables::Collection;
    use std::sync::Arc;

    struct NeverMatches;

    impl Matcher for NeverMatches {
        fn candidates(&self, _tx: &Transaction) -> Vec<(String, String)> {
            vec![("ARGS:q".to_string(), "value".to_string())]
        }

        fn matches(&self, _tx: &mut Transaction, _value: &str) -> bool {
            false
        }
    }

    fn rts(s: &str) -> RuntimeString {
        RuntimeString::parse(s).unwrap()
    }

    fn rule(actions: Vec<Action>) -> Rule {
        Rule::new(actions, None, None, 0).unwrap()
    }

    fn id(n: u64) -> Action {
        Action::Metadata(MetadataAction::Id(n))
    }

    fn phase(n: u8) -> Action {
        Action::Metadata(MetadataAction::Phase(n))
    }

    fn mark(key: &str) -> Action {
        Action::Data(DataAction::SetVar(SetVar::set_default(rts(key))))
    }

    #[test]
    fn test_rules_bucketed_by_phase() {
        let mut ruleset = RuleSet::new();
        ruleset.add_rule(rule(vec![id(1), phase(1)])).unwrap();
        ruleset.add_rule(rule(vec![id(2), phase(2)])).unwrap();
        ruleset.add_rule(rule(vec![id(3), phase(2)])).unwrap();

        assert_eq!(ruleset.rules_for_phase(Phase::RequestHeaders).len(), 1);
        assert_eq!(ruleset.rules_for_phase(Phase::RequestBody).len(), 2);
        assert_eq!(ruleset.rule_count(), 3);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut ruleset = RuleSet::new();
        ruleset.add_rule(rule(vec![id(7)])).unwrap();
        assert!(matches!(
            ruleset.add_rule(rule(vec![id(7)])),
            Err(Error::DuplicateRuleId { id: 7 })
        ));
    }

    #[test]
    fn test_chain_assembled_on_insert() {
        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![id(1), Action::Flow(FlowAction::Chain)]))
            .unwrap();
        ruleset
            .add_rule(rule(vec![Action::Flow(FlowAction::Chain)]))
            .unwrap();
        ruleset.add_rule(rule(vec![])).unwrap();

        assert!(ruleset.validate().is_ok());
        let heads = ruleset.rules_for_phase(Phase::RequestBody);
        assert_eq!(heads.len(), 1);
        assert_eq!(ruleset.rule_count(), 3);

        let child = heads[0].chained_child().unwrap();
        assert_eq!(child.chained_parent(), Some(1));
        assert!(child.chained_child().is_some());
    }

    #[test]
    fn test_chain_phase_mismatch_rejected() {
        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![id(1), phase(1), Action::Flow(FlowAction::Chain)]))
            .unwrap();
        assert!(matches!(
            ruleset.add_rule(rule(vec![phase(2)])),
            Err(Error::ChainPhaseMismatch {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn test_incomplete_chain_detected() {
        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![id(1), Action::Flow(FlowAction::Chain)]))
            .unwrap();
        assert!(matches!(ruleset.validate(), Err(Error::IncompleteChain)));
    }

    #[test]
    fn test_default_actions_merged_on_insert() {
        let mut ruleset = RuleSet::new();
        ruleset
            .set_default_actions(vec![
                phase(2),
                Action::Disruptive(DisruptiveAction::Block),
            ])
            .unwrap();
        ruleset.add_rule(rule(vec![id(1), phase(2)])).unwrap();
        ruleset.add_rule(rule(vec![id(2), phase(1)])).unwrap();

        assert!(ruleset.rules_for_phase(Phase::RequestBody)[0].has_block_action());
        assert!(!ruleset.rules_for_phase(Phase::RequestHeaders)[0].has_block_action());
    }

    #[test]
    fn test_default_actions_replaced_not_merged() {
        let mut ruleset = RuleSet::new();
        ruleset
            .set_default_actions(vec![
                phase(2),
                Action::Disruptive(DisruptiveAction::Block),
            ])
            .unwrap();
        ruleset.set_default_actions(vec![phase(2)]).unwrap();
        ruleset.add_rule(rule(vec![id(1), phase(2)])).unwrap();

        assert!(!ruleset.rules_for_phase(Phase::RequestBody)[0].has_block_action());
    }

    #[test]
    fn test_default_actions_reject_rule_identity() {
        let mut ruleset = RuleSet::new();
        assert!(matches!(
            ruleset.set_default_actions(vec![id(5)]),
            Err(Error::ActionNotAllowedInDefaults { .. })
        ));
    }

    #[test]
    fn test_evaluate_runs_unconditional_rule() {
        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![
                id(1),
                phase(1),
                Action::Disruptive(DisruptiveAction::deny()),
            ]))
            .unwrap();

        let mut tx = ruleset.new_transaction();
        ruleset.evaluate(&mut tx);

        let intervention = tx.intervention().unwrap();
        assert_eq!(intervention.status, 403);
        assert_eq!(intervention.rule_id, Some(1));
        assert_eq!(intervention.phase, Phase::RequestHeaders);
    }

    #[test]
    fn test_intervention_stops_remaining_rules() {
        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![
                id(1),
                mark("first"),
                Action::Disruptive(DisruptiveAction::deny()),
            ]))
            .unwrap();
        ruleset.add_rule(rule(vec![id(2), mark("second")])).unwrap();

        let mut tx = ruleset.new_transaction();
        ruleset.evaluate_phase(&mut tx, Phase::RequestBody);

        assert!(tx.has_intervention());
        assert_eq!(tx.tx().first("first"), Some("1"));
        assert_eq!(tx.tx().first("second"), None);
    }

    #[test]
    fn test_chain_aborts_on_non_matching_link() {
        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![
                id(1),
                mark("head_seen"),
                Action::Flow(FlowAction::Chain),
                Action::Disruptive(DisruptiveAction::deny()),
            ]))
            .unwrap();
        let mut link = rule(vec![mark("link_seen")]);
        link.set_matcher(Arc::new(NeverMatches));
        ruleset.add_rule(link).unwrap();

        let mut tx = ruleset.new_transaction();
        ruleset.evaluate_phase(&mut tx, Phase::RequestBody);

        // The head matched, so its per-link actions ran; the chain never
        // completed, so nothing disruptive happened.
        assert_eq!(tx.tx().first("head_seen"), Some("1"));
        assert_eq!(tx.tx().first("link_seen"), None);
        assert!(!tx.has_intervention());
        assert!(tx.messages().is_empty());
    }

    #[test]
    fn test_full_chain_fires_head_actions_once() {
        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![
                id(1),
                mark("head_seen"),
                Action::Flow(FlowAction::Chain),
                Action::Metadata(MetadataAction::Msg(rts("chain hit"))),
                Action::Disruptive(DisruptiveAction::deny()),
            ]))
            .unwrap();
        ruleset.add_rule(rule(vec![mark("link_seen")])).unwrap();

        let mut tx = ruleset.new_transaction();
        ruleset.evaluate_phase(&mut tx, Phase::RequestBody);

        assert_eq!(tx.tx().first("head_seen"), Some("1"));
        assert_eq!(tx.tx().first("link_seen"), Some("1"));
        assert!(tx.has_intervention());
        assert_eq!(tx.messages().len(), 1);
        assert_eq!(tx.messages()[0].message, "chain hit");
    }

    #[test]
    fn test_engine_off_runs_nothing() {
        let mut ruleset = RuleSet::new();
        ruleset.set_mode(RuleEngineMode::Off);
        ruleset
            .add_rule(rule(vec![
                id(1),
                mark("seen"),
                Action::Disruptive(DisruptiveAction::deny()),
            ]))
            .unwrap();

        let mut tx = ruleset.new_transaction();
        ruleset.evaluate(&mut tx);

        assert!(!tx.has_intervention());
        assert_eq!(tx.tx().first("seen"), None);
    }

    #[test]
    fn test_detection_only_detects_without_blocking() {
        let mut ruleset = RuleSet::new();
        ruleset.set_mode(RuleEngineMode::DetectionOnly);
        ruleset
            .add_rule(rule(vec![
                id(1),
                Action::Disruptive(DisruptiveAction::deny()),
            ]))
            .unwrap();

        let mut tx = ruleset.new_transaction();
        ruleset.evaluate(&mut tx);

        assert!(!tx.has_intervention());
        assert_eq!(tx.messages().len(), 1);
    }

    #[test]
    fn test_allow_full_skips_to_logging_phase() {
        use crate::actions::AllowScope;

        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![
                id(1),
                phase(1),
                Action::Disruptive(DisruptiveAction::Allow(AllowScope::Full)),
            ]))
            .unwrap();
        ruleset
            .add_rule(rule(vec![
                id(2),
                phase(2),
                Action::Disruptive(DisruptiveAction::deny()),
            ]))
            .unwrap();
        ruleset
            .add_rule(rule(vec![id(3), phase(5), mark("logged")]))
            .unwrap();

        let mut tx = ruleset.new_transaction();
        ruleset.evaluate(&mut tx);

        assert!(!tx.has_intervention());
        assert_eq!(tx.allow_scope(), Some(AllowScope::Full));
        assert_eq!(tx.tx().first("logged"), Some("1"));
    }

    #[test]
    fn test_allow_request_skips_request_phases_only() {
        use crate::actions::AllowScope;

        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![
                id(1),
                phase(1),
                Action::Disruptive(DisruptiveAction::Allow(AllowScope::Request)),
            ]))
            .unwrap();
        ruleset
            .add_rule(rule(vec![
                id(2),
                phase(2),
                Action::Disruptive(DisruptiveAction::deny()),
            ]))
            .unwrap();
        ruleset
            .add_rule(rule(vec![
                id(3),
                phase(3),
                Action::Disruptive(DisruptiveAction::deny()),
            ]))
            .unwrap();

        let mut tx = ruleset.new_transaction();
        ruleset.evaluate(&mut tx);

        let intervention = tx.intervention().unwrap();
        assert_eq!(intervention.rule_id, Some(3));
        assert_eq!(intervention.phase, Phase::ResponseHeaders);
    }

    #[test]
    fn test_allow_phase_expires_at_next_phase() {
        use crate::actions::AllowScope;

        let mut ruleset = RuleSet::new();
        ruleset
            .add_rule(rule(vec![
                id(1),
                phase(1),
                Action::Disruptive(DisruptiveAction::Allow(AllowScope::Phase)),
            ]))
            .unwrap();
        ruleset
            .add_rule(rule(vec![id(2), phase(1), mark("same_phase")]))
            .unwrap();
        ruleset
            .add_rule(rule(vec![id(3), phase(2), mark("next_phase")]))
            .unwrap();

        let mut tx = ruleset.new_transaction();
        ruleset.evaluate(&mut tx);

        assert_eq!(tx.tx().first("same_phase"), None);
        assert_eq!(tx.tx().first("next_phase"), Some("1"));
    }
}
