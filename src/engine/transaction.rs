//! Per-request transaction state.

use super::intervention::Intervention;
use super::message::RuleMessage;
use super::phase::Phase;
use super::ruleset::RuleEngineMode;
use crate::actions::{AllowScope, AuditParts};
use crate::variables::{HashMapCollection, MutableCollection, TxCollection};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TRANSACTION_SERIAL: AtomicU64 = AtomicU64::new(0);

fn next_unique_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let serial = TRANSACTION_SERIAL.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", secs, serial)
}

/// Mutable state accumulated while rules inspect one request.
///
/// The transaction never evaluates anything itself; rules and rule sets
/// read from and write into it.
pub struct Transaction {
    id: String,
    mode: RuleEngineMode,
    phase: Phase,
    tx: TxCollection,
    env: HashMapCollection,
    user_id: Option<String>,
    session_id: Option<String>,
    captures: Vec<String>,
    messages: Vec<RuleMessage>,
    intervention: Option<Intervention>,
    audit_log: bool,
    audit_parts: AuditParts,
    allow_scope: Option<AllowScope>,
    highest_severity: Option<u8>,
    matched_var: Option<(String, String)>,
    default_status: u16,
}

impl Transaction {
    /// Create a transaction with the default block status of 403.
    pub fn new(mode: RuleEngineMode) -> Self {
        Self::with_default_status(mode, 403)
    }

    /// Create a transaction with an explicit default block status.
    pub fn with_default_status(mode: RuleEngineMode, default_status: u16) -> Self {
        Self {
            id: next_unique_id(),
            mode,
            phase: Phase::RequestHeaders,
            tx: TxCollection::new(),
            env: HashMapCollection::new(),
            user_id: None,
            session_id: None,
            captures: Vec::new(),
            messages: Vec::new(),
            intervention: None,
            audit_log: false,
            audit_parts: AuditParts::DEFAULT,
            allow_scope: None,
            highest_severity: None,
            matched_var: None,
            default_status,
        }
    }

    /// The transaction's unique ID, resolvable as `%{unique_id}`.
    pub fn unique_id(&self) -> &str {
        &self.id
    }

    /// The engine mode this transaction runs under.
    pub fn mode(&self) -> RuleEngineMode {
        self.mode
    }

    /// The phase currently being evaluated.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to a phase. A phase-scoped allow expires here.
    pub fn set_phase(&mut self, phase: Phase) {
        if self.allow_scope == Some(AllowScope::Phase) {
            self.allow_scope = None;
        }
        self.phase = phase;
    }

    /// The TX collection.
    pub fn tx(&self) -> &TxCollection {
        &self.tx
    }

    /// Mutable TX collection.
    pub fn tx_mut(&mut self) -> &mut TxCollection {
        &mut self.tx
    }

    /// The environment collection.
    pub fn env(&self) -> &HashMapCollection {
        &self.env
    }

    /// Mutable environment collection.
    pub fn env_mut(&mut self) -> &mut HashMapCollection {
        &mut self.env
    }

    /// Stage capture groups from a matcher.
    pub fn set_captures(&mut self, captures: Vec<String>) {
        self.captures = captures;
    }

    /// Drop staged captures.
    pub fn clear_captures(&mut self) {
        self.captures.clear();
    }

    /// Staged captures.
    pub fn captures(&self) -> &[String] {
        &self.captures
    }

    /// Write staged captures to TX.0 through TX.9.
    pub fn commit_captures(&mut self) {
        for (i, capture) in self.captures.iter().take(10).enumerate() {
            self.tx.set(i.to_string(), capture.clone());
        }
    }

    /// Record the variable the matcher accepted.
    pub fn set_matched_var(&mut self, name: String, value: String) {
        self.matched_var = Some((name, value));
    }

    /// The most recent matched variable, as (name, value).
    pub fn matched_var(&self) -> Option<(&str, &str)> {
        self.matched_var
            .as_ref()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Append a rule message.
    pub fn add_message(&mut self, message: RuleMessage) {
        self.messages.push(message);
    }

    /// Messages collected so far.
    pub fn messages(&self) -> &[RuleMessage] {
        &self.messages
    }

    /// Record a blocking decision. The first one sticks.
    pub fn set_intervention(&mut self, intervention: Intervention) {
        if self.intervention.is_none() {
            self.intervention = Some(intervention);
        }
    }

    /// The blocking decision, if any.
    pub fn intervention(&self) -> Option<&Intervention> {
        self.intervention.as_ref()
    }

    /// Whether a blocking decision exists.
    pub fn has_intervention(&self) -> bool {
        self.intervention.is_some()
    }

    /// Request an audit log entry for this transaction.
    pub fn mark_for_audit(&mut self) {
        self.audit_log = true;
    }

    /// Whether an audit log entry was requested.
    pub fn is_marked_for_audit(&self) -> bool {
        self.audit_log
    }

    /// The audit log parts currently in effect.
    pub fn audit_parts(&self) -> AuditParts {
        self.audit_parts
    }

    /// Mutable audit log parts, for ctl adjustments.
    pub fn audit_parts_mut(&mut self) -> &mut AuditParts {
        &mut self.audit_parts
    }

    /// Let the request through for the given scope.
    pub fn allow(&mut self, scope: AllowScope) {
        self.allow_scope = Some(scope);
    }

    /// The allow scope in effect, if any.
    pub fn allow_scope(&self) -> Option<AllowScope> {
        self.allow_scope
    }

    /// Attach a user identity.
    pub fn set_user_id(&mut self, id: String) {
        self.user_id = Some(id);
    }

    /// The attached user identity.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Attach a session identity.
    pub fn set_session_id(&mut self, id: String) {
        self.session_id = Some(id);
    }

    /// The attached session identity.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Track the most severe rule severity seen (lower is more severe).
    pub fn update_highest_severity(&mut self, severity: u8) {
        self.highest_severity = Some(
            self.highest_severity
                .map_or(severity, |current| current.min(severity)),
        );
    }

    /// The most severe severity seen, if any rule carried one.
    pub fn highest_severity(&self) -> Option<u8> {
        self.highest_severity
    }

    /// Status used when a disruptive action carries none of its own.
    pub fn default_status(&self) -> u16 {
        self.default_status
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("has_intervention", &self.intervention.is_some())
            .field("messages", &self.messages.len())
            .field("audit_log", &self.audit_log)
            .finish()
    }
}
