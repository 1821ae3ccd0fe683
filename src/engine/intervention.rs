//! Intervention tracking for blocked requests.

use super::phase::Phase;

/// A blocking decision produced by a disruptive action.
///
/// The embedding server translates this into an actual response; at most
/// one is recorded per transaction and evaluation stops once it exists.
#[derive(Debug, Clone)]
pub struct Intervention {
    /// HTTP status code to return.
    pub status: u16,
    /// Redirect URL (if applicable).
    pub url: Option<String>,
    /// Log message.
    pub log: Option<String>,
    /// Rule that triggered the intervention.
    pub rule_id: Option<u64>,
    /// Phase in which the intervention occurred.
    pub phase: Phase,
    /// Whether to drop the connection without responding.
    pub drop_connection: bool,
}

impl Intervention {
    /// Create a new intervention.
    pub fn new(status: u16, phase: Phase) -> Self {
        Self {
            status,
            url: None,
            log: None,
            rule_id: None,
            phase,
            drop_connection: false,
        }
    }

    /// Create a deny intervention.
    pub fn deny(status: u16, phase: Phase, rule_id: Option<u64>) -> Self {
        let mut intervention = Self::new(status, phase);
        intervention.rule_id = rule_id;
        intervention
    }

    /// Create a redirect intervention.
    pub fn redirect(status: u16, url: String, phase: Phase, rule_id: Option<u64>) -> Self {
        let mut intervention = Self::new(status, phase);
        intervention.url = Some(url);
        intervention.rule_id = rule_id;
        intervention
    }

    /// Create a connection-drop intervention.
    pub fn drop(phase: Phase, rule_id: Option<u64>) -> Self {
        let mut intervention = Self::new(444, phase);
        intervention.drop_connection = true;
        intervention.rule_id = rule_id;
        intervention
    }

    /// Set log message.
    pub fn set_log(&mut self, log: String) {
        self.log = Some(log);
    }

    /// Format as a log entry.
    pub fn format_log(&self) -> String {
        let mut parts = vec![format!("[status {}]", self.status)];

        if let Some(id) = self.rule_id {
            parts.push(format!("[id {}]", id));
        }

        if let Some(ref log) = self.log {
            parts.push(format!("[msg: {}]", log));
        }

        if let Some(ref url) = self.url {
            parts.push(format!("[redirect: {}]", url));
        }

        parts.push(format!("[phase: {}]", self.phase.name()));

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_intervention() {
        let intervention = Intervention::deny(403, Phase::RequestHeaders, Some(12345));
        assert_eq!(intervention.status, 403);
        assert_eq!(intervention.rule_id, Some(12345));
        assert!(!intervention.drop_connection);
    }

    #[test]
    fn test_redirect_intervention() {
        let intervention = Intervention::redirect(
            302,
            "https://example.com/blocked".to_string(),
            Phase::RequestHeaders,
            Some(12345),
        );
        assert_eq!(intervention.status, 302);
        assert_eq!(
            intervention.url,
            Some("https://example.com/blocked".to_string())
        );
    }

    #[test]
    fn test_drop_intervention() {
        let intervention = Intervention::drop(Phase::RequestBody, None);
        assert_eq!(intervention.status, 444);
        assert!(intervention.drop_connection);
    }

    #[test]
    fn test_format_log() {
        let mut intervention = Intervention::deny(403, Phase::RequestHeaders, Some(942100));
        intervention.set_log("SQL injection detected".to_string());
        let log = intervention.format_log();
        assert!(log.contains("[status 403]"));
        assert!(log.contains("[id 942100]"));
        assert!(log.contains("SQL injection detected"));
        assert!(log.contains("REQUEST_HEADERS"));
    }
}
