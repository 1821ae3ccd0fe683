//! Disruptive actions (deny, drop, pass, allow, redirect, block).

use crate::runtime_string::RuntimeString;

/// Scope of an `allow` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowScope {
    /// Skip the remaining request and response phases.
    Full,
    /// Skip the rest of the current phase only.
    Phase,
    /// Skip the remaining request phases.
    Request,
}

/// Disruptive actions.
///
/// At most one occupies a rule's disruptive slot; `block` is not storable,
/// it only requests the inherited default.
#[derive(Debug, Clone)]
pub enum DisruptiveAction {
    /// Deny the request. Without an explicit status the transaction default
    /// applies.
    Deny {
        /// HTTP status to respond with.
        status: Option<u16>,
    },
    /// Drop the connection without a response.
    Drop,
    /// Match without disrupting.
    Pass,
    /// Redirect to a target URL.
    Redirect {
        /// HTTP status to respond with.
        status: u16,
        /// Redirect target, expanded at evaluation time.
        target: RuntimeString,
    },
    /// Stop inspecting and let the request through.
    Allow(AllowScope),
    /// Placeholder that stands for the default disruptive action.
    Block,
}

impl DisruptiveAction {
    /// A deny with the default status.
    pub fn deny() -> Self {
        Self::Deny { status: None }
    }

    /// A 302 redirect to `target`.
    pub fn redirect(target: RuntimeString) -> Self {
        Self::Redirect {
            status: 302,
            target,
        }
    }

    /// Whether this action interrupts the transaction when executed.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::Deny { .. } | Self::Drop | Self::Redirect { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blocking() {
        assert!(DisruptiveAction::deny().is_blocking());
        assert!(DisruptiveAction::Drop.is_blocking());
        assert!(
            DisruptiveAction::redirect(RuntimeString::literal("/blocked")).is_blocking()
        );
        assert!(!DisruptiveAction::Pass.is_blocking());
        assert!(!DisruptiveAction::Allow(AllowScope::Full).is_blocking());
        assert!(!DisruptiveAction::Block.is_blocking());
    }
}
