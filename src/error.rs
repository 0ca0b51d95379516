//! Engine error taxonomy
//!
//! Enforcement and store failures are deliberately coarse: the engine either
//! degrades permissively (passive moderation path) or surfaces the denial to
//! the moderator who invoked the command. See the per-variant docs for which
//! side of that line each error falls on.

/// Errors surfaced by the moderation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A non-admin invoked a restricted action.
    Unauthorized,
    /// A command requiring reply-to context was issued without one, or the
    /// referenced target does not match an active session.
    InvalidTarget,
    /// The external classifier did not answer within the configured budget.
    /// The passive path never propagates this: the message is treated as
    /// neutral/clean and the degradation is logged.
    ClassifierTimeout,
    /// An enforcement dispatch (ban, restrict, delete) failed at the
    /// transport. Reputation changes already committed are not rolled back.
    TransportFailure(String),
    /// The persistence layer rejected a write. The triggering operation
    /// fails rather than silently skipping the mutation.
    StoreUnavailable(String),
}

impl EngineError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        EngineError::TransportFailure(err.to_string())
    }

    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        EngineError::StoreUnavailable(err.to_string())
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Unauthorized => {
                write!(f, "not authorized to use this command")
            }
            EngineError::InvalidTarget => {
                write!(f, "command requires a reply to the target's message")
            }
            EngineError::ClassifierTimeout => {
                write!(f, "content classifier timed out")
            }
            EngineError::TransportFailure(e) => {
                write!(f, "enforcement dispatch failed: {}", e)
            }
            EngineError::StoreUnavailable(e) => {
                write!(f, "persistence layer unavailable: {}", e)
            }
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            EngineError::Unauthorized.to_string(),
            "not authorized to use this command"
        );
        assert!(EngineError::TransportFailure("boom".into())
            .to_string()
            .contains("boom"));
    }
}
