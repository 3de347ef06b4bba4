//! Error types for the locomotion core.
//!
//! Nothing here is fatal to a tick. Callers that receive one of these log it
//! and fall back to a safe no-op, so the fixed step always completes.

use thiserror::Error;

/// Errors reported by the locomotion core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// A required collaborator (world, body, platform) is not available.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// A configuration value is outside its usable range.
    #[error("invalid configuration `{field}`: {reason}")]
    InvalidConfiguration {
        field: &'static str,
        reason: String,
    },

    /// Persisted platform state does not match the platform it is restored onto.
    #[error("invalid save state: {0}")]
    InvalidSaveState(String),
}

impl PhysicsError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type PhysicsResult<T> = Result<T, PhysicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PhysicsError::config("travel_time", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration `travel_time`: must be positive"
        );

        let err = PhysicsError::MissingCollaborator("collision world");
        assert_eq!(err.to_string(), "missing collaborator: collision world");
    }
}
