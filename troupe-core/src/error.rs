//! Error types for Troupe operations

use crate::EntityId;
use thiserror::Error;

/// Reasoning-provider errors. Covers auth, rate-limit, transport and
/// malformed-response failures at the LLM boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("No reasoning provider configured")]
    NotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for {provider}: {reason}")]
    AuthFailed { provider: String, reason: String },
}

/// Agent coordination errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not registered: {name}")]
    NotRegistered { name: String },

    #[error("Agent already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Agent {name} is not active (state: {state})")]
    NotActive { name: String, state: String },

    #[error("Agent {name} is at capacity ({active} of {max} tasks)")]
    AtCapacity {
        name: String,
        active: usize,
        max: usize,
    },

    #[error("Task {task_id} not found among active tasks of {name}")]
    TaskNotFound { name: String, task_id: EntityId },

    #[error("Message delivery to {name} failed: {reason}")]
    DeliveryFailed { name: String, reason: String },
}

/// Collaboration workflow errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaborationError {
    #[error("Collaboration has no participants")]
    NoParticipants,

    #[error(
        "Phase '{phase}' requires {required} contributors but only {participants} agents participate"
    )]
    PhaseUnsatisfiable {
        phase: String,
        required: usize,
        participants: usize,
    },

    #[error("Collaboration {id} has not been started")]
    NotStarted { id: EntityId },

    #[error("Collaboration {id} is already terminal ({status})")]
    AlreadyTerminal { id: EntityId, status: String },

    #[error("Agent {name} is not a participant of collaboration {id}")]
    NotAParticipant { id: EntityId, name: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Troupe errors.
#[derive(Debug, Clone, Error)]
pub enum TroupeError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Collaboration error: {0}")]
    Collaboration(#[from] CollaborationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Troupe operations.
pub type TroupeResult<T> = Result<T, TroupeError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_provider_error_display_rate_limited() {
        let err = ProviderError::RateLimited {
            provider: "anthropic".to_string(),
            retry_after_ms: 1500,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Rate limited"));
        assert!(msg.contains("anthropic"));
        assert!(msg.contains("1500"));
    }

    #[test]
    fn test_agent_error_display_at_capacity() {
        let err = AgentError::AtCapacity {
            name: "atlas".to_string(),
            active: 3,
            max: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("atlas"));
        assert!(msg.contains("3 of 3"));
    }

    #[test]
    fn test_collaboration_error_display_unsatisfiable() {
        let err = CollaborationError::PhaseUnsatisfiable {
            phase: "evaluation".to_string(),
            required: 3,
            participants: 2,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("evaluation"));
        assert!(msg.contains("requires 3"));
        assert!(msg.contains("only 2"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "worker_threads".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("worker_threads"));
        assert!(msg.contains("must be at least 1"));
    }

    #[test]
    fn test_troupe_error_from_variants() {
        let provider = TroupeError::from(ProviderError::NotConfigured);
        assert!(matches!(provider, TroupeError::Provider(_)));

        let agent = TroupeError::from(AgentError::NotRegistered {
            name: "ghost".to_string(),
        });
        assert!(matches!(agent, TroupeError::Agent(_)));

        let collab = TroupeError::from(CollaborationError::NoParticipants);
        assert!(matches!(collab, TroupeError::Collaboration(_)));

        let config = TroupeError::from(ConfigError::MissingRequired {
            field: "memory_size".to_string(),
        });
        assert!(matches!(config, TroupeError::Config(_)));
    }

    #[test]
    fn test_task_not_found_includes_id() {
        let id = Uuid::nil();
        let err = AgentError::TaskNotFound {
            name: "atlas".to_string(),
            task_id: id,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }
}
