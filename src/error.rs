//! Error types for the onboarding agent.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while driving the onboarding dialogue.
///
/// `UnknownExit` and `MalformedPayload` are contract violations by the
/// delegated model; they are never retried.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Exit {exit} is not declared for phase {phase}")]
    UnknownExit { phase: String, exit: String },

    #[error("Payload for exit {exit} does not match its schema: {reason}")]
    MalformedPayload { exit: String, reason: String },

    #[error("Stored onboarding state is corrupt: {raw}")]
    CorruptState { raw: String },

    #[error("More than {limit} immediate transitions in one turn (stopped at {phase})")]
    TransitionLimit { limit: usize, phase: String },

    #[error("Conversation {0} not found")]
    ConversationNotFound(Uuid),
}

impl OnboardingError {
    /// Whether this error means the model broke the exit contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::UnknownExit { .. } | Self::MalformedPayload { .. }
        )
    }
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
