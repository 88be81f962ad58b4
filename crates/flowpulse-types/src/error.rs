use thiserror::Error;

/// Errors from the durable event store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write stream '{stream}': {message}")]
    WriteFailure { stream: String, message: String },

    #[error("failed to read stream '{stream}': {message}")]
    ReadFailure { stream: String, message: String },

    #[error("storage root unavailable: {0}")]
    Unavailable(String),
}

/// Webhook body failed structural parsing. Never persisted.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("body must be a JSON object")]
    NotAnObject,

    #[error("invalid event: {0}")]
    Invalid(String),

    #[error("workflow_id must not be empty")]
    EmptyWorkflowId,
}

/// Errors while resolving the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("webhook secret is required (set FLOWPULSE_WEBHOOK_SECRET or [webhook].secret)")]
    MissingSecret,

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
