/// Error type shared by every layer of the adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Custom API request failed: {status} {status_text} - {body}")]
    Upstream {
        status: u16,
        status_text: String,
        body: String,
    },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol translation error: {0}")]
    Translation(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Known causes of a failed wire call.
///
/// Retry decisions are keyed on this enum. Matching on upstream error text
/// only ever produces [`FailureCause::ToolIncompatible`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The backend rejected the tool/function payload.
    ToolIncompatible,
    RateLimited,
    Authentication,
    ServerError,
    /// No HTTP response was received.
    Network,
    Other,
}

/// Substrings that mark an upstream error body as a function/schema
/// validation failure.
const TOOL_ERROR_MARKERS: &[&str] = &["function", "tool", "schema", "anyOf", "INTEGER"];

/// Best-effort check whether an upstream error body is about tool calling.
#[must_use]
pub fn body_mentions_tool_failure(body: &str) -> bool {
    TOOL_ERROR_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Map an upstream HTTP status code to a failure cause, ignoring the body.
#[must_use]
pub fn cause_from_upstream_status(status: u16) -> FailureCause {
    match status {
        401 | 403 => FailureCause::Authentication,
        429 => FailureCause::RateLimited,
        500..=599 => FailureCause::ServerError,
        _ => FailureCause::Other,
    }
}

impl AdapterError {
    #[must_use]
    pub fn failure_cause(&self) -> FailureCause {
        match self {
            AdapterError::Upstream { status, body, .. } => {
                if body_mentions_tool_failure(body) {
                    FailureCause::ToolIncompatible
                } else {
                    cause_from_upstream_status(*status)
                }
            }
            AdapterError::Transport(_) => FailureCause::Network,
            AdapterError::Config(_)
            | AdapterError::InvalidEndpoint(_)
            | AdapterError::Translation(_)
            | AdapterError::Unsupported(_) => FailureCause::Other,
        }
    }

    /// Whether this error is the embedding/unsupported-operation kind.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AdapterError::Unsupported(_))
    }
}
