use thiserror::Error;

/// A raw task record that does not have the shape Todoist documents.
#[derive(Debug, Error)]
#[error("Malformed task {id}: {reason}")]
pub struct MalformedTaskError {
    /// Identifier of the offending record, or `<unknown>` when it has none.
    pub id: String,
    pub reason: String,
}

/// Failures of the Todoist task fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure: timeout, DNS, connection reset, TLS.
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Todoist answered with a non-2xx status.
    #[error("Todoist returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The response envelope was not the expected JSON.
    #[error("Invalid response body: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    #[error(transparent)]
    Malformed(#[from] MalformedTaskError),
}

impl FetchError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Upstream { status, .. } => *status == 429 || *status >= 500,
            FetchError::InvalidResponse(_) | FetchError::Malformed(_) => false,
        }
    }
}

/// Errors surfaced by a tool to the protocol layer.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Todoist request failed: {0}")]
    Execution(#[from] FetchError),

    #[error("Failed to encode tool result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ToolError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Execution(e) if e.is_retryable())
    }
}

/// Reasons the bearer-token gate turns a call away.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthRejected {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid bearer token")]
    InvalidToken,

    #[error("Client {client_id} lacks required scope {scope}")]
    InsufficientScope { client_id: String, scope: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_message_carries_status_and_body() {
        let err = ToolError::from(FetchError::Upstream {
            status: 500,
            body: "boom".to_owned(),
        });
        assert_eq!(
            err.to_string(),
            "Todoist request failed: Todoist returned status 500: boom"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        let upstream = |status| FetchError::Upstream {
            status,
            body: String::new(),
        };
        assert!(upstream(429).is_retryable());
        assert!(upstream(503).is_retryable());
        assert!(!upstream(401).is_retryable());
        assert!(!upstream(404).is_retryable());

        let malformed = FetchError::from(MalformedTaskError {
            id: "1".to_owned(),
            reason: "missing field `content`".to_owned(),
        });
        assert!(!malformed.is_retryable());
        assert!(!ToolError::InvalidParams("limit".to_owned()).is_retryable());
    }
}
