use thiserror::Error;

/// Main error type for the picks pipeline
#[derive(Error, Debug)]
pub enum PicksError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API error: {status} - {body}")]
    Api {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Evidence errors
    #[error("Marker not found in page: {0}")]
    MarkerNotFound(String),

    #[error("Invalid stats payload: {0}")]
    InvalidStats(String),

    // Pipeline errors
    #[error("Retries exhausted at stage {stage} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        stage: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Malformed consensus document: {0}")]
    MalformedConsensus(String),

    #[error("Rendered message over budget after {attempts} attempts ({last_len} > {limit} chars)")]
    RenderBudgetExceeded {
        attempts: u32,
        limit: usize,
        last_len: usize,
    },

    // Delivery errors
    #[error("Publish failed: {0}")]
    Publish(String),

    // Input errors
    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PicksError {
    /// Whether a fresh attempt of the same call could plausibly succeed.
    ///
    /// Transport failures, non-2xx upstream statuses and empty generations are
    /// transient. Configuration, parsing and validation failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            PicksError::Http(_) | PicksError::EmptyResponse(_) => true,
            PicksError::Api { status, .. } => *status == 429 || *status >= 500 || *status == 408,
            _ => false,
        }
    }
}

/// Result type alias for PicksError
pub type Result<T> = std::result::Result<T, PicksError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PicksError::EmptyResponse("claude".into()).is_transient());
        assert!(PicksError::Api {
            service: "claude".into(),
            status: 529,
            body: String::new()
        }
        .is_transient());
        assert!(!PicksError::Api {
            service: "claude".into(),
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!PicksError::MalformedConsensus("eof".into()).is_transient());
        assert!(!PicksError::Validation("bad".into()).is_transient());
    }
}
