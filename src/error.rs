//! Top-level error types for threadbot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingKey(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from the discussion hosting platform.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("discussion API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Structurally malformed response, or an error-array response that is a
    /// failure even on HTTP 200. `body` has already been redacted.
    #[error("discussion API rejected the request: {message}")]
    Protocol { message: String, body: String },

    /// The structured query surface signalled a missing capability or an
    /// unknown schema member. Retrieval falls back to the REST protocol.
    #[error("query protocol unavailable: {0}")]
    Unsupported(String),

    #[error("not found: {resource}")]
    NotFound { resource: String },
}

/// Errors from the hosted inference service.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected inference response shape: {0}")]
    Malformed(String),
}

impl InferenceError {
    /// Whether a retry could plausibly succeed. Network failures and 5xx
    /// responses are transient; 4xx and malformed payloads are terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            InferenceError::Http(_) => true,
            InferenceError::Status { status, .. } => *status >= 500,
            InferenceError::Malformed(_) => false,
        }
    }
}
