use thiserror::Error;

/// Failures that stop a load test before any request is dispatched.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Base URL and endpoint do not form a valid URL.
    #[error("invalid target url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Method is not a valid HTTP token.
    #[error("invalid http method `{0}`")]
    InvalidMethod(String),
}

/// Why a single request produced no response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}
