use thiserror::Error;

/// Errors returned by the digest backend client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("API Error: {status} {reason}")]
    Status { status: u16, reason: String },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("JSON decode error for {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// HTTP status code when the backend rejected the request.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
