use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    /// Transport failure or timeout. Retryable; never to be treated as
    /// "token inactive".
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with a non-success status.
    #[error("Identity provider rejected the request: status {status}")]
    Rejected { status: u16 },

    /// The provider answered with something unparseable.
    #[error("Unexpected identity provider response: {0}")]
    Response(String),

    #[error("Identity provider configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Rejected {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            Self::Response(err.to_string())
        } else {
            // Timeouts, connect failures, TLS and the like.
            Self::Unavailable(err.to_string())
        }
    }
}
