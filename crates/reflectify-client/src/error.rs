//! Error types for the generative-text transport.

/// Errors from a [`TextGenerator`](crate::TextGenerator) call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response (connect failure, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with a non-success HTTP status.
    #[error("service returned HTTP {status}")]
    Status { status: u16, body: String },
    /// The service answered successfully but reported a failure, or the
    /// success envelope could not be understood.
    #[error("service error: {0}")]
    Service(String),
}

impl ClientError {
    /// Whether the failure happened before a usable answer reached us.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Status { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
