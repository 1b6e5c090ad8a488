//! Error types for agent links.

use tokio_tungstenite::tungstenite;

/// Errors from opening or running an agent link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    /// The agent answered the handshake with something other than `101`.
    #[error("connection refused: {0}")]
    Refused(String),

    /// A frame could not be written within the write deadline.
    #[error("write timed out after {0:?}")]
    WriteTimeout(std::time::Duration),
}

impl TransportError {
    /// Maps handshake failures, splitting HTTP rejections out of the
    /// generic WebSocket errors.
    pub(crate) fn from_handshake(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => {
                Self::Refused(format!("HTTP {}", response.status()))
            }
            other => Self::Ws(other),
        }
    }
}
