use thiserror::Error;

/// Errors surfaced by the terminal bridge.
///
/// Every variant is terminal only for the attempt that produced it; the
/// bridge can always `connect()` again afterwards.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No usable credential; no transport was opened.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed abnormally (code {code}): {reason}")]
    AbnormalClosure { code: u16, reason: String },

    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// An `error` frame pushed by the server.
    #[error("{0}")]
    ServerReported(String),

    #[error("invalid endpoint path: {0}")]
    InvalidEndpoint(String),

    #[error("invalid API url: {0}")]
    InvalidUrl(String),
}

impl BridgeError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, BridgeError::AuthRequired(_))
    }
}
