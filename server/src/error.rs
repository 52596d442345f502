use thiserror::Error;

/// Errors from the relay's listener and upgrade path.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),
}

/// Errors that occur when writing a frame to a connection.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors that occur when reading the next frame from a connection.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The peer closed the session or it was closed locally.
    #[error("connection closed")]
    Closed,

    /// A bounded wait expired before a frame arrived. Distinct from
    /// [`Transport`] so callers can retry instead of abandoning.
    ///
    /// [`Transport`]: ReceiveError::Transport
    #[error("timed out waiting for a frame")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}
