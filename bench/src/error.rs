use thiserror::Error;

/// Errors that end a harness run (or one of its connection tasks).
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The retry budget ran out before the target accepted a connection.
    #[error("dial failed after {attempts} attempts: {last_error}")]
    Dial { attempts: u32, last_error: String },

    /// A connection task panicked or was cancelled.
    #[error("connection task failed: {0}")]
    Task(String),
}
