use thiserror::Error;

/// Errors returned by the traffic light.
///
/// The message queue itself never fails; everything here comes from the
/// light's lifecycle or its configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// `simulate` was called while the cycling thread is still running.
    #[error("traffic light #{0} is already cycling")]
    AlreadyRunning(u64),

    /// The light was stopped while a caller was waiting on it.
    #[error("traffic light was stopped")]
    Halted,

    /// A bounded wait expired before the awaited phase change.
    #[error("timed out waiting for the traffic light")]
    Timeout,

    #[error("invalid cycle configuration: {0}")]
    InvalidConfig(String),

    /// The OS refused to start the cycling thread.
    #[error("failed to spawn cycling thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A specialized `Result` type for traffic light operations.
pub type Result<T> = std::result::Result<T, Error>;
