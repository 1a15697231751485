use std::io;
use thiserror::Error;

/// Error type for jobpool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool no longer accepts jobs.
    #[error("worker pool closed")]
    PoolClosed,

    /// The job queue is at capacity.
    #[error("job queue was full")]
    QueueFull,

    /// No handler is registered for the topic.
    #[error("no handler registered for topic '{0}'")]
    UnknownTopic(String),

    /// IO error from sockets, files or thread spawning.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error.
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Error with a plain message, usually relayed from the server.
    #[error("{0}")]
    StringError(String),
}

/// Result type alias for jobpool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
