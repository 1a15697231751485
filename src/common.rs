use serde::{Deserialize, Serialize};

/// Request sent from client to server.
#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    /// Hand a message to the handler registered for its topic.
    Publish {
        /// Topic the message is routed by.
        topic: String,
        /// Message payload.
        body: String,
    },
    /// Liveness check, answered with `"pong"`.
    Ping,
    /// Ask for a [`PoolStats`] snapshot.
    Stats,
}

/// Response sent from server to client.
#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    /// Operation succeeded, optionally with a value.
    Ok(Option<String>),
    /// Operation failed with an error message.
    Err(String),
}

/// Point-in-time view of a pool's gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Whether the pool accepts jobs.
    pub alive: bool,
    /// Jobs waiting in the queue.
    pub job_queue_len: usize,
    /// Jobs submitted but not finished.
    pub working_job_count: usize,
    /// Live workers.
    pub worker_count: usize,
}
