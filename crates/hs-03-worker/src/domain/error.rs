//! Error types for the Worker subsystem.

/// Worker error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerError {
    /// The directive queue is at capacity; the queen must redispatch.
    #[error("Directive queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The worker has not completed its initial connection.
    #[error("Worker is not connected")]
    NotConnected,

    /// The worker is in degraded mode and accepts no new directives.
    #[error("Worker is degraded")]
    Degraded,
}

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;
