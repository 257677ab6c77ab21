//! Session error types

use thiserror::Error;

/// Errors delivered to callers of [`crate::Session::run`] and to task handles.
///
/// Evaluation errors raised by user code are not represented here; they
/// arrive as ordinary results carrying an `error` payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Failed to spawn worker for session '{session_id}': {reason}")]
    Spawn { session_id: String, reason: String },

    #[error("Worker for session '{session_id}' is not accepting requests")]
    WorkerUnavailable { session_id: String },

    #[error("Worker for session '{session_id}' exited: {reason}")]
    WorkerExited { session_id: String, reason: String },

    #[error("Worker for session '{session_id}' failed: {message}")]
    Worker { session_id: String, message: String },

    #[error("Worker for session '{session_id}' sent an unreadable reply: {reason}")]
    Protocol { session_id: String, reason: String },

    #[error("Session '{session_id}' is closed")]
    Closed { session_id: String },

    #[error("Session '{session_id}' queue is full ({capacity} tasks waiting)")]
    QueueFull { session_id: String, capacity: usize },

    #[error("Task was dropped before it completed")]
    Abandoned,
}

impl SessionError {
    /// Whether the session that produced this error can still accept work
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionError::Spawn { .. }
                | SessionError::WorkerUnavailable { .. }
                | SessionError::WorkerExited { .. }
                | SessionError::Protocol { .. }
                | SessionError::Closed { .. }
        )
    }
}
