//! Worker abstraction used by sessions

use async_trait::async_trait;
use evald_ipc::{CoordinatorMessage, WorkerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::output::CapturedOutput;

/// Something that happened on a worker's channel
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A message from the worker
    Message(CoordinatorMessage),
    /// A line arrived that could not be decoded as a message
    Malformed { reason: String },
    /// The channel is gone and no further messages will arrive
    Disconnected { reason: String },
}

/// The session's side of one worker process
#[async_trait]
pub trait Worker: Send + Sync {
    /// Identifier of this worker, unique per launch
    fn id(&self) -> &str;

    /// OS process id, when the worker is a process
    fn pid(&self) -> Option<u32>;

    /// Queue a message for the worker without waiting for any reply
    fn send(&self, message: WorkerMessage) -> Result<(), SessionError>;

    /// Take the stdout and stderr text buffered since the last call
    fn take_output(&self) -> CapturedOutput;

    /// Ask the worker to stop, then force it
    async fn terminate(&self);
}

/// A launched worker plus the stream of events it produces
pub struct WorkerLink {
    pub worker: Arc<dyn Worker>,
    pub events: mpsc::UnboundedReceiver<WorkerEvent>,
}

/// Creates one worker per session
pub trait WorkerLauncher: Send + Sync {
    /// Start a worker for `session_id`. Must be called inside a tokio runtime.
    fn launch(&self, session_id: &str) -> Result<WorkerLink, SessionError>;
}
