//! Units of work submitted to a session

use evald_ipc::{Action, ExecutionResult, WorkerRequest};
use std::fmt;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::SessionError;
use crate::session::Session;

/// Caller-supplied callback invoked with the owning session
pub type Hook = Box<dyn FnOnce(&Session) + Send + 'static>;

/// An action, the code it applies to, and optional lifecycle hooks.
///
/// `before_run` fires right before the request is sent. Exactly one of
/// `on_success` and `on_error` fires when the result arrives, followed by
/// `after_run`. Hooks never fire for a task whose worker was lost.
pub struct Task {
    pub(crate) action: Action,
    pub(crate) code: String,
    pub(crate) before_run: Option<Hook>,
    pub(crate) after_run: Option<Hook>,
    pub(crate) on_success: Option<Hook>,
    pub(crate) on_error: Option<Hook>,
}

impl Task {
    pub fn new(action: Action, code: impl Into<String>) -> Self {
        Self {
            action,
            code: code.into(),
            before_run: None,
            after_run: None,
            on_success: None,
            on_error: None,
        }
    }

    /// Evaluate `code` and render its completion value
    pub fn run(code: impl Into<String>) -> Self {
        Self::new(Action::Run, code)
    }

    /// Evaluate `code` and list the property names of its value
    pub fn property_names(code: impl Into<String>) -> Self {
        Self::new(Action::GetAllPropertyNames, code)
    }

    pub fn before_run(mut self, hook: impl FnOnce(&Session) + Send + 'static) -> Self {
        self.before_run = Some(Box::new(hook));
        self
    }

    pub fn after_run(mut self, hook: impl FnOnce(&Session) + Send + 'static) -> Self {
        self.after_run = Some(Box::new(hook));
        self
    }

    pub fn on_success(mut self, hook: impl FnOnce(&Session) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl FnOnce(&Session) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub(crate) fn request(&self) -> WorkerRequest {
        WorkerRequest::new(self.action, self.code.clone())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("action", &self.action)
            .field("code", &self.code)
            .field("before_run", &self.before_run.is_some())
            .field("after_run", &self.after_run.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

pub(crate) type Completion = oneshot::Sender<Result<ExecutionResult, SessionError>>;

/// Resolves once the session has finished with a task
#[derive(Debug)]
pub struct TaskHandle {
    id: Uuid,
    receiver: oneshot::Receiver<Result<ExecutionResult, SessionError>>,
}

impl TaskHandle {
    pub(crate) fn new(id: Uuid) -> (Self, Completion) {
        let (sender, receiver) = oneshot::channel();
        (Self { id, receiver }, sender)
    }

    /// Correlation id used for this task on the wire
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the result. Completion hooks have already run when this
    /// resolves with `Ok`.
    pub async fn wait(self) -> Result<ExecutionResult, SessionError> {
        self.receiver.await.unwrap_or(Err(SessionError::Abandoned))
    }
}
