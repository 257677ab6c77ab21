//! Per-session scheduling of tasks onto one worker
//!
//! A session owns exactly one worker and runs at most one task on it at a
//! time. Tasks submitted while another is in flight wait in a FIFO queue.
//! Replies from the worker are handled by a driver task that captures the
//! side streams, fires the completion hooks and dispatches the next task.
//!
//! Hooks always run with the scheduler lock released, so a hook may submit
//! more work to the same session.

use evald_config::SessionConfig;
use evald_ipc::{CoordinatorMessage, ExecutionResult, Outcome, WorkerError, WorkerMessage, WorkerRequest};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::task::{Completion, Hook, Task, TaskHandle};
use crate::worker::{Worker, WorkerEvent, WorkerLauncher, WorkerLink};

/// Lower bound on the driver's wake-up interval
const MIN_STALL_CHECK: Duration = Duration::from_millis(10);

/// Observable scheduling state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No task in flight
    Idle,
    /// A task is in flight, possibly with more queued behind it
    Busy,
    /// Closed explicitly or after losing its worker
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Busy => write!(f, "busy"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

struct PendingTask {
    id: Uuid,
    task: Task,
    completion: Completion,
}

#[derive(Default)]
struct CompletionHooks {
    on_success: Option<Hook>,
    on_error: Option<Hook>,
    after_run: Option<Hook>,
}

impl CompletionHooks {
    fn fire(self, session: &Session, failed: bool) {
        let outcome_hook = if failed { self.on_error } else { self.on_success };
        if let Some(hook) = outcome_hook {
            hook(session);
        }
        if let Some(hook) = self.after_run {
            hook(session);
        }
    }
}

struct InFlight {
    id: Uuid,
    started_at: Instant,
    stall_reported: bool,
    hooks: CompletionHooks,
    completion: Option<Completion>,
}

/// Everything needed to start a task once the lock is released
struct Dispatch {
    id: Uuid,
    request: WorkerRequest,
    before_run: Option<Hook>,
}

#[derive(Default)]
struct SchedulerState {
    current: Option<InFlight>,
    queue: VecDeque<PendingTask>,
    closed: bool,
}

impl SchedulerState {
    fn begin(&mut self, pending: PendingTask) -> Dispatch {
        let PendingTask {
            id,
            task,
            completion,
        } = pending;
        let request = task.request();
        let Task {
            before_run,
            after_run,
            on_success,
            on_error,
            ..
        } = task;

        self.current = Some(InFlight {
            id,
            started_at: Instant::now(),
            stall_reported: false,
            hooks: CompletionHooks {
                on_success,
                on_error,
                after_run,
            },
            completion: Some(completion),
        });

        Dispatch {
            id,
            request,
            before_run,
        }
    }

    /// Close the scheduler and collect every completion still owed to a caller
    fn close(&mut self) -> Vec<Completion> {
        self.closed = true;
        let mut owed: Vec<Completion> = self
            .current
            .take()
            .and_then(|current| current.completion)
            .into_iter()
            .collect();
        owed.extend(self.queue.drain(..).map(|pending| pending.completion));
        owed
    }
}

struct SessionInner {
    id: String,
    worker: Arc<dyn Worker>,
    config: SessionConfig,
    state: Mutex<SchedulerState>,
    execution_count: AtomicU64,
    last_result: Mutex<Option<ExecutionResult>>,
}

/// Handle to a session. Clones share the same worker and queue.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Launch a worker for `id` and start scheduling on it
    pub fn spawn(
        id: impl Into<String>,
        launcher: &dyn WorkerLauncher,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let id = id.into();
        let link = launcher.launch(&id)?;
        Ok(Self::new(id, link, config))
    }

    /// Wrap an already launched worker. Must be called inside a tokio runtime.
    pub fn new(id: impl Into<String>, link: WorkerLink, config: SessionConfig) -> Self {
        let WorkerLink { worker, events } = link;
        let inner = Arc::new(SessionInner {
            id: id.into(),
            worker,
            config,
            state: Mutex::new(SchedulerState::default()),
            execution_count: AtomicU64::new(0),
            last_result: Mutex::new(None),
        });

        debug!(
            "Session '{}' attached to worker {}",
            inner.id,
            inner.worker.id()
        );
        tokio::spawn(drive(Arc::downgrade(&inner), events));

        Self { inner }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn worker_id(&self) -> &str {
        self.inner.worker.id()
    }

    pub fn worker_pid(&self) -> Option<u32> {
        self.inner.worker.pid()
    }

    /// Submit a task.
    ///
    /// When the session is idle the task's request is sent to the worker
    /// before this returns; otherwise the task is queued. Never waits for a
    /// reply.
    pub fn run(&self, task: Task) -> Result<TaskHandle, SessionError> {
        let id = Uuid::new_v4();
        let (handle, completion) = TaskHandle::new(id);
        let pending = PendingTask {
            id,
            task,
            completion,
        };

        let dispatch = {
            let mut state = self.inner.state.lock();

            if state.closed {
                return Err(SessionError::Closed {
                    session_id: self.inner.id.clone(),
                });
            }

            if state.current.is_some() {
                if let Some(capacity) = self.inner.config.max_queue_len {
                    if state.queue.len() >= capacity {
                        return Err(SessionError::QueueFull {
                            session_id: self.inner.id.clone(),
                            capacity,
                        });
                    }
                }

                state.queue.push_back(pending);
                debug!(
                    "Session '{}' busy, queued task {} ({} waiting)",
                    self.inner.id,
                    id,
                    state.queue.len()
                );
                None
            } else {
                Some(state.begin(pending))
            }
        };

        if let Some(dispatch) = dispatch {
            self.dispatch(dispatch);
        }

        Ok(handle)
    }

    pub fn state(&self) -> SessionState {
        let state = self.inner.state.lock();
        if state.closed {
            SessionState::Closed
        } else if state.current.is_some() {
            SessionState::Busy
        } else {
            SessionState::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state() == SessionState::Busy
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of tasks waiting behind the one in flight
    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Counter owned by callers; the scheduler never changes it
    pub fn execution_count(&self) -> u64 {
        self.inner.execution_count.load(Ordering::SeqCst)
    }

    /// Increment the execution counter, returning the new value
    pub fn increment_execution_count(&self) -> u64 {
        self.inner.execution_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The most recently received result
    pub fn last_result(&self) -> Option<ExecutionResult> {
        self.inner.last_result.lock().clone()
    }

    /// Close the session.
    ///
    /// The in-flight task and every queued task resolve with
    /// [`SessionError::Closed`] and no hooks fire. The worker is asked to
    /// shut down and killed if it does not exit in time.
    pub async fn close(&self) {
        let owed = self.inner.state.lock().close();
        let error = SessionError::Closed {
            session_id: self.inner.id.clone(),
        };
        for completion in owed {
            let _ = completion.send(Err(error.clone()));
        }

        info!("Closing session '{}'", self.inner.id);
        self.inner.worker.terminate().await;
    }

    fn dispatch(&self, dispatch: Dispatch) {
        let Dispatch {
            id,
            request,
            before_run,
        } = dispatch;

        if let Some(hook) = before_run {
            hook(self);
        }

        debug!(
            session_id = %self.inner.id,
            task_id = %id,
            action = %request.action(),
            "Dispatching task"
        );

        let message = WorkerMessage::Execute {
            correlation_id: id,
            request,
        };
        if let Err(e) = self.inner.worker.send(message) {
            warn!("Session '{}' lost its worker: {}", self.inner.id, e);
            self.fail_all(e);
        }
    }

    /// Finish with the in-flight task and start the next one, if any
    fn advance(&self) {
        let next = {
            let mut state = self.inner.state.lock();
            state.current = None;
            if state.closed {
                None
            } else if let Some(pending) = state.queue.pop_front() {
                Some(state.begin(pending))
            } else {
                None
            }
        };

        match next {
            Some(dispatch) => self.dispatch(dispatch),
            None => debug!("Session '{}' is idle", self.inner.id),
        }
    }

    fn handle_event(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Message(CoordinatorMessage::Ready { worker_id, pid }) => {
                debug!(
                    "Worker {} (pid {}) ready for session '{}'",
                    worker_id, pid, self.inner.id
                );
            }
            WorkerEvent::Message(CoordinatorMessage::Result {
                correlation_id,
                outcome,
            }) => self.complete(correlation_id, outcome),
            WorkerEvent::Message(CoordinatorMessage::Error {
                correlation_id,
                error,
            }) => self.worker_error(correlation_id, error),
            WorkerEvent::Malformed { reason } => {
                // Replies can no longer be matched to tasks once a line is lost
                warn!(
                    "Worker for session '{}' sent an unreadable reply: {}",
                    self.inner.id, reason
                );
                self.fail_all(SessionError::Protocol {
                    session_id: self.inner.id.clone(),
                    reason,
                });
                let worker = Arc::clone(&self.inner.worker);
                tokio::spawn(async move { worker.terminate().await });
            }
            WorkerEvent::Disconnected { reason } => {
                if self.is_closed() {
                    debug!("Worker for session '{}' disconnected: {}", self.inner.id, reason);
                } else {
                    warn!("Worker for session '{}' exited: {}", self.inner.id, reason);
                }
                self.fail_all(SessionError::WorkerExited {
                    session_id: self.inner.id.clone(),
                    reason,
                });
            }
        }
    }

    fn complete(&self, correlation_id: Uuid, outcome: Outcome) {
        // `current` stays set while hooks run so work they submit queues
        // behind tasks that were already waiting
        let taken = {
            let mut state = self.inner.state.lock();
            let closed = state.closed;
            match state.current.as_mut() {
                Some(current) if current.id == correlation_id => Some((
                    std::mem::take(&mut current.hooks),
                    current.completion.take(),
                )),
                Some(current) => {
                    warn!(
                        "Session '{}' ignoring reply for {} while {} is in flight",
                        self.inner.id, correlation_id, current.id
                    );
                    None
                }
                None if closed => None,
                None => {
                    warn!(
                        "Session '{}' ignoring reply for {} with no task in flight",
                        self.inner.id, correlation_id
                    );
                    None
                }
            }
        };
        let Some((hooks, completion)) = taken else {
            return;
        };

        let output = self.inner.worker.take_output();
        let result = ExecutionResult {
            stdout: output.stdout,
            stderr: output.stderr,
            outcome,
        };
        *self.inner.last_result.lock() = Some(result.clone());

        debug!(
            session_id = %self.inner.id,
            task_id = %correlation_id,
            error = result.is_error(),
            "Task completed"
        );

        hooks.fire(self, result.is_error());
        self.advance();

        if let Some(completion) = completion {
            let _ = completion.send(Ok(result));
        }
    }

    fn worker_error(&self, correlation_id: Option<Uuid>, error: WorkerError) {
        let completion = {
            let mut state = self.inner.state.lock();
            match state.current.as_mut() {
                Some(current) if correlation_id.is_none_or(|id| id == current.id) => {
                    current.completion.take()
                }
                _ => {
                    warn!(
                        "Worker for session '{}' reported an error outside any task: {}",
                        self.inner.id, error
                    );
                    return;
                }
            }
        };

        warn!("Worker for session '{}' failed a task: {}", self.inner.id, error);
        self.advance();

        if let Some(completion) = completion {
            let _ = completion.send(Err(SessionError::Worker {
                session_id: self.inner.id.clone(),
                message: error.to_string(),
            }));
        }
    }

    fn fail_all(&self, error: SessionError) {
        let owed = self.inner.state.lock().close();
        if !owed.is_empty() {
            warn!(
                "Session '{}' failing {} pending task(s): {}",
                self.inner.id,
                owed.len(),
                error
            );
        }
        for completion in owed {
            let _ = completion.send(Err(error.clone()));
        }
    }

    /// Report the in-flight task once it exceeds the stall threshold, and
    /// return how long the driver may sleep before checking again
    fn check_stall(&self) -> Duration {
        let threshold = self.inner.config.stall_warning.max(MIN_STALL_CHECK);
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        let Some(current) = state.current.as_mut() else {
            return threshold;
        };
        if current.stall_reported {
            return threshold;
        }

        let elapsed = current.started_at.elapsed();
        if elapsed < threshold {
            return (threshold - elapsed).max(MIN_STALL_CHECK);
        }

        current.stall_reported = true;
        warn!(
            session_id = %self.inner.id,
            task_id = %current.id,
            waiting = state.queue.len(),
            "Task has been running for {:?} without a reply",
            elapsed
        );
        threshold
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("worker_id", &self.inner.worker.id())
            .field("state", &self.state())
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

/// Deliver worker events to the session until the worker goes away or the
/// session is dropped
async fn drive(session: Weak<SessionInner>, mut events: mpsc::UnboundedReceiver<WorkerEvent>) {
    loop {
        let wait = match session.upgrade() {
            Some(inner) => Session { inner }.check_stall(),
            None => break,
        };

        let event = match tokio::time::timeout(wait, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => WorkerEvent::Disconnected {
                reason: "worker event channel closed".to_string(),
            },
            Err(_) => continue,
        };

        let Some(inner) = session.upgrade() else {
            break;
        };
        let finished = matches!(event, WorkerEvent::Disconnected { .. });
        Session { inner }.handle_event(event);

        if finished {
            break;
        }
    }
}
