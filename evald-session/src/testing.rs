//! In-memory workers for scheduler tests

use async_trait::async_trait;
use evald_ipc::{
    CoordinatorMessage, ExecutionFailure, Outcome, WorkerError, WorkerMessage, WorkerRequest,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::SessionError;
use crate::output::CapturedOutput;
use crate::worker::{Worker, WorkerEvent, WorkerLauncher, WorkerLink};

/// Worker that records requests instead of evaluating them
pub(crate) struct ScriptedWorker {
    id: String,
    session_id: String,
    pid: u32,
    requests: mpsc::UnboundedSender<WorkerMessage>,
    output: Mutex<CapturedOutput>,
    accepting: AtomicBool,
    terminated: AtomicBool,
}

impl ScriptedWorker {
    pub(crate) fn refuse_requests(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn send(&self, message: WorkerMessage) -> Result<(), SessionError> {
        let unavailable = || SessionError::WorkerUnavailable {
            session_id: self.session_id.clone(),
        };
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.requests.send(message).map_err(|_| unavailable())
    }

    fn take_output(&self) -> CapturedOutput {
        std::mem::take(&mut *self.output.lock())
    }

    async fn terminate(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.terminated.store(true, Ordering::SeqCst);
    }
}

/// Test-side controls for a [`ScriptedWorker`]
pub(crate) struct WorkerScript {
    pub(crate) worker: Arc<ScriptedWorker>,
    requests: mpsc::UnboundedReceiver<WorkerMessage>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerScript {
    /// Next request already sent, without waiting
    pub(crate) fn try_next_execute(&mut self) -> Option<(Uuid, WorkerRequest)> {
        while let Ok(message) = self.requests.try_recv() {
            if let WorkerMessage::Execute {
                correlation_id,
                request,
            } = message
            {
                return Some((correlation_id, request));
            }
        }
        None
    }

    /// Wait for the next request
    pub(crate) async fn next_execute(&mut self) -> (Uuid, WorkerRequest) {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
                .await
                .expect("timed out waiting for a request")
                .expect("worker channel closed");
            if let WorkerMessage::Execute {
                correlation_id,
                request,
            } = message
            {
                return (correlation_id, request);
            }
        }
    }

    pub(crate) fn reply(&self, correlation_id: Uuid, outcome: Outcome) {
        self.emit(WorkerEvent::Message(CoordinatorMessage::Result {
            correlation_id,
            outcome,
        }));
    }

    pub(crate) fn reply_value(&self, correlation_id: Uuid, text: &str) {
        self.reply(
            correlation_id,
            Outcome::rendered(text, format!("<pre>{}</pre>", text)),
        );
    }

    pub(crate) fn reply_error(&self, correlation_id: Uuid, ename: &str, evalue: &str) {
        self.reply(
            correlation_id,
            Outcome::Error(ExecutionFailure::new(ename, evalue)),
        );
    }

    pub(crate) fn fail(&self, correlation_id: Option<Uuid>, error: WorkerError) {
        self.emit(WorkerEvent::Message(CoordinatorMessage::Error {
            correlation_id,
            error,
        }));
    }

    /// Buffer side-stream text to be picked up by the next completion
    pub(crate) fn write_output(&self, stdout: Option<&str>, stderr: Option<&str>) {
        *self.worker.output.lock() = CapturedOutput {
            stdout: stdout.map(str::to_string),
            stderr: stderr.map(str::to_string),
        };
    }

    pub(crate) fn disconnect(&self, reason: &str) {
        self.emit(WorkerEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    /// Deliver a line that failed to decode
    pub(crate) fn malformed(&self, reason: &str) {
        self.emit(WorkerEvent::Malformed {
            reason: reason.to_string(),
        });
    }

    fn emit(&self, event: WorkerEvent) {
        self.events.send(event).expect("session driver is gone");
    }
}

pub(crate) fn scripted_link(session_id: &str, pid: u32) -> (WorkerLink, WorkerScript) {
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let worker = Arc::new(ScriptedWorker {
        id: format!("scripted-{}", pid),
        session_id: session_id.to_string(),
        pid,
        requests: requests_tx,
        output: Mutex::new(CapturedOutput::default()),
        accepting: AtomicBool::new(true),
        terminated: AtomicBool::new(false),
    });

    let link = WorkerLink {
        worker: worker.clone(),
        events: events_rx,
    };
    let script = WorkerScript {
        worker,
        requests: requests_rx,
        events: events_tx,
    };
    (link, script)
}

/// Launcher handing out scripted workers with increasing pids
#[derive(Default)]
pub(crate) struct ScriptedLauncher {
    next_pid: AtomicU32,
    launches: AtomicU32,
    failing: AtomicBool,
    scripts: Mutex<HashMap<String, WorkerScript>>,
}

impl ScriptedLauncher {
    pub(crate) fn fail_launches(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Controls for the most recent worker launched for `session_id`
    pub(crate) fn take_script(&self, session_id: &str) -> WorkerScript {
        self.scripts
            .lock()
            .remove(session_id)
            .expect("no worker launched for session")
    }
}

impl WorkerLauncher for ScriptedLauncher {
    fn launch(&self, session_id: &str) -> Result<WorkerLink, SessionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionError::Spawn {
                session_id: session_id.to_string(),
                reason: "launch refused".to_string(),
            });
        }

        self.launches.fetch_add(1, Ordering::SeqCst);
        let pid = 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (link, script) = scripted_link(session_id, pid);
        self.scripts.lock().insert(session_id.to_string(), script);
        Ok(link)
    }
}
