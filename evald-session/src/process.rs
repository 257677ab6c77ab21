//! Workers backed by child processes

use async_trait::async_trait;
use evald_config::{WorkerConfig, WORKER_LOG_ENV};
use evald_ipc::{
    accept_local_socket, listen_local_socket, CoordinatorMessage, IpcError, MessageEnvelope,
    SocketListener, WorkerMessage,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::output::{spawn_pump, CapturedOutput, OutputBuffer};
use crate::worker::{Worker, WorkerEvent, WorkerLauncher, WorkerLink};

/// Launches each session's worker as a child process
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: WorkerConfig,
}

impl ProcessLauncher {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn program(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        match &self.config.program {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe().map_err(|e| SessionError::Spawn {
                session_id: session_id.to_string(),
                reason: format!("Failed to get current exe: {}", e),
            }),
        }
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, session_id: &str) -> Result<WorkerLink, SessionError> {
        let worker_id = format!("evald-{}", Uuid::new_v4().simple());
        let spawn_error = |reason: String| SessionError::Spawn {
            session_id: session_id.to_string(),
            reason,
        };

        let program = self.program(session_id)?;
        debug!(
            "Spawning worker {} for session '{}': {}",
            worker_id,
            session_id,
            program.display()
        );

        // Listen before spawning so the worker can connect as soon as it starts
        let listener = listen_local_socket(&worker_id).map_err(|e| spawn_error(e.to_string()))?;

        let mut cmd = Command::new(&program);
        cmd.args(&self.config.args)
            .arg("--worker-id")
            .arg(&worker_id)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref level) = self.config.log_level {
            cmd.env(WORKER_LOG_ENV, level);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| spawn_error(format!("Failed to spawn {}: {}", program.display(), e)))?;

        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("Failed to get stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error("Failed to get stderr".to_string()))?;

        let stdout_buffer = OutputBuffer::new();
        let stderr_buffer = OutputBuffer::new();
        spawn_pump(stdout, stdout_buffer.clone(), "stdout", worker_id.clone());
        spawn_pump(stderr, stderr_buffer.clone(), "stderr", worker_id.clone());

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(serve_connection(
            worker_id.clone(),
            listener,
            self.config.connect_timeout,
            outbound_rx,
            events_tx,
        ));

        info!(
            "Started worker {} (pid {:?}) for session '{}'",
            worker_id, pid, session_id
        );

        let worker = ProcessWorker {
            id: worker_id,
            session_id: session_id.to_string(),
            pid,
            shutdown_grace: self.config.shutdown_grace,
            child: tokio::sync::Mutex::new(Some(child)),
            outbound: Mutex::new(Some(outbound_tx)),
            stdout: stdout_buffer,
            stderr: stderr_buffer,
        };

        Ok(WorkerLink {
            worker: Arc::new(worker),
            events: events_rx,
        })
    }
}

/// A worker child process and the channels attached to it
pub struct ProcessWorker {
    id: String,
    session_id: String,
    pid: Option<u32>,
    shutdown_grace: Duration,
    child: tokio::sync::Mutex<Option<Child>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<WorkerMessage>>>,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
}

#[async_trait]
impl Worker for ProcessWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn send(&self, message: WorkerMessage) -> Result<(), SessionError> {
        let unavailable = || SessionError::WorkerUnavailable {
            session_id: self.session_id.clone(),
        };

        match self.outbound.lock().as_ref() {
            Some(outbound) => outbound.send(message).map_err(|_| unavailable()),
            None => Err(unavailable()),
        }
    }

    fn take_output(&self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout.drain(),
            stderr: self.stderr.drain(),
        }
    }

    async fn terminate(&self) {
        debug!("Stopping worker process: {}", self.id);

        // Shutdown first, then close the channel so the writer task ends
        let _ = self.send(WorkerMessage::Shutdown);
        self.outbound.lock().take();

        let Some(mut child) = self.child.lock().await.take() else {
            debug!("Worker {} already stopped", self.id);
            return;
        };

        match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Worker {} terminated gracefully: {}", self.id, status);
            }
            Ok(Err(e)) => {
                debug!("Worker {} wait failed: {}", self.id, e);
            }
            Err(_) => {
                debug!(
                    "Worker {} didn't respond to shutdown, force killing",
                    self.id
                );
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill worker process {}: {}", self.id, e);
                }
            }
        }
    }
}

/// Accept the worker's connection, then pump messages both ways until
/// either side goes away.
async fn serve_connection(
    worker_id: String,
    listener: SocketListener,
    connect_timeout: Duration,
    mut outbound: mpsc::UnboundedReceiver<WorkerMessage>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let transport = match tokio::time::timeout(connect_timeout, accept_local_socket(&listener)).await {
        Ok(Ok(transport)) => transport,
        Ok(Err(e)) => {
            error!("Worker {} connection failed: {}", worker_id, e);
            let _ = events.send(WorkerEvent::Disconnected {
                reason: format!("connection failed: {}", e),
            });
            return;
        }
        Err(_) => {
            error!(
                "Worker {} did not connect within {:?}",
                worker_id, connect_timeout
            );
            let _ = events.send(WorkerEvent::Disconnected {
                reason: format!("worker did not connect within {:?}", connect_timeout),
            });
            return;
        }
    };
    drop(listener);
    debug!("Worker {} connected", worker_id);

    let (mut reader, mut writer) = transport.into_parts();

    let writer_id = worker_id.clone();
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = writer.send(&MessageEnvelope::new(message)).await {
                debug!("Worker {} channel closed while writing: {}", writer_id, e);
                break;
            }
        }
        let _ = writer.close().await;
    });

    loop {
        match reader.receive::<CoordinatorMessage>().await {
            Ok(envelope) => {
                if events.send(WorkerEvent::Message(envelope.message)).is_err() {
                    debug!("Session for worker {} is gone", worker_id);
                    break;
                }
            }
            Err(e) if !e.is_fatal() => {
                warn!("Failed to parse message from worker {}: {}", worker_id, e);
                let reason = e.to_string();
                if events.send(WorkerEvent::Malformed { reason }).is_err() {
                    break;
                }
            }
            Err(e) => {
                let reason = match e {
                    IpcError::ConnectionClosed => "connection closed".to_string(),
                    other => other.to_string(),
                };
                debug!("Worker {} channel ended: {}", worker_id, reason);
                let _ = events.send(WorkerEvent::Disconnected { reason });
                break;
            }
        }
    }
}
