//! Registry of sessions keyed by caller-chosen identifiers

use evald_config::{EvaldConfig, SessionConfig};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::process::ProcessLauncher;
use crate::session::Session;
use crate::task::{Task, TaskHandle};
use crate::worker::WorkerLauncher;

/// Maps session identifiers to sessions, creating them on first use
pub struct SessionManager {
    launcher: Arc<dyn WorkerLauncher>,
    config: SessionConfig,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn WorkerLauncher>, config: SessionConfig) -> Self {
        Self {
            launcher,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Manager whose sessions run worker processes as configured
    pub fn from_config(config: &EvaldConfig) -> Self {
        Self::new(
            Arc::new(ProcessLauncher::new(config.worker.clone())),
            config.session.clone(),
        )
    }

    /// Submit a task to the session named `session_id`, creating the session
    /// and its worker if it does not exist yet
    pub fn run(&self, session_id: &str, task: Task) -> Result<TaskHandle, SessionError> {
        let session = self.get_or_create(session_id)?;
        session.run(task)
    }

    /// The session for `session_id`, launched now if needed
    pub fn get_or_create(&self, session_id: &str) -> Result<Session, SessionError> {
        if let Some(session) = self.get(session_id) {
            return Ok(session);
        }

        // Launching waits for the worker to connect, so the registry stays unlocked
        let launched = Session::spawn(session_id, self.launcher.as_ref(), self.config.clone())?;

        let existing = match self.sessions.lock().entry(session_id.to_string()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(launched.clone());
                None
            }
        };

        match existing {
            Some(session) => {
                debug!(
                    "Session '{}' was created concurrently; closing spare worker {}",
                    session_id,
                    launched.worker_id()
                );
                tokio::spawn(async move { launched.close().await });
                Ok(session)
            }
            None => {
                info!(
                    "Created session '{}' (worker pid {:?})",
                    session_id,
                    launched.worker_pid()
                );
                Ok(launched)
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Registered identifiers, sorted
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Remove and close one session. Returns false for unknown identifiers.
    pub async fn close(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().remove(session_id);
        match removed {
            Some(session) => {
                session.close().await;
                true
            }
            None => {
                debug!("No session '{}' to close", session_id);
                false
            }
        }
    }

    /// Drop the session behind a terminal error so the identifier starts
    /// fresh on next use. Returns true when an entry was removed.
    pub async fn discard_after(&self, session_id: &str, error: &SessionError) -> bool {
        if !error.is_terminal() {
            return false;
        }
        self.close(session_id).await
    }

    /// Close every session
    pub async fn shutdown(&self) {
        let sessions: Vec<Session> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        info!("Shutting down {} session(s)", sessions.len());

        for session in sessions {
            session.close().await;
        }
    }
}
