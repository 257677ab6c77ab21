//! IPC protocol definitions and message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// IPC protocol version for compatibility checking
pub const IPC_PROTOCOL_VERSION: u32 = 1;

/// MIME type of the plain-text rendering of a value
pub const TEXT_PLAIN: &str = "text/plain";

/// MIME type of the HTML rendering of a value
pub const TEXT_HTML: &str = "text/html";

/// What the worker should do with the code it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Evaluate the code and render the resulting value
    Run,
    /// Evaluate the code and list the property names of the resulting value
    GetAllPropertyNames,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Run => write!(f, "run"),
            Action::GetAllPropertyNames => write!(f, "getAllPropertyNames"),
        }
    }
}

/// The two-element request sent to a worker: `[action, code]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest(pub Action, pub String);

impl WorkerRequest {
    pub fn new(action: Action, code: impl Into<String>) -> Self {
        Self(action, code.into())
    }

    pub fn action(&self) -> Action {
        self.0
    }

    pub fn code(&self) -> &str {
        &self.1
    }
}

/// Error payload reported by the worker when evaluation fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

impl ExecutionFailure {
    pub fn new(ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        let ename = ename.into();
        let evalue = evalue.into();
        let traceback = vec![format!("{}: {}", ename, evalue)];
        Self {
            ename,
            evalue,
            traceback,
        }
    }

    pub fn with_traceback(mut self, traceback: Vec<String>) -> Self {
        self.traceback = traceback;
        self
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.ename, self.evalue)
    }
}

/// The payload of a worker reply. Exactly one shape is present on the wire:
/// `{"mime": {...}}`, `{"error": {...}}` or `{"names": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Rendered representations of the evaluated value keyed by MIME type
    Mime(BTreeMap<String, String>),
    /// Evaluation failed
    Error(ExecutionFailure),
    /// Property names of the evaluated value
    Names(Vec<String>),
}

impl Outcome {
    /// Build a `mime` outcome from a plain and an HTML rendering
    pub fn rendered(text_plain: impl Into<String>, text_html: impl Into<String>) -> Self {
        let mut mime = BTreeMap::new();
        mime.insert(TEXT_PLAIN.to_string(), text_plain.into());
        mime.insert(TEXT_HTML.to_string(), text_html.into());
        Outcome::Mime(mime)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

/// Result of one task: captured side streams plus the worker's outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            stdout: None,
            stderr: None,
            outcome,
        }
    }

    /// Presence of an error payload is the only success/failure discriminator
    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }

    pub fn mime(&self) -> Option<&BTreeMap<String, String>> {
        match &self.outcome {
            Outcome::Mime(mime) => Some(mime),
            _ => None,
        }
    }

    pub fn text_plain(&self) -> Option<&str> {
        self.mime()
            .and_then(|mime| mime.get(TEXT_PLAIN))
            .map(String::as_str)
    }

    pub fn error(&self) -> Option<&ExecutionFailure> {
        match &self.outcome {
            Outcome::Error(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn names(&self) -> Option<&[String]> {
        match &self.outcome {
            Outcome::Names(names) => Some(names),
            _ => None,
        }
    }
}

/// Messages sent from a session to its worker process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Evaluate a request
    Execute {
        correlation_id: Uuid,
        request: WorkerRequest,
    },

    /// Shutdown signal
    Shutdown,
}

/// Messages sent from a worker process back to its session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorMessage {
    /// Worker connected and ready for work
    Ready { worker_id: String, pid: u32 },

    /// Reply to an `Execute` request
    Result {
        correlation_id: Uuid,
        outcome: Outcome,
    },

    /// Worker-level failure, not an evaluation error
    Error {
        correlation_id: Option<Uuid>,
        error: WorkerError,
    },
}

/// Worker error types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error_type", rename_all = "snake_case")]
pub enum WorkerError {
    /// Worker initialization failed
    InitializationFailed { error: String },

    /// Message parse error
    MessageParseError { error: String },

    /// The evaluator itself failed, independent of user code
    EvaluatorFailed { error: String },
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::InitializationFailed { error } => {
                write!(f, "Worker initialization failed: {}", error)
            }
            WorkerError::MessageParseError { error } => {
                write!(f, "Message parse error: {}", error)
            }
            WorkerError::EvaluatorFailed { error } => {
                write!(f, "Evaluator failed: {}", error)
            }
        }
    }
}

impl std::error::Error for WorkerError {}

/// Message envelope for all IPC communications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    /// Create a new message envelope
    pub fn new(message: T) -> Self {
        Self {
            protocol_version: IPC_PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Check if protocol version is compatible
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == IPC_PROTOCOL_VERSION
    }
}
