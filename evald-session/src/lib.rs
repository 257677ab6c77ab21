//! Session scheduling for evald
//!
//! A [`Session`] owns one long-lived worker and runs [`Task`]s on it one at
//! a time, in submission order. The [`SessionManager`] maps caller-chosen
//! identifiers to sessions and creates them on first use.
//!
//! ```no_run
//! # async fn example() -> Result<(), evald_session::SessionError> {
//! use evald_config::EvaldConfig;
//! use evald_session::{SessionManager, Task};
//!
//! let manager = SessionManager::from_config(&EvaldConfig::default());
//! manager.run("s1", Task::run("let x = 41;"))?;
//! let result = manager.run("s1", Task::run("x + 1;"))?.wait().await?;
//! assert_eq!(result.text_plain(), Some("42"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod output;
pub mod process;
pub mod session;
pub mod task;
pub mod worker;

#[cfg(test)]
mod testing;

pub use error::SessionError;
pub use manager::SessionManager;
pub use output::{CapturedOutput, OutputBuffer};
pub use process::{ProcessLauncher, ProcessWorker};
pub use session::{Session, SessionState};
pub use task::{Hook, Task, TaskHandle};
pub use worker::{Worker, WorkerEvent, WorkerLauncher, WorkerLink};

// Protocol types that appear in this crate's API
pub use evald_ipc::{Action, ExecutionFailure, ExecutionResult, Outcome};
