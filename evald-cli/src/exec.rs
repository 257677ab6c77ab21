//! Non-interactive execution of snippets

use anyhow::{Context, Result};
use evald_config::EvaldConfig;
use evald_session::{ExecutionResult, SessionManager, Task};
use tracing::info;

use crate::formatter::OutputFormatter;

/// Run every snippet on one session, in order, printing each result.
///
/// All snippets are submitted up front; the session queue keeps them in
/// order and a failing snippet does not stop the ones after it.
pub async fn exec_command(
    config: &EvaldConfig,
    session_id: &str,
    snippets: &[String],
    props: bool,
    json: bool,
) -> Result<()> {
    let manager = SessionManager::from_config(config);
    let outcome = run_snippets(&manager, session_id, snippets, props, json).await;
    manager.shutdown().await;

    let failures = outcome?;
    if failures > 0 {
        anyhow::bail!(
            "{} of {} snippet(s) raised an error",
            failures,
            snippets.len()
        );
    }
    Ok(())
}

async fn run_snippets(
    manager: &SessionManager,
    session_id: &str,
    snippets: &[String],
    props: bool,
    json: bool,
) -> Result<usize> {
    let formatter = OutputFormatter::new();

    let mut handles = Vec::with_capacity(snippets.len());
    for code in snippets {
        let task = if props {
            Task::property_names(code.as_str())
        } else {
            Task::run(code.as_str())
        };
        let handle = manager
            .run(session_id, task)
            .with_context(|| format!("Failed to submit snippet to session '{}'", session_id))?;
        handles.push(handle);
    }
    info!("Submitted {} snippet(s) to session '{}'", handles.len(), session_id);

    let mut failures = 0;
    for handle in handles {
        let result = handle
            .wait()
            .await
            .with_context(|| format!("Session '{}' failed", session_id))?;
        if result.is_error() {
            failures += 1;
        }
        print_result(&formatter, &result, json)?;
    }

    Ok(failures)
}

fn print_result(formatter: &OutputFormatter, result: &ExecutionResult, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(result).context("Failed to serialize result")?;
        println!("{}", line);
    } else {
        formatter.display_result(result);
    }
    Ok(())
}
