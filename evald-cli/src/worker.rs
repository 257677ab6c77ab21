//! Worker process mode
//!
//! The worker connects back to its session over the local socket named on
//! its command line. stdout and stderr belong to the code being evaluated;
//! nothing but user output should reach them.

use anyhow::{Context, Result};
use evald_ipc::{
    connect_local_socket, CoordinatorMessage, IpcError, IpcTransport, MessageEnvelope,
    SocketTransport, WorkerError, WorkerMessage,
};
use evald_js::JsEvaluator;
use std::io::Write;
use tracing::{debug, error, info};

/// Run as worker process
pub async fn run_worker_process(worker_id: String) -> Result<()> {
    info!("Starting worker process with ID: {}", worker_id);

    let mut transport = connect_local_socket(&worker_id)
        .await
        .with_context(|| format!("Failed to connect to session socket '{}'", worker_id))?;

    let mut evaluator = match JsEvaluator::new() {
        Ok(evaluator) => evaluator,
        Err(e) => {
            let report = CoordinatorMessage::Error {
                correlation_id: None,
                error: WorkerError::InitializationFailed {
                    error: e.to_string(),
                },
            };
            let _ = send(&mut transport, report).await;
            return Err(e).context("Failed to initialize JavaScript evaluator");
        }
    };

    send(
        &mut transport,
        CoordinatorMessage::Ready {
            worker_id: worker_id.clone(),
            pid: std::process::id(),
        },
    )
    .await?;

    loop {
        match transport.receive::<WorkerMessage>().await {
            Ok(envelope) => match envelope.message {
                WorkerMessage::Execute {
                    correlation_id,
                    request,
                } => {
                    debug!("Worker {} executing {}", worker_id, correlation_id);
                    let outcome = evaluator.evaluate(&request);

                    // Side streams must be written before the result is sent
                    flush_side_streams();

                    send(
                        &mut transport,
                        CoordinatorMessage::Result {
                            correlation_id,
                            outcome,
                        },
                    )
                    .await?;
                }
                WorkerMessage::Shutdown => {
                    info!("Worker {} received shutdown", worker_id);
                    break;
                }
            },
            Err(IpcError::ConnectionClosed) => {
                info!("Worker {} received EOF, shutting down", worker_id);
                break;
            }
            Err(e) if !e.is_fatal() => {
                error!("Worker {} failed to parse worker message: {}", worker_id, e);
                send(
                    &mut transport,
                    CoordinatorMessage::Error {
                        correlation_id: None,
                        error: WorkerError::MessageParseError {
                            error: e.to_string(),
                        },
                    },
                )
                .await?;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Worker {} lost its session", worker_id));
            }
        }
    }

    flush_side_streams();
    let _ = transport.close().await;
    info!("Worker {} shutting down", worker_id);
    Ok(())
}

async fn send(transport: &mut SocketTransport, message: CoordinatorMessage) -> Result<()> {
    transport
        .send(&MessageEnvelope::new(message))
        .await
        .context("Failed to send message to session")
}

fn flush_side_streams() {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}
