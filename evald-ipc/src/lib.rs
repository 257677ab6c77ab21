//! Inter-process communication for evald
//!
//! This crate provides the request/response protocol spoken between a
//! session and its worker process, and the line-delimited transports that
//! carry it over a local socket.

pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use error::IpcError;
pub use protocol::{
    Action, CoordinatorMessage, ExecutionFailure, ExecutionResult, MessageEnvelope, Outcome,
    WorkerError, WorkerMessage, WorkerRequest, IPC_PROTOCOL_VERSION, TEXT_HTML, TEXT_PLAIN,
};
pub use transport::{
    accept_local_socket, connect_local_socket, listen_local_socket, local_socket_name,
    socket_transport, IpcTransport, LineTransport, MessageReader, MessageWriter, SocketListener,
    SocketTransport,
};
