//! IPC transport implementations
//!
//! Messages travel as newline-delimited JSON envelopes. The same framing is
//! used on both ends of a worker's local socket; either end can split the
//! transport into a reader and a writer so they can live in separate tasks.

use async_trait::async_trait;
use interprocess::local_socket::tokio::prelude::*;
use interprocess::local_socket::tokio::{Listener, RecvHalf, SendHalf, Stream};
use interprocess::local_socket::{
    GenericFilePath, GenericNamespaced, ListenerOptions, Name, NameType, ToFsName, ToNsName,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::IpcError;
use crate::protocol::{MessageEnvelope, IPC_PROTOCOL_VERSION};

/// Transport over a worker's local socket
pub type SocketTransport = LineTransport<RecvHalf, SendHalf>;

/// Listening end of a worker's local socket
pub type SocketListener = Listener;

/// IPC transport trait for different communication mechanisms
#[async_trait]
pub trait IpcTransport: Send {
    /// Send a message to the other end
    async fn send<T: Serialize + Send + Sync>(
        &mut self,
        message: &MessageEnvelope<T>,
    ) -> Result<(), IpcError>;

    /// Receive a message from the other end
    async fn receive<T: DeserializeOwned + Send>(&mut self) -> Result<MessageEnvelope<T>, IpcError>;

    /// Close the transport
    async fn close(&mut self) -> Result<(), IpcError>;
}

/// Reads newline-delimited envelopes
pub struct MessageReader<R> {
    reader: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin + Send> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Read the next envelope. Blank lines are skipped; a line that is not a
    /// valid envelope yields `MalformedLine` and the reader stays usable.
    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<MessageEnvelope<T>, IpcError> {
        loop {
            self.line.clear();

            let read = self
                .reader
                .read_line(&mut self.line)
                .await?;

            if read == 0 {
                return Err(IpcError::ConnectionClosed);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let envelope: MessageEnvelope<T> =
                serde_json::from_str(trimmed).map_err(|e| IpcError::malformed(trimmed, e))?;

            if envelope.protocol_version != IPC_PROTOCOL_VERSION {
                return Err(IpcError::VersionMismatch {
                    expected: IPC_PROTOCOL_VERSION,
                    actual: envelope.protocol_version,
                });
            }

            return Ok(envelope);
        }
    }
}

/// Writes newline-delimited envelopes
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send<T: Serialize>(&mut self, message: &MessageEnvelope<T>) -> Result<(), IpcError> {
        let mut json = serde_json::to_string(message).map_err(IpcError::Encode)?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), IpcError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Bidirectional line transport over any reader/writer pair
pub struct LineTransport<R, W> {
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: MessageReader::new(reader),
            writer: MessageWriter::new(writer),
        }
    }

    /// Split into halves that can be driven from different tasks
    pub fn into_parts(self) -> (MessageReader<R>, MessageWriter<W>) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl<R, W> IpcTransport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send<T: Serialize + Send + Sync>(
        &mut self,
        message: &MessageEnvelope<T>,
    ) -> Result<(), IpcError> {
        self.writer.send(message).await
    }

    async fn receive<T: DeserializeOwned + Send>(&mut self) -> Result<MessageEnvelope<T>, IpcError> {
        self.reader.receive().await
    }

    async fn close(&mut self) -> Result<(), IpcError> {
        self.writer.close().await
    }
}

/// Map a socket id to a platform local socket name.
///
/// Namespaced names are used where the platform has them (Linux abstract
/// sockets, Windows named pipes); elsewhere a socket file in the temp dir.
pub fn local_socket_name(id: &str) -> Result<Name<'static>, IpcError> {
    let file_name = format!("{}.sock", id);

    let name = if GenericNamespaced::is_supported() {
        file_name.to_ns_name::<GenericNamespaced>()
    } else {
        std::env::temp_dir()
            .join(file_name)
            .to_fs_name::<GenericFilePath>()
    };

    name.map_err(|e| IpcError::socket(id, "naming", e))
}

/// Create the listening end of a worker socket
pub fn listen_local_socket(id: &str) -> Result<Listener, IpcError> {
    let name = local_socket_name(id)?;

    ListenerOptions::new()
        .name(name)
        .create_tokio()
        .map_err(|e| IpcError::socket(id, "listen", e))
}

/// Accept the worker's connection on a listener from [`listen_local_socket`]
pub async fn accept_local_socket(listener: &SocketListener) -> Result<SocketTransport, IpcError> {
    let stream = listener.accept().await?;

    Ok(socket_transport(stream))
}

/// Wrap an accepted or connected socket stream in a line transport
pub fn socket_transport(stream: Stream) -> SocketTransport {
    let (reader, writer) = stream.split();
    LineTransport::new(reader, writer)
}

/// Connect to a worker socket created by [`listen_local_socket`]
pub async fn connect_local_socket(id: &str) -> Result<SocketTransport, IpcError> {
    let name = local_socket_name(id)?;

    let stream = Stream::connect(name)
        .await
        .map_err(|e| IpcError::socket(id, "connect", e))?;

    Ok(socket_transport(stream))
}
