//! Buffers for a worker's stdout and stderr

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

/// Text captured from a worker's side streams since the previous drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// Bytes accumulated from one stream, shared with the task pumping it
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, chunk: &[u8]) {
        self.bytes.lock().extend_from_slice(chunk);
    }

    /// Take everything buffered so far, or `None` when nothing was written.
    ///
    /// A multi-byte character split across reads stays buffered until the
    /// rest of it arrives.
    pub fn drain(&self) -> Option<String> {
        let mut bytes = self.bytes.lock();
        if bytes.is_empty() {
            return None;
        }

        let complete = match std::str::from_utf8(&bytes) {
            Ok(_) => bytes.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => bytes.len(),
        };
        if complete == 0 {
            return None;
        }

        let taken: Vec<u8> = bytes.drain(..complete).collect();
        Some(String::from_utf8_lossy(&taken).into_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }
}

/// Copy a stream into a buffer until it closes
pub fn spawn_pump<R>(mut reader: R, buffer: OutputBuffer, stream: &'static str, worker_id: String) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    debug!("Worker {} {} closed", worker_id, stream);
                    break;
                }
                Ok(n) => buffer.append(&chunk[..n]),
                Err(e) => {
                    debug!("Failed to read worker {} {}: {}", worker_id, stream, e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_drain_empty_is_none() {
        let buffer = OutputBuffer::new();
        assert_eq!(buffer.drain(), None);
    }

    #[test]
    fn test_drain_takes_everything_once() {
        let buffer = OutputBuffer::new();
        buffer.append(b"hello ");
        buffer.append(b"world\n");
        assert_eq!(buffer.drain().as_deref(), Some("hello world\n"));
        assert_eq!(buffer.drain(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_keeps_partial_character() {
        let buffer = OutputBuffer::new();
        let snowman = "\u{2603}".as_bytes();
        buffer.append(b"a");
        buffer.append(&snowman[..1]);
        assert_eq!(buffer.drain().as_deref(), Some("a"));
        assert!(!buffer.is_empty());

        buffer.append(&snowman[1..]);
        assert_eq!(buffer.drain().as_deref(), Some("\u{2603}"));
    }

    #[test]
    fn test_drain_replaces_invalid_bytes() {
        let buffer = OutputBuffer::new();
        buffer.append(&[b'o', 0xff, b'k']);
        assert_eq!(buffer.drain().as_deref(), Some("o\u{fffd}k"));
    }

    #[tokio::test]
    async fn test_pump_copies_until_eof() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let buffer = OutputBuffer::new();
        let pump = spawn_pump(reader, buffer.clone(), "stdout", "w1".to_string());

        writer.write_all(b"line one\nline two\n").await.unwrap();
        drop(writer);
        pump.await.unwrap();

        assert_eq!(buffer.drain().as_deref(), Some("line one\nline two\n"));
    }
}
