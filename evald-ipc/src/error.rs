//! IPC error types

use thiserror::Error;

/// Longest excerpt of a rejected line kept in [`IpcError::MalformedLine`]
const EXCERPT_LEN: usize = 120;

#[derive(Debug, Error)]
pub enum IpcError {
    /// A line arrived that is not a valid envelope. Later lines may still be fine.
    #[error("Malformed message line ({reason}): {excerpt}")]
    MalformedLine { excerpt: String, reason: String },

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Stream error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed its end
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// A local socket could not be named, bound, accepted or connected
    #[error("Socket '{name}' {operation} failed: {source}")]
    Socket {
        name: String,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl IpcError {
    pub(crate) fn malformed(line: &str, err: serde_json::Error) -> Self {
        let excerpt = match line.char_indices().nth(EXCERPT_LEN) {
            Some((end, _)) => format!("{}...", &line[..end]),
            None => line.to_string(),
        };
        IpcError::MalformedLine {
            excerpt,
            reason: err.to_string(),
        }
    }

    pub(crate) fn socket(name: &str, operation: &'static str, source: std::io::Error) -> Self {
        IpcError::Socket {
            name: name.to_string(),
            operation,
            source,
        }
    }

    /// True when the conversation with the peer cannot continue
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IpcError::MalformedLine { .. } | IpcError::Encode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error(input: &str) -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>(input).unwrap_err()
    }

    #[test]
    fn test_only_bad_messages_are_recoverable() {
        assert!(IpcError::ConnectionClosed.is_fatal());
        assert!(IpcError::VersionMismatch { expected: 1, actual: 2 }.is_fatal());
        assert!(IpcError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(!IpcError::malformed("{not json", json_error("{not json")).is_fatal());
    }

    #[test]
    fn test_malformed_line_excerpt_is_bounded() {
        let line = "é".repeat(500);
        let IpcError::MalformedLine { excerpt, .. } = IpcError::malformed(&line, json_error(&line))
        else {
            panic!("expected a malformed line error");
        };
        assert_eq!(excerpt.chars().count(), EXCERPT_LEN + 3);
        assert!(excerpt.ends_with("..."));
    }
}
