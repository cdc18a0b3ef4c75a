//! Transport error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by caller-registered callbacks
///
/// Callback failures never propagate out of the dispatcher; they are encoded
/// into control error responses.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in transport operations
#[derive(Debug, Error)]
pub enum Error {
    /// The CLI executable could not be located
    #[error("{message}")]
    CliNotFound {
        /// Human-readable explanation including an install hint
        message: String,
        /// The locations that were searched
        searched: Vec<PathBuf>,
    },

    /// Failure to spawn, pipe, or hand off I/O to the child
    #[error("connection error: {message}")]
    Connection {
        /// What failed
        message: String,
        /// Underlying cause, when there is one
        #[source]
        source: Option<std::io::Error>,
    },

    /// The child exited abnormally
    #[error("process error (exit {exit_code:?}): {message}")]
    Process {
        /// What happened
        message: String,
        /// Exit code, when the child exited on its own
        exit_code: Option<i32>,
        /// Tail of the captured stderr
        stderr: String,
    },

    /// A line could not be decoded as a record
    #[error("decode error: {message} (line: {line})")]
    Decode {
        /// What went wrong
        message: String,
        /// Prefix of the offending line, at most 100 characters
        line: String,
    },

    /// The remote answered a control request with an error
    #[error("control error (request {request_id}): {message}")]
    Control {
        /// Identifier of the failed request
        request_id: String,
        /// Remote error message
        message: String,
    },

    /// A caller-imposed deadline elapsed
    #[error("timeout: {operation}")]
    Timeout {
        /// The operation that timed out
        operation: String,
    },

    /// The session or operation was cancelled
    #[error("operation aborted")]
    Aborted,

    /// An operation was attempted on a transport that is not connected
    #[error("transport not connected")]
    Closed,

    /// An I/O error outside the categories above
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a decode error, truncating the line to its first 100 characters
    pub fn decode(message: impl Into<String>, line: &str) -> Self {
        Self::Decode {
            message: message.into(),
            line: truncate(line, 100),
        }
    }

    /// Build a connection error without an I/O cause
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_truncates_long_lines() {
        let long = "x".repeat(500);
        let err = Error::decode("bad json", &long);
        let Error::Decode { line, .. } = &err else {
            panic!("expected decode error");
        };
        assert_eq!(line.len(), 103); // 100 chars + ellipsis
    }

    #[test]
    fn control_error_names_the_request() {
        let err = Error::Control {
            request_id: "sdk-req-3".to_string(),
            message: "no such model".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("sdk-req-3"));
        assert!(text.contains("no such model"));
    }
}
