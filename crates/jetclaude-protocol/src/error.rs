//! Decode error types

use thiserror::Error;

/// Result type for protocol decoding
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding records from the wire
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A record with a known `type` tag did not match that type's shape
    #[error("failed to parse {message_type:?} message: {source}")]
    MessageParse {
        /// The `type` tag of the offending record
        message_type: String,
        /// The underlying deserialization error
        source: serde_json::Error,
    },

    /// A content block with a known `type` tag did not match its shape
    #[error("failed to parse {block_type:?} content block: {source}")]
    ContentBlockParse {
        /// The `type` tag of the offending block
        block_type: String,
        /// The underlying deserialization error
        source: serde_json::Error,
    },

    /// A line was not valid JSON at all
    #[error("invalid JSON record: {0}")]
    Json(#[from] serde_json::Error),
}
