//! Error types
//!
//! The SDK shares one error type across the stack: the transport's
//! [`Error`], which covers discovery, connection, process, decode, control,
//! timeout, cancellation, and closed-transport failures. Decode and
//! transport failures that happen on the reader side are surfaced on the
//! error stream instead of being returned from calls.

pub use jetclaude_transport::{CallbackError, Error, Result};
