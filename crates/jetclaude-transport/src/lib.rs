//! Subprocess transport and control protocol engine for the jetclaude SDK
//!
//! This crate owns everything between the caller-facing client and the CLI
//! co-process:
//!
//! - **Framing** ([`framer`]): newline-delimited JSON over the child's
//!   stdio, with a 1 MiB line cap and a single serializing stdin writer
//! - **Supervision** ([`subprocess`]): spawn, environment assembly, stderr
//!   capture, the reader task, and graceful termination
//! - **Control channel** ([`control`]): correlated request/response in both
//!   directions over the shared pipe, plus dispatch of inbound
//!   tool-permission, hook, and in-process MCP requests
//! - **CLI discovery** ([`discovery`]) and **flag translation**
//!   ([`command`])
//!
//! The transport is deliberately policy-free: no retries, no persistence,
//! no interpretation of tool semantics.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod control;
pub mod discovery;
pub mod error;
pub mod framer;
pub mod subprocess;

// Re-export commonly used types
pub use command::{build_command, build_command_with_prompt, CommandOptions};
pub use control::{
    CallbackFuture, CallbackRegistry, CanUseToolCallback, ControlHandler, HookCallback,
    HookMatcherSpec, InitializeParams, ToolServer,
};
pub use discovery::{find_cli, validate_working_directory};
pub use error::{CallbackError, Error, Result};
pub use framer::{RecordWriter, MAX_LINE_BYTES};
pub use subprocess::{
    Mode, SessionState, StreamMessage, SubprocessTransport, DEFAULT_SESSION_ID,
    ENTRYPOINT_ENV, EVENT_CHANNEL_DEPTH,
};
