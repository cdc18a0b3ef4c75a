//! Wire protocol types for the jetclaude SDK
//!
//! This crate defines the data model shared between the transport engine and
//! the client-facing crate: every record that crosses the Claude Code CLI's
//! stdio pipe has a typed representation here.
//!
//! # Type Organization
//!
//! - **Message types**: [`message`] - the tagged message variants emitted on
//!   the event stream, plus the nested API message
//! - **Content types**: [`content`] - content blocks inside assistant and
//!   user messages
//! - **Control frames**: [`control`] - correlated request/response frames and
//!   the initialization handshake payloads
//! - **Hook types**: [`hooks`] - hook events, typed hook inputs, hook outputs
//! - **Permission types**: [`permissions`] - permission modes, results, and
//!   runtime permission updates
//! - **MCP types**: [`mcp`] - server configuration, status, and tool shapes
//! - **Error types**: [`error`] - decode errors
//!
//! # Design Principles
//!
//! - **Zero I/O**: all types are pure data structures
//! - **Forward compatible**: every tagged union carries an opaque `Raw` tail;
//!   an unknown tag is never a decode error
//! - **Lossless**: decoding then re-encoding a known record preserves the
//!   fields this crate enumerates

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod content;
pub mod control;
pub mod error;
pub mod hooks;
pub mod mcp;
pub mod message;
pub mod permissions;

// Re-export commonly used types at crate level
pub use content::ContentBlock;
pub use control::{
    AccountInfo, ControlRequest, ControlResponse, InitializeResponse, ModelInfo, ResponsePayload,
    RewindFilesResult, SlashCommand,
};
pub use error::{ProtocolError, Result};
pub use hooks::{HookEvent, HookInput, HookMatcherConfig, HookOutput};
pub use mcp::{
    McpServerConfig, McpServerStatus, McpSetServersResult, McpToolDefinition, McpToolResult,
    McpToolResultContent,
};
pub use message::{
    parse_message, parse_message_line, ApiMessage, AssistantMessage, AuthStatusMessage,
    CompactBoundaryMessage, HookProgressMessage, HookResponseMessage, HookStartedMessage, Message,
    RawMessage, ResultMessage, StatusMessage, StreamEvent, SystemMessage, TaskNotificationMessage,
    ToolProgressMessage, ToolUseSummaryMessage, Usage, UserContent, UserMessage, UserMessageReplay,
};
pub use permissions::{
    CanUseToolOptions, PermissionBehavior, PermissionMode, PermissionResult, PermissionRule,
    PermissionUpdate,
};
