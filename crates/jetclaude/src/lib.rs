//! # jetclaude
//!
//! A Rust SDK that drives the Claude Code CLI as a co-process. The SDK
//! spawns the CLI, exchanges newline-delimited JSON over its stdio, and
//! exposes three surfaces over that single pipe: the event stream of
//! messages the assistant produces, outbound user prompts, and a
//! bidirectional control plane for synchronous operations (interrupts,
//! configuration changes, tool-permission and hook callbacks).
//!
//! ## One-shot queries
//!
//! ```no_run
//! use jetclaude::{query, Message};
//!
//! #[tokio::main]
//! async fn main() -> jetclaude::Result<()> {
//!     let mut stream = query("What is 2 + 2?", None).await?;
//!     while let Some(message) = stream.next().await {
//!         if let Message::Assistant(assistant) = message? {
//!             println!("{}", assistant.message.text());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Interactive sessions
//!
//! ```no_run
//! use jetclaude::{Client, Message, Options};
//!
//! # async fn example() -> jetclaude::Result<()> {
//! let client = Client::new(Options::builder().model("sonnet").build())?;
//! client.connect().await?;
//!
//! let mut messages = client.messages().expect("first take");
//! client.send_prompt("Summarize src/main.rs").await?;
//!
//! while let Some(message) = messages.recv().await {
//!     match message {
//!         Message::Assistant(m) => println!("{}", m.message.text()),
//!         Message::Result(_) => break,
//!         _ => {}
//!     }
//! }
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Tool permissions
//!
//! ```no_run
//! use std::sync::Arc;
//! use jetclaude::{Options, PermissionResult};
//!
//! let options = Options::builder()
//!     .can_use_tool(Arc::new(|tool_name, _input, _context| {
//!         Box::pin(async move {
//!             if tool_name == "Bash" {
//!                 Ok(PermissionResult::deny("no shell access"))
//!             } else {
//!                 Ok(PermissionResult::allow())
//!             }
//!         })
//!     }))
//!     .build();
//! ```
//!
//! ## Hooks
//!
//! Hooks observe session events (`PreToolUse`, `Stop`, ...) and can steer
//! execution. Inputs arrive as typed [`HookInput`] variants dispatched on
//! the event name:
//!
//! ```no_run
//! use std::sync::Arc;
//! use jetclaude::{HookEvent, HookInput, HookMatcherSpec, HookOutput, Options};
//!
//! let options = Options::builder()
//!     .hook(
//!         HookEvent::PreToolUse,
//!         HookMatcherSpec {
//!             matcher: Some("Bash".to_string()),
//!             hooks: vec![Arc::new(|input, _tool_use_id| {
//!                 Box::pin(async move {
//!                     if let HookInput::PreToolUse(pre) = &input {
//!                         tracing::info!(tool = %pre.tool_name, "tool starting");
//!                     }
//!                     Ok(HookOutput::continue_execution())
//!                 })
//!             })],
//!             timeout: None,
//!         },
//!     )
//!     .build();
//! ```
//!
//! ## Architecture
//!
//! - [`jetclaude_protocol`]: the wire data model (messages, content blocks,
//!   control frames, hook and permission types)
//! - [`jetclaude_transport`]: the subprocess supervisor, stdio framing, and
//!   the correlated control channel
//! - this crate: the [`Client`] facade, [`query`] entry points, [`Options`]
//!   surface, and in-process [`mcp`] tool servers

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod mcp;
pub mod options;
pub mod query;

// The caller-facing surface, re-exported flat
pub use client::{with_client, Client};
pub use error::{CallbackError, Error, Result};
pub use options::{
    AgentDefinition, Options, OptionsBuilder, OutputFormat, PluginConfig, StderrCallback,
    SystemPromptConfig, ToolsConfig,
};
pub use query::{query, query_stream, MessageStream};

// Protocol types callers pattern-match on
pub use jetclaude_protocol::content::ContentBlock;
pub use jetclaude_protocol::control::{
    AccountInfo, InitializeResponse, ModelInfo, RewindFilesResult, SlashCommand,
};
pub use jetclaude_protocol::hooks::{HookEvent, HookInput, HookOutput};
pub use jetclaude_protocol::mcp::{
    McpServerConfig, McpServerStatus, McpSetServersResult, McpToolDefinition, McpToolResult,
};
pub use jetclaude_protocol::message::{
    ApiMessage, AssistantMessage, Message, ResultMessage, StreamEvent, SystemMessage, UserMessage,
};
pub use jetclaude_protocol::permissions::{
    CanUseToolOptions, PermissionBehavior, PermissionMode, PermissionResult, PermissionRule,
    PermissionUpdate,
};

// Transport types that appear in the public surface
pub use jetclaude_transport::{
    CanUseToolCallback, HookCallback, HookMatcherSpec, Mode, SessionState, StreamMessage,
    ToolServer, DEFAULT_SESSION_ID,
};

/// Version of the SDK
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
