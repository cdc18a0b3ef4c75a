//! MCP configuration, status, and tool types
//!
//! Server configurations are passed to the CLI (at startup or via
//! `mcp_set_servers`); statuses come back from `mcp_status`; the tool shapes
//! are the surface an in-process tool server presents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Configuration of one MCP server, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpServerConfig {
    /// A server launched as a subprocess speaking stdio
    Stdio {
        /// Command to launch
        command: String,
        /// Arguments to the command
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        /// Environment for the server process
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        env: HashMap<String, String>,
    },

    /// A server reached over server-sent events
    Sse {
        /// Server URL
        url: String,
        /// Extra request headers
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },

    /// A server reached over streamable HTTP
    Http {
        /// Server URL
        url: String,
        /// Extra request headers
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },

    /// An in-process server hosted by this SDK
    ///
    /// Only the name crosses the wire; calls come back as `mcp_message`
    /// control requests.
    Sdk {
        /// Server name
        name: String,
    },
}

/// Status of one MCP server, as reported by `mcp_status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServerStatus {
    /// Server name
    pub name: String,

    /// Connection status, e.g. `"connected"`
    #[serde(default)]
    pub status: String,

    /// Server identity, when connected
    #[serde(
        rename = "serverInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub server_info: Option<McpServerInfo>,

    /// Connection error, when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Configuration scope the server came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Tools the server exposes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<McpToolInfo>,
}

/// Name and version a server reported at connect time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    #[serde(default)]
    pub version: String,
}

/// One tool listed in a server status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpToolInfo {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Result of `mcp_set_servers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct McpSetServersResult {
    /// Servers that were added
    #[serde(default)]
    pub added: Vec<String>,

    /// Servers that were removed
    #[serde(default)]
    pub removed: Vec<String>,

    /// Per-server errors, keyed by server name
    #[serde(default)]
    pub errors: HashMap<String, String>,
}

/// Description of one tool an in-process server exposes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpToolDefinition {
    /// Tool name
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON schema of the tool input
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Result of one in-process tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct McpToolResult {
    /// Ordered result content
    pub content: Vec<McpToolResultContent>,

    /// Whether the call failed
    #[serde(rename = "isError", default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl McpToolResult {
    /// A successful text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpToolResultContent::text(text)],
            is_error: false,
        }
    }

    /// A failed text result
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpToolResultContent::text(text)],
            is_error: true,
        }
    }
}

/// One content item in a tool result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpToolResultContent {
    /// Content type, normally `"text"`
    #[serde(rename = "type")]
    pub content_type: String,

    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl McpToolResultContent {
    /// A text content item
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
