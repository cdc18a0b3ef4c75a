//! In-process MCP tool servers
//!
//! An [`SdkMcpServer`] runs inside your process: the CLI calls its tools
//! through `mcp_message` control requests, with no subprocess or socket in
//! between. Tools are registered as closures; [`SdkMcpServer::typed_tool`]
//! derives the input schema from a Rust type.
//!
//! # Example
//!
//! ```no_run
//! use jetclaude::mcp::SdkMcpServer;
//! use jetclaude_protocol::mcp::McpToolResult;
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct AddInput {
//!     a: i64,
//!     b: i64,
//! }
//!
//! let calculator = SdkMcpServer::new("calculator")
//!     .version("1.0.0")
//!     .typed_tool("add", "Add two numbers", |input: AddInput| async move {
//!         Ok(McpToolResult::text((input.a + input.b).to_string()))
//!     });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use schemars::{gen::SchemaGenerator, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use jetclaude_protocol::mcp::{McpToolDefinition, McpToolResult};
use jetclaude_transport::{CallbackError, CallbackFuture, ToolServer};

type ToolHandler =
    Arc<dyn Fn(Map<String, Value>) -> CallbackFuture<Result<McpToolResult, CallbackError>> + Send + Sync>;

struct RegisteredTool {
    definition: McpToolDefinition,
    handler: ToolHandler,
}

/// A tool server hosted in this process
///
/// Register it through
/// [`OptionsBuilder::tool_server`](crate::options::OptionsBuilder::tool_server);
/// the SDK advertises it at initialization and routes calls back here.
pub struct SdkMcpServer {
    name: String,
    version: String,
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl SdkMcpServer {
    /// Create a server with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Set the server version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Register a tool with an explicit input schema
    pub fn tool<F, Fut>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<McpToolResult, CallbackError>> + Send + 'static,
    {
        let name = name.into();
        let definition = McpToolDefinition {
            name: name.clone(),
            description: description.into(),
            input_schema,
        };
        let handler: ToolHandler = Arc::new(move |args| Box::pin(handler(args)));
        self.order.push(name.clone());
        self.tools.insert(
            name,
            RegisteredTool {
                definition,
                handler,
            },
        );
        self
    }

    /// Register a tool whose input schema is derived from its input type
    pub fn typed_tool<I, F, Fut>(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Self
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<McpToolResult, CallbackError>> + Send + 'static,
    {
        let schema = SchemaGenerator::default().into_root_schema_for::<I>();
        let schema = serde_json::to_value(schema).unwrap_or_else(|_| {
            serde_json::json!({"type": "object", "additionalProperties": true})
        });
        let handler = Arc::new(handler);
        self.tool(name, description, schema, move |args| {
            let handler = Arc::clone(&handler);
            async move {
                let input: I = serde_json::from_value(Value::Object(args))
                    .map_err(|err| format!("invalid tool input: {err}"))?;
                handler(input).await
            }
        })
    }
}

#[async_trait::async_trait]
impl ToolServer for SdkMcpServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn list_tools(&self) -> Vec<McpToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition.clone())
            .collect()
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<McpToolResult, CallbackError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| format!("unknown tool: {name}"))?;
        (tool.handler)(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct EchoInput {
        text: String,
        #[serde(default)]
        repeat: Option<u32>,
    }

    fn echo_server() -> SdkMcpServer {
        SdkMcpServer::new("echo")
            .version("2.0.0")
            .typed_tool("echo", "Echo text back", |input: EchoInput| async move {
                let count = input.repeat.unwrap_or(1) as usize;
                Ok(McpToolResult::text(input.text.repeat(count)))
            })
    }

    #[tokio::test]
    async fn typed_tool_roundtrip() {
        let server = echo_server();
        assert_eq!(server.name(), "echo");
        assert_eq!(ToolServer::version(&server), "2.0.0");

        let args = json!({"text": "ab", "repeat": 3})
            .as_object()
            .cloned()
            .unwrap();
        let result = server.call_tool("echo", args).await.unwrap();
        assert_eq!(result.content[0].text.as_deref(), Some("ababab"));
    }

    #[tokio::test]
    async fn typed_tool_rejects_bad_input() {
        let server = echo_server();
        let args = json!({"repeat": 1}).as_object().cloned().unwrap();
        let err = server.call_tool("echo", args).await.unwrap_err();
        assert!(err.to_string().contains("invalid tool input"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let server = echo_server();
        let err = server.call_tool("nope", Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[test]
    fn derived_schema_describes_the_input() {
        let server = echo_server();
        let tools = server.list_tools();
        assert_eq!(tools.len(), 1);
        let schema = &tools[0].input_schema;
        assert!(schema["properties"]["text"].is_object());
    }

    #[test]
    fn tools_list_in_registration_order() {
        let server = SdkMcpServer::new("multi")
            .tool("b", "", json!({"type": "object"}), |_| async {
                Ok(McpToolResult::text(""))
            })
            .tool("a", "", json!({"type": "object"}), |_| async {
                Ok(McpToolResult::text(""))
            });
        let names: Vec<_> = server.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
