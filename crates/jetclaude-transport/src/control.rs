//! Correlated control channel and callback dispatch
//!
//! Outbound requests are allocated strictly increasing `sdk-req-N`
//! identifiers and parked in a pending table of one-shot completion slots;
//! the slot is inserted before the frame hits the wire and removed on
//! response, cancellation, or shutdown, so a late response is always safely
//! discarded. Inbound requests are dispatched to caller-registered
//! callbacks on short-lived tasks and answered with exactly one response
//! frame each.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use serde_json::{json, Map, Value};

use jetclaude_protocol::control::{
    ControlRequest, ControlResponse, InitializeResponse, ResponsePayload, RewindFilesResult,
};
use jetclaude_protocol::hooks::{HookInput, HookMatcherConfig, HookOutput};
use jetclaude_protocol::mcp::{
    McpServerConfig, McpServerStatus, McpSetServersResult, McpToolDefinition, McpToolResult,
};
use jetclaude_protocol::permissions::{CanUseToolOptions, PermissionMode, PermissionResult};
use jetclaude_protocol::HookEvent;

use crate::error::{CallbackError, Error, Result};
use crate::framer::RecordWriter;

/// Boxed future returned by caller-registered callbacks
pub type CallbackFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Tool-permission callback
///
/// Receives the tool name, its input, and the decision context; returns the
/// permission result encoded back to the CLI.
pub type CanUseToolCallback = Arc<
    dyn Fn(
            String,
            Map<String, Value>,
            CanUseToolOptions,
        ) -> CallbackFuture<std::result::Result<PermissionResult, CallbackError>>
        + Send
        + Sync,
>;

/// Hook callback
///
/// Receives the typed hook input and the tool use identifier when the event
/// concerns a tool.
pub type HookCallback = Arc<
    dyn Fn(
            HookInput,
            Option<String>,
        ) -> CallbackFuture<std::result::Result<HookOutput, CallbackError>>
        + Send
        + Sync,
>;

/// An in-process MCP tool server
///
/// The CLI reaches these servers through `mcp_message` control requests; the
/// dispatcher forwards `tools/list` and `tools/call` to the implementation.
#[async_trait::async_trait]
pub trait ToolServer: Send + Sync {
    /// Server name, as referenced in the server configuration
    fn name(&self) -> &str;

    /// Server version
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// The tools this server exposes
    fn list_tools(&self) -> Vec<McpToolDefinition>;

    /// Invoke a tool by name
    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> std::result::Result<McpToolResult, CallbackError>;
}

/// One hook matcher entry as registered by the caller
#[derive(Clone)]
pub struct HookMatcherSpec {
    /// Matcher string the CLI applies to tool names (`None` matches all)
    pub matcher: Option<String>,

    /// Callbacks to run when the matcher fires, in order
    pub hooks: Vec<HookCallback>,

    /// Per-hook timeout in seconds, enforced by the CLI
    pub timeout: Option<u64>,
}

/// Caller-registered callbacks, installed once at session creation
#[derive(Default, Clone)]
pub struct CallbackRegistry {
    /// Tool-permission callback
    pub can_use_tool: Option<CanUseToolCallback>,

    /// Hook matchers per event
    pub hooks: HashMap<HookEvent, Vec<HookMatcherSpec>>,

    /// In-process tool servers, keyed by server name
    pub tool_servers: HashMap<String, Arc<dyn ToolServer>>,
}

/// Parameters of the `initialize` handshake not derived from the registry
#[derive(Default, Clone)]
pub struct InitializeParams {
    /// JSON schema for structured output
    pub json_schema: Option<Value>,

    /// System prompt override
    pub system_prompt: Option<String>,

    /// Text appended to the system prompt
    pub append_system_prompt: Option<String>,

    /// Agent catalog
    pub agents: Option<Map<String, Value>>,
}

/// The control channel over one transport
///
/// Owns the pending-request table; shares the stdin writer with the rest of
/// the transport so responses and requests serialize under the same lock.
pub struct ControlHandler {
    writer: Arc<RecordWriter>,
    next_request_id: AtomicU64,
    pending: Mutex<HashMap<String, oneshot::Sender<ResponsePayload>>>,

    can_use_tool: Option<CanUseToolCallback>,
    hooks_by_id: HashMap<String, HookCallback>,
    wire_hooks: HashMap<HookEvent, Vec<HookMatcherConfig>>,
    tool_servers: HashMap<String, Arc<dyn ToolServer>>,
}

impl ControlHandler {
    /// Build a handler over the given writer with the given registries
    ///
    /// Hook callbacks are assigned identifiers of the form `{event}_{n}`
    /// here; the identifiers are sent to the CLI in `initialize` and come
    /// back in `hook_callback` requests.
    pub fn new(writer: Arc<RecordWriter>, registry: CallbackRegistry) -> Self {
        let mut hooks_by_id = HashMap::new();
        let mut wire_hooks = HashMap::new();

        for (event, matchers) in registry.hooks {
            let mut configs = Vec::with_capacity(matchers.len());
            let mut next_index = 0usize;
            for matcher in matchers {
                let mut ids = Vec::with_capacity(matcher.hooks.len());
                for callback in matcher.hooks {
                    let id = format!("{}_{}", event.as_str(), next_index);
                    next_index += 1;
                    hooks_by_id.insert(id.clone(), callback);
                    ids.push(id);
                }
                configs.push(HookMatcherConfig {
                    matcher: matcher.matcher,
                    hook_callback_ids: ids,
                    timeout: matcher.timeout,
                });
            }
            wire_hooks.insert(event, configs);
        }

        Self {
            writer,
            next_request_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            can_use_tool: registry.can_use_tool,
            hooks_by_id,
            wire_hooks,
            tool_servers: registry.tool_servers,
        }
    }

    fn next_request_id(&self) -> String {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("sdk-req-{id}")
    }

    /// Send a control request and await its correlated response
    ///
    /// Cancelling the returned future removes the pending slot, so a
    /// response arriving afterwards is silently discarded. A response of
    /// subtype `error` is returned as [`Error::Control`].
    pub async fn send_request(
        &self,
        subtype: &str,
        mut payload: Map<String, Value>,
    ) -> Result<ResponsePayload> {
        let request_id = self.next_request_id();

        let (sender, receiver) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending table lock poisoned")
            .insert(request_id.clone(), sender);
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id: &request_id,
        };

        payload.insert("subtype".to_string(), json!(subtype));
        let frame = ControlRequest::new(request_id.as_str(), payload);
        let line = serde_json::to_string(&frame)?;
        self.writer.write_record(&line).await?;
        debug!(request_id = %request_id, subtype, "control request sent");

        let response = receiver.await.map_err(|_| Error::Closed)?;
        if response.is_error() {
            return Err(Error::Control {
                request_id: request_id.clone(),
                message: response.error.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    /// Deliver an inbound `control_response` frame
    ///
    /// A response whose `request_id` has no pending slot is dropped.
    pub fn handle_response(&self, payload: ResponsePayload) {
        let slot = self
            .pending
            .lock()
            .expect("pending table lock poisoned")
            .remove(&payload.request_id);
        match slot {
            Some(sender) => {
                let _ = sender.send(payload);
            }
            None => {
                debug!(request_id = %payload.request_id, "dropping response with no pending request");
            }
        }
    }

    /// Dispatch an inbound `control_request` frame on a short-lived task
    ///
    /// The task runs the callback and writes exactly one response frame, so
    /// a slow callback never stalls the reader.
    pub fn handle_request(self: Arc<Self>, frame: ControlRequest) {
        let handler = self;
        tokio::spawn(async move {
            let response = handler.dispatch_request(&frame).await;
            match serde_json::to_string(&response) {
                Ok(line) => {
                    if let Err(error) = handler.writer.write_record(&line).await {
                        warn!(request_id = %frame.request_id, %error, "failed to write control response");
                    }
                }
                Err(error) => {
                    warn!(request_id = %frame.request_id, %error, "failed to encode control response");
                }
            }
        });
    }

    /// Fail every outstanding request with a transport-closed error
    ///
    /// Called at shutdown; leaves the pending table empty.
    pub fn fail_all_pending(&self) {
        let drained: Vec<_> = self
            .pending
            .lock()
            .expect("pending table lock poisoned")
            .drain()
            .collect();
        for (request_id, sender) in drained {
            debug!(request_id = %request_id, "failing pending request on shutdown");
            drop(sender);
        }
    }

    /// Number of requests currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .expect("pending table lock poisoned")
            .len()
    }

    async fn dispatch_request(&self, frame: &ControlRequest) -> ControlResponse {
        let subtype = frame.subtype().unwrap_or_default().to_owned();
        debug!(request_id = %frame.request_id, subtype = %subtype, "control request received");

        let outcome = match subtype.as_str() {
            "can_use_tool" => self.dispatch_can_use_tool(&frame.request).await,
            "hook_callback" => self.dispatch_hook_callback(&frame.request).await,
            "mcp_message" => self.dispatch_mcp_message(&frame.request).await,
            other => Err(format!("unknown request subtype: {other}").into()),
        };

        match outcome {
            Ok(response) => ControlResponse::success(frame.request_id.as_str(), Some(response)),
            Err(error) => ControlResponse::error(frame.request_id.as_str(), error.to_string()),
        }
    }

    async fn dispatch_can_use_tool(
        &self,
        request: &Map<String, Value>,
    ) -> std::result::Result<Map<String, Value>, CallbackError> {
        let input = request
            .get("input")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let Some(callback) = &self.can_use_tool else {
            // No callback registered: allow, echoing the input unchanged.
            let mut response = Map::new();
            response.insert("behavior".to_string(), json!("allow"));
            response.insert("updated_input".to_string(), Value::Object(input));
            return Ok(response);
        };

        let tool_name = request
            .get("tool_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let options = CanUseToolOptions {
            suggestions: request
                .get("permission_suggestions")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
            blocked_path: request
                .get("blocked_path")
                .and_then(Value::as_str)
                .map(String::from),
            decision_reason: request
                .get("decision_reason")
                .and_then(Value::as_str)
                .map(String::from),
            tool_use_id: request
                .get("tool_use_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            agent_id: request
                .get("agent_id")
                .and_then(Value::as_str)
                .map(String::from),
        };

        let result = callback(tool_name, input.clone(), options).await?;

        let mut response = Map::new();
        match result {
            PermissionResult::Allow {
                updated_input,
                updated_permissions,
            } => {
                response.insert("behavior".to_string(), json!("allow"));
                response.insert(
                    "updated_input".to_string(),
                    Value::Object(updated_input.unwrap_or(input)),
                );
                if let Some(updates) = updated_permissions {
                    if !updates.is_empty() {
                        response
                            .insert("updated_permissions".to_string(), serde_json::to_value(updates)?);
                    }
                }
            }
            PermissionResult::Deny { message, interrupt } => {
                response.insert("behavior".to_string(), json!("deny"));
                response.insert("message".to_string(), json!(message));
                if interrupt {
                    response.insert("interrupt".to_string(), json!(true));
                }
            }
            PermissionResult::Ask => {
                response.insert("behavior".to_string(), json!("ask"));
            }
        }
        Ok(response)
    }

    async fn dispatch_hook_callback(
        &self,
        request: &Map<String, Value>,
    ) -> std::result::Result<Map<String, Value>, CallbackError> {
        let callback_id = request
            .get("callback_id")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let Some(callback) = self.hooks_by_id.get(callback_id) else {
            // Unknown callback id: let execution continue.
            let mut response = Map::new();
            response.insert("continue".to_string(), json!(true));
            return Ok(response);
        };

        let tool_use_id = request
            .get("tool_use_id")
            .and_then(Value::as_str)
            .map(String::from);

        // Best-effort decode; a malformed input still reaches the callback
        // as a raw variant.
        let input_value = request.get("input").cloned().unwrap_or(Value::Null);
        let input: HookInput = serde_json::from_value(input_value)
            .unwrap_or_else(|_| HookInput::Raw(Map::new()));

        let output = callback(input, tool_use_id).await?;
        match serde_json::to_value(&output)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    async fn dispatch_mcp_message(
        &self,
        request: &Map<String, Value>,
    ) -> std::result::Result<Map<String, Value>, CallbackError> {
        let server_name = request
            .get("server_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let server = self
            .tool_servers
            .get(server_name)
            .ok_or_else(|| format!("unknown sdk mcp server: {server_name}"))?;

        let message = request
            .get("message")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let id = message.get("id").cloned().unwrap_or(Value::Null);
        let params = message
            .get("params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let result: std::result::Result<Value, String> = match method {
            "initialize" => Ok(json!({
                "protocolVersion": params
                    .get("protocolVersion")
                    .cloned()
                    .unwrap_or_else(|| json!("2024-11-05")),
                "capabilities": {"tools": {}},
                "serverInfo": {"name": server.name(), "version": server.version()},
            })),
            "notifications/initialized" => {
                // Notification; acknowledge with an empty response body.
                return Ok(Map::new());
            }
            "tools/list" => Ok(json!({"tools": server.list_tools()})),
            "tools/call" => {
                let tool_name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let args = params
                    .get("arguments")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                match server.call_tool(tool_name, args).await {
                    Ok(result) => Ok(serde_json::to_value(result)?),
                    Err(error) => Err(error.to_string()),
                }
            }
            other => Err(format!("method not found: {other}")),
        };

        let rpc = match result {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(message) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": message},
            }),
        };

        let mut response = Map::new();
        response.insert("mcp_response".to_string(), rpc);
        Ok(response)
    }
}

/// Removes the pending slot when a `send_request` future is dropped
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<String, oneshot::Sender<ResponsePayload>>>,
    request_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(self.request_id);
        }
    }
}

// ===== Typed outbound operations =====

impl ControlHandler {
    /// The hook matcher map sent in `initialize`
    pub fn wire_hooks(&self) -> &HashMap<HookEvent, Vec<HookMatcherConfig>> {
        &self.wire_hooks
    }

    /// Perform the `initialize` handshake
    pub async fn initialize(&self, params: InitializeParams) -> Result<InitializeResponse> {
        let mut payload = Map::new();

        if !self.wire_hooks.is_empty() {
            let mut hooks = Map::new();
            for (event, matchers) in &self.wire_hooks {
                hooks.insert(event.as_str().to_string(), serde_json::to_value(matchers)?);
            }
            payload.insert("hooks".to_string(), Value::Object(hooks));
        }
        if !self.tool_servers.is_empty() {
            let mut names: Vec<&str> = self.tool_servers.keys().map(String::as_str).collect();
            names.sort_unstable();
            payload.insert("sdkMcpServers".to_string(), json!(names));
        }
        if let Some(schema) = params.json_schema {
            payload.insert("jsonSchema".to_string(), schema);
        }
        if let Some(prompt) = params.system_prompt {
            payload.insert("systemPrompt".to_string(), json!(prompt));
        }
        if let Some(prompt) = params.append_system_prompt {
            payload.insert("appendSystemPrompt".to_string(), json!(prompt));
        }
        if let Some(agents) = params.agents {
            if !agents.is_empty() {
                payload.insert("agents".to_string(), Value::Object(agents));
            }
        }

        let response = self.send_request("initialize", payload).await?;
        let body = response.response.unwrap_or_default();
        serde_json::from_value(Value::Object(body)).map_err(Error::from)
    }

    /// Interrupt the current turn
    pub async fn interrupt(&self) -> Result<()> {
        self.send_request("interrupt", Map::new()).await?;
        Ok(())
    }

    /// Change the permission mode
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("mode".to_string(), json!(mode));
        self.send_request("set_permission_mode", payload).await?;
        Ok(())
    }

    /// Change the model; `None` resets to the default
    pub async fn set_model(&self, model: Option<&str>) -> Result<()> {
        let mut payload = Map::new();
        if let Some(model) = model {
            payload.insert("model".to_string(), json!(model));
        }
        self.send_request("set_model", payload).await?;
        Ok(())
    }

    /// Change the thinking-token budget; `None` removes the limit
    pub async fn set_max_thinking_tokens(&self, tokens: Option<u32>) -> Result<()> {
        let mut payload = Map::new();
        payload.insert(
            "max_thinking_tokens".to_string(),
            match tokens {
                Some(tokens) => json!(tokens),
                None => Value::Null,
            },
        );
        self.send_request("set_max_thinking_tokens", payload).await?;
        Ok(())
    }

    /// Rewind checkpointed files to the given user message
    pub async fn rewind_files(&self, user_message_id: &str) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("user_message_id".to_string(), json!(user_message_id));
        self.send_request("rewind_files", payload).await?;
        Ok(())
    }

    /// Rewind checkpointed files, optionally as a dry run, returning detail
    pub async fn rewind_files_with_options(
        &self,
        user_message_id: &str,
        dry_run: bool,
    ) -> Result<RewindFilesResult> {
        let mut payload = Map::new();
        payload.insert("user_message_id".to_string(), json!(user_message_id));
        if dry_run {
            payload.insert("dry_run".to_string(), json!(true));
        }
        let response = self.send_request("rewind_files", payload).await?;
        let body = response.response.unwrap_or_default();
        serde_json::from_value(Value::Object(body)).map_err(Error::from)
    }

    /// Ask a configured MCP server to reconnect
    pub async fn mcp_reconnect(&self, server_name: &str) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("server_name".to_string(), json!(server_name));
        self.send_request("mcp_reconnect", payload).await?;
        Ok(())
    }

    /// Enable or disable a configured MCP server
    pub async fn mcp_toggle(&self, server_name: &str, enabled: bool) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("server_name".to_string(), json!(server_name));
        payload.insert("enabled".to_string(), json!(enabled));
        self.send_request("mcp_toggle", payload).await?;
        Ok(())
    }

    /// Fetch the status of every configured MCP server
    pub async fn mcp_status(&self) -> Result<Vec<McpServerStatus>> {
        let response = self.send_request("mcp_status", Map::new()).await?;
        let statuses = response
            .response
            .unwrap_or_default()
            .remove("statuses")
            .unwrap_or_else(|| json!([]));
        serde_json::from_value(statuses).map_err(Error::from)
    }

    /// Replace the set of configured MCP servers
    pub async fn mcp_set_servers(
        &self,
        servers: &HashMap<String, McpServerConfig>,
    ) -> Result<McpSetServersResult> {
        let mut payload = Map::new();
        payload.insert("servers".to_string(), serde_json::to_value(servers)?);
        let response = self.send_request("mcp_set_servers", payload).await?;
        let body = response.response.unwrap_or_default();
        serde_json::from_value(Value::Object(body)).map_err(Error::from)
    }
}
