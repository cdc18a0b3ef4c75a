//! Message variants delivered on the event stream
//!
//! Every line the CLI writes on stdout (other than control frames) decodes
//! into exactly one [`Message`]. The set of known `type` tags is closed;
//! anything else decodes into [`Message::Raw`] so that callers can adopt
//! newer CLI features without an SDK change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::ContentBlock;
use crate::error::{ProtocolError, Result};

/// A message from the CLI, tagged by its top-level `type` field
///
/// Decoding is tag-then-dispatch, implemented by hand so that an unknown tag
/// falls through to [`Message::Raw`] with every top-level field intact.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A user message echoed back by the CLI (tool results, replays)
    User(UserMessage),

    /// An assistant turn carrying the nested API message
    Assistant(AssistantMessage),

    /// Final result of a query
    Result(ResultMessage),

    /// System notification (session init, hook output, status changes)
    System(SystemMessage),

    /// Partial-message streaming event
    StreamEvent(StreamEvent),

    /// Progress report for a long-running tool execution
    ToolProgress(ToolProgressMessage),

    /// Authentication state change
    AuthStatus(AuthStatusMessage),

    /// Replay of a user message from a resumed session
    UserMessageReplay(UserMessageReplay),

    /// Marker separating pre- and post-compaction history
    CompactBoundary(CompactBoundaryMessage),

    /// Free-form status line
    Status(StatusMessage),

    /// A hook began executing
    HookStarted(HookStartedMessage),

    /// Incremental output from a running hook
    HookProgress(HookProgressMessage),

    /// A hook finished executing
    HookResponse(HookResponseMessage),

    /// Notification about a background task
    TaskNotification(TaskNotificationMessage),

    /// Condensed summary of preceding tool uses
    ToolUseSummary(ToolUseSummaryMessage),

    /// A message whose `type` this crate does not know
    ///
    /// All top-level fields are preserved, including the tag.
    #[serde(untagged)]
    Raw(RawMessage),
}

impl Message {
    /// The `type` tag of this message
    pub fn message_type(&self) -> &str {
        match self {
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::Result(_) => "result",
            Self::System(_) => "system",
            Self::StreamEvent(_) => "stream_event",
            Self::ToolProgress(_) => "tool_progress",
            Self::AuthStatus(_) => "auth_status",
            Self::UserMessageReplay(_) => "user_message_replay",
            Self::CompactBoundary(_) => "compact_boundary",
            Self::Status(_) => "status",
            Self::HookStarted(_) => "hook_started",
            Self::HookProgress(_) => "hook_progress",
            Self::HookResponse(_) => "hook_response",
            Self::TaskNotification(_) => "task_notification",
            Self::ToolUseSummary(_) => "tool_use_summary",
            Self::Raw(raw) => raw.message_type(),
        }
    }

    /// The session identifier carried by this message (possibly empty)
    pub fn session_id(&self) -> &str {
        match self {
            Self::User(m) => &m.session_id,
            Self::Assistant(m) => &m.session_id,
            Self::Result(m) => &m.session_id,
            Self::System(m) => &m.session_id,
            Self::StreamEvent(m) => &m.session_id,
            Self::ToolProgress(m) => &m.session_id,
            Self::AuthStatus(m) => &m.session_id,
            Self::UserMessageReplay(m) => &m.session_id,
            Self::CompactBoundary(m) => &m.session_id,
            Self::Status(m) => &m.session_id,
            Self::HookStarted(m) => &m.session_id,
            Self::HookProgress(m) => &m.session_id,
            Self::HookResponse(m) => &m.session_id,
            Self::TaskNotification(m) => &m.session_id,
            Self::ToolUseSummary(m) => &m.session_id,
            Self::Raw(raw) => raw.session_id(),
        }
    }

    /// The unique identifier of this message (possibly empty)
    pub fn uuid(&self) -> &str {
        match self {
            Self::User(m) => &m.uuid,
            Self::Assistant(m) => &m.uuid,
            Self::Result(m) => &m.uuid,
            Self::System(m) => &m.uuid,
            Self::StreamEvent(m) => &m.uuid,
            Self::ToolProgress(m) => &m.uuid,
            Self::AuthStatus(m) => &m.uuid,
            Self::UserMessageReplay(m) => &m.uuid,
            Self::CompactBoundary(m) => &m.uuid,
            Self::Status(m) => &m.uuid,
            Self::HookStarted(m) => &m.uuid,
            Self::HookProgress(m) => &m.uuid,
            Self::HookResponse(m) => &m.uuid,
            Self::TaskNotification(m) => &m.uuid,
            Self::ToolUseSummary(m) => &m.uuid,
            Self::Raw(raw) => raw.uuid(),
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        fn dispatch<T, F, E>(value: Value, wrap: F) -> std::result::Result<Message, E>
        where
            T: serde::de::DeserializeOwned,
            F: FnOnce(T) -> Message,
            E: serde::de::Error,
        {
            serde_json::from_value(value).map(wrap).map_err(E::custom)
        }

        // Known tags are stripped of the tag field before field extraction;
        // the raw fallback keeps the whole object intact.
        let known = matches!(
            tag.as_str(),
            "user"
                | "assistant"
                | "result"
                | "system"
                | "stream_event"
                | "tool_progress"
                | "auth_status"
                | "user_message_replay"
                | "compact_boundary"
                | "status"
                | "hook_started"
                | "hook_progress"
                | "hook_response"
                | "task_notification"
                | "tool_use_summary"
        );
        if known {
            if let Some(object) = value.as_object_mut() {
                object.remove("type");
            }
        }

        match tag.as_str() {
            "user" => dispatch(value, Message::User),
            "assistant" => dispatch(value, Message::Assistant),
            "result" => dispatch(value, Message::Result),
            "system" => dispatch(value, Message::System),
            "stream_event" => dispatch(value, Message::StreamEvent),
            "tool_progress" => dispatch(value, Message::ToolProgress),
            "auth_status" => dispatch(value, Message::AuthStatus),
            "user_message_replay" => dispatch(value, Message::UserMessageReplay),
            "compact_boundary" => dispatch(value, Message::CompactBoundary),
            "status" => dispatch(value, Message::Status),
            "hook_started" => dispatch(value, Message::HookStarted),
            "hook_progress" => dispatch(value, Message::HookProgress),
            "hook_response" => dispatch(value, Message::HookResponse),
            "task_notification" => dispatch(value, Message::TaskNotification),
            "tool_use_summary" => dispatch(value, Message::ToolUseSummary),
            _ => dispatch(value, Message::Raw),
        }
    }
}

/// Parse a decoded JSON value into a [`Message`]
///
/// A shape mismatch within a known `type` fails with an error naming the
/// type. Unknown types never fail; they decode to [`Message::Raw`].
pub fn parse_message(value: Value) -> Result<Message> {
    let message_type = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    serde_json::from_value(value)
        .map_err(|source| ProtocolError::MessageParse {
            message_type,
            source,
        })
}

/// Parse one wire line into a [`Message`]
pub fn parse_message_line(line: &str) -> Result<Message> {
    let value: Value = serde_json::from_str(line)?;
    parse_message(value)
}

/// The role-and-content body of an outbound or echoed user message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContent {
    /// Message role, always `"user"`
    pub role: String,
    /// Free-form content: a string or an array of content blocks
    pub content: Value,
}

impl UserContent {
    /// Build a plain-text user content body
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Value::String(content.into()),
        }
    }
}

/// A user message echoed back by the CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserMessage {
    /// The nested role/content body
    pub message: UserContent,

    /// Tool use this message is nested under, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,

    /// Whether the CLI synthesized this message itself
    #[serde(rename = "isSynthetic", default, skip_serializing_if = "is_false")]
    pub is_synthetic: bool,

    /// Structured tool result attached to this message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_result: Option<Value>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// An assistant turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantMessage {
    /// The nested API message
    pub message: ApiMessage,

    /// Tool use this message is nested under, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,

    /// Error string attached by the CLI, if the turn failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// The Anthropic API message nested inside an assistant turn
///
/// Content order is significant and preserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiMessage {
    /// API message identifier
    #[serde(default)]
    pub id: String,

    /// API object type, normally `"message"`
    #[serde(rename = "type", default)]
    pub message_type: String,

    /// Role, normally `"assistant"`
    #[serde(default)]
    pub role: String,

    /// Ordered content blocks
    #[serde(default)]
    pub content: Vec<ContentBlock>,

    /// Model that produced the message
    #[serde(default)]
    pub model: String,

    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// Stop sequence that ended generation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,

    /// Token usage for this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ApiMessage {
    /// Concatenate all text blocks in order
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Final result of a query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultMessage {
    /// Result subtype, e.g. `"success"`
    #[serde(default)]
    pub subtype: String,

    /// Wall-clock duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,

    /// Time spent in API calls, in milliseconds
    #[serde(default)]
    pub duration_api_ms: u64,

    /// Whether the query ended in an error
    #[serde(default)]
    pub is_error: bool,

    /// Number of conversational turns
    #[serde(default)]
    pub num_turns: u32,

    /// Final result text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Total cost in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,

    /// Aggregate token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Per-model usage breakdown
    #[serde(
        rename = "modelUsage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub model_usage: Option<Value>,

    /// Tool uses the user declined during the query
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_denials: Vec<PermissionDenial>,

    /// Structured output matching the configured schema, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<Value>,

    /// Errors collected over the query
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// System notification from the CLI
///
/// The field set varies by `subtype`; all fields are optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SystemMessage {
    /// Notification subtype, e.g. `"init"`
    #[serde(default)]
    pub subtype: String,

    /// Working directory reported at init
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Current model reported at init
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Available tools reported at init
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Available slash commands reported at init
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slash_commands: Vec<String>,

    /// Current permission mode
    #[serde(
        rename = "permissionMode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub permission_mode: Option<String>,

    /// Active output style
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_style: Option<String>,

    /// Connected MCP servers and their states
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerSummary>,

    /// Available agents reported at init
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,

    /// Any other subtype-specific payload
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// Name and connection state of one MCP server, as reported at init
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServerSummary {
    /// Server name
    pub name: String,
    /// Connection status
    #[serde(default)]
    pub status: String,
}

/// Partial-message streaming event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEvent {
    /// The raw Anthropic API stream event
    pub event: Value,

    /// Tool use this event is nested under, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,

    /// Unique event identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// Progress report for a long-running tool execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolProgressMessage {
    /// Identifier of the tool use being reported on
    #[serde(default)]
    pub tool_use_id: String,

    /// Name of the running tool
    #[serde(default)]
    pub tool_name: String,

    /// Tool use this one is nested under, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,

    /// Seconds elapsed since the tool started
    #[serde(default)]
    pub elapsed_time_seconds: f64,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// Authentication state change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthStatusMessage {
    /// Whether an authentication flow is in progress
    #[serde(rename = "isAuthenticating", default)]
    pub is_authenticating: bool,

    /// Output lines from the authentication flow
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,

    /// Error encountered during authentication, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// Replay of a user message from a resumed session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserMessageReplay {
    /// The replayed role/content body
    pub message: UserContent,

    /// Tool use this message was nested under, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// Marker separating pre- and post-compaction history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompactBoundaryMessage {
    /// Why compaction ran and how large the history was
    pub compact_metadata: CompactMetadata,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// Compaction trigger details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompactMetadata {
    /// What triggered compaction (`"auto"` or `"manual"`)
    #[serde(default)]
    pub trigger: String,

    /// Token count before compaction
    #[serde(default)]
    pub pre_tokens: u64,
}

/// Free-form status line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusMessage {
    /// Current status, or `None` when a previous status ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// A hook began executing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookStartedMessage {
    /// Configured hook name
    #[serde(default)]
    pub hook_name: String,

    /// Event that triggered the hook
    #[serde(default)]
    pub hook_event: String,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// Incremental output from a running hook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookProgressMessage {
    /// Configured hook name
    #[serde(default)]
    pub hook_name: String,

    /// Event that triggered the hook
    #[serde(default)]
    pub hook_event: String,

    /// Captured stdout so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    /// Captured stderr so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// A hook finished executing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookResponseMessage {
    /// Configured hook name
    #[serde(default)]
    pub hook_name: String,

    /// Event that triggered the hook
    #[serde(default)]
    pub hook_event: String,

    /// Captured stdout
    #[serde(default)]
    pub stdout: String,

    /// Captured stderr
    #[serde(default)]
    pub stderr: String,

    /// Exit code, when the hook ran as a command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// Notification about a background task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskNotificationMessage {
    /// Identifier of the task being reported on
    #[serde(default)]
    pub task_id: String,

    /// Task status, e.g. `"completed"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Human-readable summary of the task outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// Condensed summary of preceding tool uses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUseSummaryMessage {
    /// The summary text
    #[serde(default)]
    pub summary: String,

    /// Identifiers of the tool uses being summarized
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preceding_tool_use_ids: Vec<String>,

    /// Unique message identifier (possibly empty)
    #[serde(default)]
    pub uuid: String,

    /// Session identifier (possibly empty)
    #[serde(default)]
    pub session_id: String,
}

/// A message whose `type` tag this crate does not know
///
/// Preserves every top-level field so callers can interpret newer CLI
/// message types themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawMessage {
    /// All top-level fields of the record, including `type`
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

impl RawMessage {
    /// The `type` tag, or `"unknown"` when absent
    pub fn message_type(&self) -> &str {
        self.data
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    /// The `uuid` field, or empty
    pub fn uuid(&self) -> &str {
        self.data.get("uuid").and_then(Value::as_str).unwrap_or("")
    }

    /// The `session_id` field, or empty
    pub fn session_id(&self) -> &str {
        self.data
            .get("session_id")
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

/// Token usage counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Usage {
    /// Input tokens consumed
    #[serde(default)]
    pub input_tokens: u64,

    /// Output tokens produced
    #[serde(default)]
    pub output_tokens: u64,

    /// Input tokens served from cache
    #[serde(default)]
    pub cache_read_input_tokens: u64,

    /// Input tokens written to cache
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

/// A tool use the user declined during a query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionDenial {
    /// Name of the denied tool
    #[serde(default)]
    pub tool_name: String,

    /// Identifier of the denied tool use
    #[serde(default)]
    pub tool_use_id: String,

    /// Input the tool was invoked with
    #[serde(default)]
    pub tool_input: Value,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assistant_message_decodes_with_ordered_content() {
        let msg = parse_message(json!({
            "type": "assistant",
            "message": {
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "model": "claude-sonnet-4-5",
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "text", "text": "first"},
                    {"type": "tool_use", "id": "toolu_1", "name": "Read", "input": {}},
                    {"type": "text", "text": "second"}
                ],
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 10, "output_tokens": 5}
            },
            "uuid": "u1",
            "session_id": "s1"
        }))
        .unwrap();

        let Message::Assistant(assistant) = msg else {
            panic!("expected assistant message");
        };
        assert_eq!(assistant.uuid, "u1");
        assert_eq!(assistant.message.content.len(), 4);
        assert_eq!(assistant.message.content[1].as_text(), Some("first"));
        assert_eq!(assistant.message.content[3].as_text(), Some("second"));
        assert_eq!(assistant.message.text(), "firstsecond");
        assert_eq!(assistant.message.stop_reason.as_deref(), Some("tool_use"));
    }

    #[test]
    fn unknown_type_decodes_to_raw_with_all_fields() {
        let msg = parse_message(json!({
            "type": "future_event",
            "foo": "bar",
            "session_id": "s",
            "uuid": "u"
        }))
        .unwrap();

        assert_eq!(msg.message_type(), "future_event");
        assert_eq!(msg.session_id(), "s");
        assert_eq!(msg.uuid(), "u");
        let Message::Raw(raw) = &msg else {
            panic!("expected raw message");
        };
        assert_eq!(raw.data["foo"], "bar");
    }

    #[test]
    fn known_type_with_wrong_shape_errors_with_type_name() {
        // assistant requires a nested message object
        let err = parse_message(json!({"type": "assistant", "message": 42})).unwrap_err();
        match err {
            ProtocolError::MessageParse { message_type, .. } => {
                assert_eq!(message_type, "assistant")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn result_message_roundtrip() {
        let original = json!({
            "type": "result",
            "subtype": "success",
            "duration_ms": 1500,
            "duration_api_ms": 1200,
            "is_error": false,
            "num_turns": 2,
            "result": "done",
            "total_cost_usd": 0.012,
            "usage": {"input_tokens": 50, "output_tokens": 20,
                      "cache_read_input_tokens": 0, "cache_creation_input_tokens": 0},
            "uuid": "u2",
            "session_id": "s2"
        });

        let msg = parse_message(original).unwrap();
        let encoded = serde_json::to_value(&msg).unwrap();
        let back = parse_message(encoded).unwrap();
        assert_eq!(msg, back);

        let Message::Result(result) = msg else {
            panic!("expected result message");
        };
        assert!(!result.is_error);
        assert_eq!(result.result.as_deref(), Some("done"));
        assert_eq!(result.usage.unwrap().input_tokens, 50);
    }

    #[test]
    fn every_known_tag_roundtrips() {
        let samples = vec![
            json!({"type": "user", "message": {"role": "user", "content": "hi"},
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "assistant",
                   "message": {"id": "m", "type": "message", "role": "assistant",
                               "model": "claude-sonnet-4-5",
                               "content": [{"type": "text", "text": "hello"}]},
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "result", "subtype": "success", "duration_ms": 1,
                   "duration_api_ms": 1, "is_error": false, "num_turns": 1,
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "system", "subtype": "init", "cwd": "/tmp",
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "stream_event", "event": {"type": "message_start"},
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "tool_progress", "tool_use_id": "t", "tool_name": "Bash",
                   "elapsed_time_seconds": 1.5, "uuid": "u", "session_id": "s"}),
            json!({"type": "auth_status", "isAuthenticating": true, "output": ["..."],
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "user_message_replay",
                   "message": {"role": "user", "content": "again"},
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "compact_boundary",
                   "compact_metadata": {"trigger": "auto", "pre_tokens": 9000},
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "status", "status": "compacting", "uuid": "u", "session_id": "s"}),
            json!({"type": "hook_started", "hook_name": "lint", "hook_event": "PostToolUse",
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "hook_progress", "hook_name": "lint", "hook_event": "PostToolUse",
                   "stdout": "...", "uuid": "u", "session_id": "s"}),
            json!({"type": "hook_response", "hook_name": "lint", "hook_event": "PostToolUse",
                   "stdout": "ok", "stderr": "", "exit_code": 0,
                   "uuid": "u", "session_id": "s"}),
            json!({"type": "task_notification", "task_id": "task-1", "status": "completed",
                   "summary": "done", "uuid": "u", "session_id": "s"}),
            json!({"type": "tool_use_summary", "summary": "read two files",
                   "preceding_tool_use_ids": ["t1", "t2"], "uuid": "u", "session_id": "s"}),
        ];

        for sample in samples {
            let tag = sample["type"].as_str().unwrap().to_owned();
            let msg = parse_message(sample).unwrap();
            assert_eq!(msg.message_type(), tag);
            assert!(!matches!(msg, Message::Raw(_)), "{tag} decoded as raw");
            assert_eq!(msg.uuid(), "u");
            assert_eq!(msg.session_id(), "s");

            let encoded = serde_json::to_value(&msg).unwrap();
            assert_eq!(encoded["type"], Value::String(tag));
            let back = parse_message(encoded).unwrap();
            assert_eq!(msg, back);
        }
    }

    #[test]
    fn missing_identifiers_default_to_empty() {
        let msg = parse_message(json!({
            "type": "status",
            "status": "thinking"
        }))
        .unwrap();
        assert_eq!(msg.uuid(), "");
        assert_eq!(msg.session_id(), "");
    }

    #[test]
    fn system_message_keeps_unmodeled_fields() {
        let msg = parse_message(json!({
            "type": "system",
            "subtype": "init",
            "apiKeySource": "env",
            "claude_code_version": "2.0.0",
            "uuid": "u",
            "session_id": "s"
        }))
        .unwrap();

        let Message::System(system) = msg else {
            panic!("expected system message");
        };
        assert_eq!(system.extra["apiKeySource"], "env");
        assert_eq!(system.extra["claude_code_version"], "2.0.0");
    }

    #[test]
    fn parse_message_line_rejects_invalid_json() {
        assert!(parse_message_line("not json").is_err());
    }
}
