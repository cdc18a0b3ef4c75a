//! Hook protocol types
//!
//! The CLI invokes caller-registered hooks through `hook_callback` control
//! requests. The hook input arrives tagged by `hook_event_name`; decoding
//! dispatches on that tag so callbacks receive a concrete variant instead of
//! an untyped map. Unknown events fall through to [`HookInput::Raw`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::permissions::PermissionUpdate;

/// The hook events the CLI can dispatch to the SDK
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before a tool executes
    PreToolUse,
    /// After a tool executes successfully
    PostToolUse,
    /// After a tool execution fails
    PostToolUseFailure,
    /// A user-facing notification was produced
    Notification,
    /// A user prompt was submitted
    UserPromptSubmit,
    /// A session started
    SessionStart,
    /// A session ended
    SessionEnd,
    /// The assistant finished responding
    Stop,
    /// A subagent started
    SubagentStart,
    /// A subagent finished responding
    SubagentStop,
    /// Before conversation compaction
    PreCompact,
    /// A permission prompt is about to be shown
    PermissionRequest,
    /// Setup trigger (`--setup` style maintenance flows)
    Setup,
}

impl HookEvent {
    /// The wire name of this event
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::PostToolUseFailure => "PostToolUseFailure",
            Self::Notification => "Notification",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
            Self::Stop => "Stop",
            Self::SubagentStart => "SubagentStart",
            Self::SubagentStop => "SubagentStop",
            Self::PreCompact => "PreCompact",
            Self::PermissionRequest => "PermissionRequest",
            Self::Setup => "Setup",
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields common to every hook input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HookInputCommon {
    /// Session identifier
    #[serde(default)]
    pub session_id: String,

    /// Path to the session transcript file
    #[serde(default)]
    pub transcript_path: String,

    /// Working directory of the session
    #[serde(default)]
    pub cwd: String,

    /// Permission mode at the time of the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
}

/// Input to a hook callback, tagged by `hook_event_name`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "hook_event_name")]
pub enum HookInput {
    /// Before a tool executes
    PreToolUse(PreToolUseInput),
    /// After a tool executes successfully
    PostToolUse(PostToolUseInput),
    /// After a tool execution fails
    PostToolUseFailure(PostToolUseFailureInput),
    /// A user-facing notification was produced
    Notification(NotificationInput),
    /// A user prompt was submitted
    UserPromptSubmit(UserPromptSubmitInput),
    /// A session started
    SessionStart(SessionStartInput),
    /// A session ended
    SessionEnd(SessionEndInput),
    /// The assistant finished responding
    Stop(StopInput),
    /// A subagent started
    SubagentStart(SubagentStartInput),
    /// A subagent finished responding
    SubagentStop(SubagentStopInput),
    /// Before conversation compaction
    PreCompact(PreCompactInput),
    /// A permission prompt is about to be shown
    PermissionRequest(PermissionRequestInput),
    /// Setup trigger
    Setup(SetupInput),
    /// An event name this crate does not know; the full input is preserved
    #[serde(untagged)]
    Raw(serde_json::Map<String, Value>),
}

impl HookInput {
    /// The event this input belongs to, when known
    pub fn event(&self) -> Option<HookEvent> {
        match self {
            Self::PreToolUse(_) => Some(HookEvent::PreToolUse),
            Self::PostToolUse(_) => Some(HookEvent::PostToolUse),
            Self::PostToolUseFailure(_) => Some(HookEvent::PostToolUseFailure),
            Self::Notification(_) => Some(HookEvent::Notification),
            Self::UserPromptSubmit(_) => Some(HookEvent::UserPromptSubmit),
            Self::SessionStart(_) => Some(HookEvent::SessionStart),
            Self::SessionEnd(_) => Some(HookEvent::SessionEnd),
            Self::Stop(_) => Some(HookEvent::Stop),
            Self::SubagentStart(_) => Some(HookEvent::SubagentStart),
            Self::SubagentStop(_) => Some(HookEvent::SubagentStop),
            Self::PreCompact(_) => Some(HookEvent::PreCompact),
            Self::PermissionRequest(_) => Some(HookEvent::PermissionRequest),
            Self::Setup(_) => Some(HookEvent::Setup),
            Self::Raw(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for HookInput {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;
        let tag = value
            .get("hook_event_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        fn dispatch<T, F, E>(value: Value, wrap: F) -> std::result::Result<HookInput, E>
        where
            T: serde::de::DeserializeOwned,
            F: FnOnce(T) -> HookInput,
            E: serde::de::Error,
        {
            serde_json::from_value(value).map(wrap).map_err(E::custom)
        }

        let known = matches!(
            tag.as_str(),
            "PreToolUse"
                | "PostToolUse"
                | "PostToolUseFailure"
                | "Notification"
                | "UserPromptSubmit"
                | "SessionStart"
                | "SessionEnd"
                | "Stop"
                | "SubagentStart"
                | "SubagentStop"
                | "PreCompact"
                | "PermissionRequest"
                | "Setup"
        );
        if known {
            if let Some(object) = value.as_object_mut() {
                object.remove("hook_event_name");
            }
        }

        match tag.as_str() {
            "PreToolUse" => dispatch(value, Self::PreToolUse),
            "PostToolUse" => dispatch(value, Self::PostToolUse),
            "PostToolUseFailure" => dispatch(value, Self::PostToolUseFailure),
            "Notification" => dispatch(value, Self::Notification),
            "UserPromptSubmit" => dispatch(value, Self::UserPromptSubmit),
            "SessionStart" => dispatch(value, Self::SessionStart),
            "SessionEnd" => dispatch(value, Self::SessionEnd),
            "Stop" => dispatch(value, Self::Stop),
            "SubagentStart" => dispatch(value, Self::SubagentStart),
            "SubagentStop" => dispatch(value, Self::SubagentStop),
            "PreCompact" => dispatch(value, Self::PreCompact),
            "PermissionRequest" => dispatch(value, Self::PermissionRequest),
            "Setup" => dispatch(value, Self::Setup),
            _ => dispatch(value, Self::Raw),
        }
    }
}

/// Input for [`HookEvent::PreToolUse`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreToolUseInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// Name of the tool about to run
    #[serde(default)]
    pub tool_name: String,
    /// Input the tool will receive
    #[serde(default)]
    pub tool_input: Value,
    /// Identifier of the tool use
    #[serde(default)]
    pub tool_use_id: String,
}

/// Input for [`HookEvent::PostToolUse`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostToolUseInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// Name of the tool that ran
    #[serde(default)]
    pub tool_name: String,
    /// Input the tool received
    #[serde(default)]
    pub tool_input: Value,
    /// Output the tool produced
    #[serde(default)]
    pub tool_response: Value,
    /// Identifier of the tool use
    #[serde(default)]
    pub tool_use_id: String,
}

/// Input for [`HookEvent::PostToolUseFailure`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostToolUseFailureInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// Name of the tool that failed
    #[serde(default)]
    pub tool_name: String,
    /// Input the tool received
    #[serde(default)]
    pub tool_input: Value,
    /// Identifier of the tool use
    #[serde(default)]
    pub tool_use_id: String,
    /// Failure description
    #[serde(default)]
    pub error: String,
    /// Whether the failure was an interrupt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_interrupt: Option<bool>,
}

/// Input for [`HookEvent::Notification`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// Notification body
    #[serde(default)]
    pub message: String,
    /// Notification title, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Kind of notification
    #[serde(default)]
    pub notification_type: String,
}

/// Input for [`HookEvent::UserPromptSubmit`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPromptSubmitInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// The submitted prompt text
    #[serde(default)]
    pub prompt: String,
}

/// Input for [`HookEvent::SessionStart`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionStartInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// What started the session (`"startup"`, `"resume"`, ...)
    #[serde(default)]
    pub source: String,
    /// Agent type, when started by an agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    /// Model in use at start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Input for [`HookEvent::SessionEnd`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEndInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// Why the session ended
    #[serde(default)]
    pub reason: String,
}

/// Input for [`HookEvent::Stop`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// Whether a stop hook is already running
    #[serde(default)]
    pub stop_hook_active: bool,
}

/// Input for [`HookEvent::SubagentStart`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubagentStartInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// Identifier of the subagent
    #[serde(default)]
    pub agent_id: String,
    /// Type of the subagent
    #[serde(default)]
    pub agent_type: String,
}

/// Input for [`HookEvent::SubagentStop`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubagentStopInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// Whether a stop hook is already running
    #[serde(default)]
    pub stop_hook_active: bool,
    /// Identifier of the subagent
    #[serde(default)]
    pub agent_id: String,
    /// Path to the subagent's transcript
    #[serde(default)]
    pub agent_transcript_path: String,
}

/// Input for [`HookEvent::PreCompact`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreCompactInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// What triggered compaction (`"auto"` or `"manual"`)
    #[serde(default)]
    pub trigger: String,
    /// Custom instructions supplied for compaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

/// Input for [`HookEvent::PermissionRequest`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionRequestInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// Name of the tool awaiting permission
    #[serde(default)]
    pub tool_name: String,
    /// Input the tool would receive
    #[serde(default)]
    pub tool_input: Value,
    /// Permission updates the CLI suggests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_suggestions: Vec<PermissionUpdate>,
}

/// Input for [`HookEvent::Setup`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetupInput {
    /// Common hook fields
    #[serde(flatten)]
    pub common: HookInputCommon,
    /// What triggered setup
    #[serde(default)]
    pub trigger: String,
}

/// Output of a hook callback
///
/// Every field is optional; an empty output means "continue unchanged".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HookOutput {
    /// Run the hook asynchronously on the CLI side
    #[serde(rename = "async", default, skip_serializing_if = "is_false")]
    pub run_async: bool,

    /// Timeout in milliseconds for an asynchronous hook
    #[serde(
        rename = "asyncTimeout",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub async_timeout: Option<u64>,

    /// Whether execution should continue
    #[serde(
        rename = "continue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub continue_: Option<bool>,

    /// Suppress the hook's output from the transcript
    #[serde(
        rename = "suppressOutput",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub suppress_output: Option<bool>,

    /// Reason shown when execution stops
    #[serde(
        rename = "stopReason",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub stop_reason: Option<String>,

    /// Permission decision (`"approve"` / `"block"` style values)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,

    /// Message injected into the conversation as a system message
    #[serde(
        rename = "systemMessage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub system_message: Option<String>,

    /// Reason attached to the decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Event-specific output payload
    #[serde(
        rename = "hookSpecificOutput",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hook_specific_output: Option<Value>,
}

impl HookOutput {
    /// An output that lets execution continue unchanged
    pub fn continue_execution() -> Self {
        Self {
            continue_: Some(true),
            ..Self::default()
        }
    }

    /// An output that stops execution with the given reason
    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            continue_: Some(false),
            stop_reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Wire form of one hook matcher entry, as sent in `initialize`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookMatcherConfig {
    /// Matcher string the CLI applies to tool names (empty matches all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,

    /// Callback identifiers invoked when the matcher fires, in order
    #[serde(rename = "hookCallbackIds")]
    pub hook_callback_ids: Vec<String>,

    /// Per-hook timeout in seconds, enforced by the CLI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pre_tool_use_input_decodes_typed() {
        let input: HookInput = serde_json::from_value(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "transcript_path": "/tmp/t.jsonl",
            "cwd": "/work",
            "tool_name": "Bash",
            "tool_input": {"command": "ls"},
            "tool_use_id": "toolu_1"
        }))
        .unwrap();

        assert_eq!(input.event(), Some(HookEvent::PreToolUse));
        let HookInput::PreToolUse(pre) = input else {
            panic!("expected PreToolUse input");
        };
        assert_eq!(pre.tool_name, "Bash");
        assert_eq!(pre.common.session_id, "s1");
        assert_eq!(pre.tool_input["command"], "ls");
    }

    #[test]
    fn unknown_event_is_preserved() {
        let input: HookInput = serde_json::from_value(json!({
            "hook_event_name": "FutureEvent",
            "session_id": "s1",
            "anything": [1, 2, 3]
        }))
        .unwrap();

        assert_eq!(input.event(), None);
        let HookInput::Raw(data) = input else {
            panic!("expected raw input");
        };
        assert_eq!(data["hook_event_name"], "FutureEvent");
        assert_eq!(data["anything"], json!([1, 2, 3]));
    }

    #[test]
    fn hook_input_roundtrips_through_tag() {
        let original = json!({
            "hook_event_name": "PostToolUse",
            "session_id": "s1",
            "transcript_path": "",
            "cwd": "/work",
            "tool_name": "Read",
            "tool_input": {"file_path": "/etc/hosts"},
            "tool_response": {"ok": true},
            "tool_use_id": "toolu_2"
        });

        let input: HookInput = serde_json::from_value(original).unwrap();
        let encoded = serde_json::to_value(&input).unwrap();
        assert_eq!(encoded["hook_event_name"], "PostToolUse");
        let back: HookInput = serde_json::from_value(encoded).unwrap();
        assert_eq!(input, back);
    }

    #[test]
    fn hook_output_serializes_wire_names() {
        let output = HookOutput {
            continue_: Some(true),
            suppress_output: Some(false),
            async_timeout: Some(5000),
            system_message: Some("note".to_string()),
            ..HookOutput::default()
        };

        let encoded = serde_json::to_value(&output).unwrap();
        assert_eq!(encoded["continue"], true);
        assert_eq!(encoded["suppressOutput"], false);
        assert_eq!(encoded["asyncTimeout"], 5000);
        assert_eq!(encoded["systemMessage"], "note");
        assert!(encoded.get("async").is_none());
    }

    #[test]
    fn matcher_config_uses_camel_case_ids() {
        let matcher = HookMatcherConfig {
            matcher: Some("Bash".to_string()),
            hook_callback_ids: vec!["hook_0".to_string()],
            timeout: None,
        };
        let encoded = serde_json::to_value(&matcher).unwrap();
        assert_eq!(encoded["hookCallbackIds"][0], "hook_0");
    }

    #[test]
    fn permission_request_input_carries_suggestions() {
        let input: HookInput = serde_json::from_value(json!({
            "hook_event_name": "PermissionRequest",
            "session_id": "s1",
            "tool_name": "Write",
            "tool_input": {"file_path": "/tmp/x"},
            "permission_suggestions": [
                {"type": "addRules", "rules": [{"toolName": "Write"}], "behavior": "allow"}
            ]
        }))
        .unwrap();

        let HookInput::PermissionRequest(req) = input else {
            panic!("expected PermissionRequest input");
        };
        assert_eq!(req.permission_suggestions.len(), 1);
        assert_eq!(req.permission_suggestions[0].update_type, "addRules");
    }
}
