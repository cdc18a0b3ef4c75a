//! Control frame types
//!
//! Control frames share the stdio pipe with data messages and carry
//! synchronous RPC-style operations in both directions. A request names its
//! operation in `request.subtype` and is answered by exactly one response
//! carrying the same `request_id`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag value of a control request frame
pub const CONTROL_REQUEST: &str = "control_request";

/// Tag value of a control response frame
pub const CONTROL_RESPONSE: &str = "control_response";

/// A correlated control request, in either direction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlRequest {
    /// Always `"control_request"`
    #[serde(rename = "type")]
    pub frame_type: String,

    /// Correlation identifier; outbound ids take the form `sdk-req-N`
    pub request_id: String,

    /// Operation payload; `subtype` names the operation
    pub request: Map<String, Value>,
}

impl ControlRequest {
    /// Build a request frame for the given payload
    pub fn new(request_id: impl Into<String>, request: Map<String, Value>) -> Self {
        Self {
            frame_type: CONTROL_REQUEST.to_string(),
            request_id: request_id.into(),
            request,
        }
    }

    /// The operation name inside the payload, if present
    pub fn subtype(&self) -> Option<&str> {
        self.request.get("subtype").and_then(Value::as_str)
    }
}

/// A control response frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlResponse {
    /// Always `"control_response"`
    #[serde(rename = "type")]
    pub frame_type: String,

    /// The response body
    pub response: ResponsePayload,
}

impl ControlResponse {
    /// Build a success response
    pub fn success(request_id: impl Into<String>, response: Option<Map<String, Value>>) -> Self {
        Self {
            frame_type: CONTROL_RESPONSE.to_string(),
            response: ResponsePayload {
                subtype: "success".to_string(),
                request_id: request_id.into(),
                response,
                error: None,
            },
        }
    }

    /// Build an error response
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            frame_type: CONTROL_RESPONSE.to_string(),
            response: ResponsePayload {
                subtype: "error".to_string(),
                request_id: request_id.into(),
                response: None,
                error: Some(message.into()),
            },
        }
    }
}

/// Body of a control response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponsePayload {
    /// `"success"` or `"error"`
    pub subtype: String,

    /// Identifier of the request being answered
    pub request_id: String,

    /// Operation-specific result, for success responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Map<String, Value>>,

    /// Remote error message, for error responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponsePayload {
    /// Whether this is an error response
    pub fn is_error(&self) -> bool {
        self.subtype == "error"
    }
}

/// Result of the `initialize` handshake
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InitializeResponse {
    /// Slash commands available in this session
    #[serde(default)]
    pub commands: Vec<SlashCommand>,

    /// Active output style
    #[serde(default)]
    pub output_style: String,

    /// All output styles the CLI can switch to
    #[serde(default)]
    pub available_output_styles: Vec<String>,

    /// Models available to this account
    #[serde(default)]
    pub models: Vec<ModelInfo>,

    /// Account summary
    #[serde(default)]
    pub account: AccountInfo,
}

/// One available slash command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlashCommand {
    /// Command name, without the leading slash
    pub name: String,

    /// One-line description
    #[serde(default)]
    pub description: String,

    /// Hint describing the expected arguments
    #[serde(rename = "argumentHint", default)]
    pub argument_hint: String,
}

/// One available model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    /// Model identifier to pass to `set_model`
    pub value: String,

    /// Human-readable name
    #[serde(rename = "displayName", default)]
    pub display_name: String,

    /// One-line description
    #[serde(default)]
    pub description: String,
}

/// Account summary returned by `initialize`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AccountInfo {
    /// Account email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Organization name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Subscription tier
    #[serde(
        rename = "subscriptionType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub subscription_type: Option<String>,

    /// Where the auth token came from
    #[serde(
        rename = "tokenSource",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub token_source: Option<String>,

    /// Where the API key came from
    #[serde(
        rename = "apiKeySource",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key_source: Option<String>,
}

/// Result of a `rewind_files` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RewindFilesResult {
    /// Whether the rewind can be (or was) performed
    #[serde(rename = "canRewind", default)]
    pub can_rewind: bool,

    /// Why the rewind is not possible, when it is not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Files the rewind touches
    #[serde(rename = "filesChanged", default)]
    pub files_changed: Vec<String>,

    /// Line insertions across the touched files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insertions: Option<u64>,

    /// Line deletions across the touched files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_frame_wire_shape() {
        let mut payload = Map::new();
        payload.insert("subtype".to_string(), json!("interrupt"));
        let frame = ControlRequest::new("sdk-req-1", payload);

        let encoded = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            encoded,
            json!({
                "type": "control_request",
                "request_id": "sdk-req-1",
                "request": {"subtype": "interrupt"}
            })
        );
        assert_eq!(frame.subtype(), Some("interrupt"));
    }

    #[test]
    fn success_response_roundtrip() {
        let line = r#"{"type":"control_response","response":{"request_id":"sdk-req-1","subtype":"success"}}"#;
        let frame: ControlResponse = serde_json::from_str(line).unwrap();
        assert_eq!(frame.response.request_id, "sdk-req-1");
        assert!(!frame.response.is_error());
        assert!(frame.response.response.is_none());
    }

    #[test]
    fn error_response_carries_message() {
        let frame = ControlResponse::error("r9", "unknown request subtype: bogus");
        let encoded = serde_json::to_value(&frame).unwrap();
        assert_eq!(encoded["response"]["subtype"], "error");
        assert_eq!(
            encoded["response"]["error"],
            "unknown request subtype: bogus"
        );
        assert!(encoded["response"].get("response").is_none());
    }

    #[test]
    fn initialize_response_decodes_camel_case() {
        let resp: InitializeResponse = serde_json::from_value(json!({
            "commands": [
                {"name": "compact", "description": "Compact history", "argumentHint": ""}
            ],
            "output_style": "default",
            "available_output_styles": ["default", "explanatory"],
            "models": [
                {"value": "sonnet", "displayName": "Claude Sonnet", "description": "balanced"}
            ],
            "account": {"email": "dev@example.com", "subscriptionType": "pro"}
        }))
        .unwrap();

        assert_eq!(resp.commands[0].name, "compact");
        assert_eq!(resp.models[0].display_name, "Claude Sonnet");
        assert_eq!(resp.account.subscription_type.as_deref(), Some("pro"));
    }

    #[test]
    fn rewind_result_decodes_camel_case() {
        let result: RewindFilesResult = serde_json::from_value(json!({
            "canRewind": true,
            "filesChanged": ["src/main.rs"],
            "insertions": 4,
            "deletions": 1
        }))
        .unwrap();
        assert!(result.can_rewind);
        assert_eq!(result.files_changed, vec!["src/main.rs"]);
        assert_eq!(result.insertions, Some(4));
    }
}
