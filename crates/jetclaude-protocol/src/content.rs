//! Content block types
//!
//! Represents the different kinds of content that can appear inside a
//! message. Order within a message is significant and is preserved by the
//! containing `Vec<ContentBlock>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// A content block in a message
///
/// Known tags decode into their typed variant; any other tag decodes into
/// [`ContentBlock::Raw`], preserving the full object. Decoding is
/// tag-then-dispatch, implemented by hand so the fallback keeps every field
/// of an unknown block.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    Text {
        /// The text content.
        text: String,
    },

    /// An extended-thinking block.
    Thinking {
        /// The thinking content.
        thinking: String,
        /// Integrity signature over the thinking content.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// A request from the model to use a tool.
    ToolUse {
        /// The unique identifier for this tool use request.
        id: String,
        /// The name of the tool to be used.
        name: String,
        /// The input to the tool, as a JSON object.
        #[serde(default)]
        input: Value,
    },

    /// The result of a tool execution.
    ToolResult {
        /// The `id` of the `tool_use` block this result is for.
        tool_use_id: String,
        /// The content of the tool's output.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        /// Whether the tool execution resulted in an error.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    /// A redacted thinking block.
    RedactedThinking {
        /// Opaque encrypted thinking data.
        data: String,
    },

    /// A content block with a tag this crate does not know.
    ///
    /// The full object, including its `type` field, is preserved.
    #[serde(untagged)]
    Raw(serde_json::Map<String, Value>),
}

impl ContentBlock {
    /// Create a text content block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool use content block
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a tool result content block
    pub fn tool_result(tool_use_id: impl Into<String>, content: Value) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: Some(content),
            is_error: None,
        }
    }

    /// Get the type tag of this content block
    pub fn block_type(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::RedactedThinking { .. } => "redacted_thinking",
            Self::Raw(data) => data
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }

    /// Extract text if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Extract `(id, name, input)` if this is a tool use block
    pub fn as_tool_use(&self) -> Option<(&str, &str, &Value)> {
        match self {
            Self::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        }
    }

    /// Parse a single content block from a JSON value
    ///
    /// A shape mismatch within a known tag fails with an error naming the
    /// tag; an unknown tag yields [`ContentBlock::Raw`].
    pub fn parse(value: Value) -> Result<Self> {
        let block_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        serde_json::from_value(value)
            .map_err(|source| ProtocolError::ContentBlockParse { block_type, source })
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;

        let mut value = Value::deserialize(deserializer)?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        // Known tags are stripped of the tag field before field extraction;
        // the raw fallback keeps the whole object intact.
        let known = matches!(
            tag.as_str(),
            "text" | "thinking" | "tool_use" | "tool_result" | "redacted_thinking"
        );
        if known {
            if let Some(object) = value.as_object_mut() {
                object.remove("type");
            }
        }

        match tag.as_str() {
            "text" => {
                #[derive(Deserialize)]
                struct Fields {
                    text: String,
                }
                let Fields { text } =
                    serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(Self::Text { text })
            }
            "thinking" => {
                #[derive(Deserialize)]
                struct Fields {
                    thinking: String,
                    #[serde(default)]
                    signature: Option<String>,
                }
                let Fields {
                    thinking,
                    signature,
                } = serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(Self::Thinking {
                    thinking,
                    signature,
                })
            }
            "tool_use" => {
                #[derive(Deserialize)]
                struct Fields {
                    id: String,
                    name: String,
                    #[serde(default)]
                    input: Value,
                }
                let Fields { id, name, input } =
                    serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(Self::ToolUse { id, name, input })
            }
            "tool_result" => {
                #[derive(Deserialize)]
                struct Fields {
                    tool_use_id: String,
                    #[serde(default)]
                    content: Option<Value>,
                    #[serde(default)]
                    is_error: Option<bool>,
                }
                let Fields {
                    tool_use_id,
                    content,
                    is_error,
                } = serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(Self::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                })
            }
            "redacted_thinking" => {
                #[derive(Deserialize)]
                struct Fields {
                    data: String,
                }
                let Fields { data } =
                    serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(Self::RedactedThinking { data })
            }
            _ => serde_json::from_value(value)
                .map(Self::Raw)
                .map_err(D::Error::custom),
        }
    }
}
