//! Permission types
//!
//! Covers the permission modes the CLI understands, the result a
//! tool-permission callback returns, and the runtime permission updates that
//! can accompany an `allow` decision.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Permission mode of a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PermissionMode {
    /// Prompt for permission as configured
    #[default]
    #[serde(rename = "default")]
    Default,
    /// Automatically accept file edits
    #[serde(rename = "acceptEdits")]
    AcceptEdits,
    /// Skip all permission prompts
    #[serde(rename = "bypassPermissions")]
    BypassPermissions,
    /// Plan mode: read-only exploration
    #[serde(rename = "plan")]
    Plan,
    /// Delegate decisions to a supervising agent
    #[serde(rename = "delegate")]
    Delegate,
    /// Never ask; deny anything that would prompt
    #[serde(rename = "dontAsk")]
    DontAsk,
}

impl PermissionMode {
    /// The wire name of this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::BypassPermissions => "bypassPermissions",
            Self::Plan => "plan",
            Self::Delegate => "delegate",
            Self::DontAsk => "dontAsk",
        }
    }
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a permission decision was resolved
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PermissionBehavior {
    /// The tool may run
    Allow,
    /// The tool may not run
    Deny,
    /// Ask the user
    Ask,
}

/// Result of a tool-permission callback, tagged by `behavior`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "behavior", rename_all = "lowercase")]
pub enum PermissionResult {
    /// Allow the tool, optionally with a rewritten input
    Allow {
        /// Input the tool should run with; echoed unchanged when `None`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated_input: Option<Map<String, Value>>,
        /// Permission rule updates to apply alongside the decision
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated_permissions: Option<Vec<PermissionUpdate>>,
    },
    /// Deny the tool
    Deny {
        /// Message shown to the model explaining the denial
        message: String,
        /// Also interrupt the current turn
        #[serde(default, skip_serializing_if = "is_false")]
        interrupt: bool,
    },
    /// Defer to the CLI's own permission prompt
    Ask,
}

impl PermissionResult {
    /// Allow with the input echoed unchanged
    pub fn allow() -> Self {
        Self::Allow {
            updated_input: None,
            updated_permissions: None,
        }
    }

    /// Deny with a message
    pub fn deny(message: impl Into<String>) -> Self {
        Self::Deny {
            message: message.into(),
            interrupt: false,
        }
    }
}

/// Context handed to a tool-permission callback
#[derive(Debug, Clone, Default)]
pub struct CanUseToolOptions {
    /// Permission updates the CLI suggests for this decision
    pub suggestions: Vec<PermissionUpdate>,

    /// Path that triggered a block, when the request concerns file access
    pub blocked_path: Option<String>,

    /// Why the CLI escalated this decision to the callback
    pub decision_reason: Option<String>,

    /// Identifier of the tool use being decided
    pub tool_use_id: String,

    /// Identifier of the requesting agent, when not the main loop
    pub agent_id: Option<String>,
}

/// A runtime permission update
///
/// `update_type` selects the shape (`addRules`, `replaceRules`,
/// `removeRules`, `setMode`, `addDirectories`, `removeDirectories`); unused
/// fields stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionUpdate {
    /// Which kind of update this is
    #[serde(rename = "type")]
    pub update_type: String,

    /// Rules being added, replaced, or removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<PermissionRule>>,

    /// Behavior the rules carry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<PermissionBehavior>,

    /// Where the update is persisted (`session`, `projectSettings`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// New mode, for `setMode` updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PermissionMode>,

    /// Directories, for directory updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directories: Option<Vec<String>>,
}

/// A single permission rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionRule {
    /// Tool the rule applies to
    #[serde(rename = "toolName")]
    pub tool_name: String,

    /// Rule argument, e.g. a command prefix for Bash rules
    #[serde(
        rename = "ruleContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rule_content: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mode_wire_names() {
        assert_eq!(
            serde_json::to_value(PermissionMode::AcceptEdits).unwrap(),
            json!("acceptEdits")
        );
        assert_eq!(
            serde_json::to_value(PermissionMode::DontAsk).unwrap(),
            json!("dontAsk")
        );
        let mode: PermissionMode = serde_json::from_value(json!("bypassPermissions")).unwrap();
        assert_eq!(mode, PermissionMode::BypassPermissions);
    }

    #[test]
    fn allow_result_serializes_behavior_tag() {
        let result = PermissionResult::Allow {
            updated_input: Some(Map::from_iter([(
                "command".to_string(),
                json!("ls -la"),
            )])),
            updated_permissions: None,
        };
        let encoded = serde_json::to_value(&result).unwrap();
        assert_eq!(encoded["behavior"], "allow");
        assert_eq!(encoded["updated_input"]["command"], "ls -la");
    }

    #[test]
    fn deny_result_omits_interrupt_when_false() {
        let encoded = serde_json::to_value(PermissionResult::deny("nope")).unwrap();
        assert_eq!(encoded["behavior"], "deny");
        assert_eq!(encoded["message"], "nope");
        assert!(encoded.get("interrupt").is_none());
    }

    #[test]
    fn ask_result_is_bare_tag() {
        let encoded = serde_json::to_value(PermissionResult::Ask).unwrap();
        assert_eq!(encoded, json!({"behavior": "ask"}));
    }

    #[test]
    fn permission_update_rule_names_are_camel_case() {
        let update = PermissionUpdate {
            update_type: "addRules".to_string(),
            rules: Some(vec![PermissionRule {
                tool_name: "Bash".to_string(),
                rule_content: Some("git *".to_string()),
            }]),
            behavior: Some(PermissionBehavior::Allow),
            destination: Some("session".to_string()),
            mode: None,
            directories: None,
        };
        let encoded = serde_json::to_value(&update).unwrap();
        assert_eq!(encoded["type"], "addRules");
        assert_eq!(encoded["rules"][0]["toolName"], "Bash");
        assert_eq!(encoded["rules"][0]["ruleContent"], "git *");
    }
}
