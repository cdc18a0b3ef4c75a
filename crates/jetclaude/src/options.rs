//! Session configuration
//!
//! [`Options`] is the full configuration surface for a session: everything
//! that becomes a CLI flag, plus the caller-registered callbacks and
//! in-process tool servers that live SDK-side. Build one with
//! [`Options::builder`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use jetclaude_protocol::mcp::McpServerConfig;
use jetclaude_protocol::{HookEvent, PermissionMode};
use jetclaude_transport::{
    find_cli, CallbackRegistry, CanUseToolCallback, CommandOptions, HookMatcherSpec, Result,
    ToolServer,
};

/// Callback receiving the child's captured stderr at disconnect
pub type StderrCallback = Arc<dyn Fn(String) + Send + Sync>;

/// System prompt configuration
#[derive(Debug, Clone, Default)]
pub struct SystemPromptConfig {
    /// Full replacement prompt
    pub prompt: Option<String>,
    /// Named preset to start from
    pub preset: Option<String>,
    /// Text appended to the prompt or preset
    pub append: Option<String>,
}

impl SystemPromptConfig {
    /// Replace the system prompt entirely
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Start from a preset, optionally appending to it
    pub fn preset(preset: impl Into<String>, append: Option<String>) -> Self {
        Self {
            preset: Some(preset.into()),
            append,
            ..Self::default()
        }
    }
}

/// Structured output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFormat {
    /// Format kind, normally `"json_schema"`
    #[serde(rename = "type")]
    pub format_type: String,

    /// JSON schema the final result must satisfy
    pub schema: Value,
}

impl OutputFormat {
    /// A JSON-schema constrained output format
    pub fn json_schema(schema: Value) -> Self {
        Self {
            format_type: "json_schema".to_string(),
            schema,
        }
    }
}

/// One plugin to load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin kind, normally `"local"`
    #[serde(rename = "type")]
    pub plugin_type: String,

    /// Path to the plugin
    pub path: String,
}

/// Definition of one agent in the agent catalog
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentDefinition {
    /// What the agent is for
    pub description: String,

    /// The agent's system prompt
    pub prompt: String,

    /// Tools the agent may use
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Tools the agent may not use
    #[serde(
        rename = "disallowedTools",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub disallowed_tools: Vec<String>,

    /// Model override for the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Skills available to the agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,

    /// Turn limit for the agent
    #[serde(rename = "maxTurns", default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

/// Tool surface configuration
#[derive(Debug, Clone)]
pub enum ToolsConfig {
    /// An explicit tool list
    List(Vec<String>),
    /// A named preset
    Preset(String),
}

/// Full session configuration
///
/// All fields are public; [`Options::builder`] is the ergonomic way to
/// assemble one. The default is an empty configuration: no flags beyond the
/// stream-json prelude, no callbacks, no servers.
#[derive(Default, Clone)]
pub struct Options {
    /// Tool surface configuration
    pub tools: Option<ToolsConfig>,
    /// Tools allowed without prompting
    pub allowed_tools: Vec<String>,
    /// Tools that are always rejected
    pub disallowed_tools: Vec<String>,
    /// System prompt configuration
    pub system_prompt: Option<SystemPromptConfig>,
    /// Model to use
    pub model: Option<String>,
    /// Fallback model when the primary is overloaded
    pub fallback_model: Option<String>,
    /// Thinking-token budget
    pub max_thinking_tokens: Option<u32>,
    /// Turn limit per query
    pub max_turns: Option<u32>,
    /// Budget limit in USD
    pub max_budget_usd: Option<f64>,
    /// Initial permission mode
    pub permission_mode: Option<PermissionMode>,
    /// Tool-permission callback
    pub can_use_tool: Option<CanUseToolCallback>,
    /// Tool the CLI routes permission prompts to
    pub permission_prompt_tool_name: Option<String>,
    /// Skip all permission prompts
    pub allow_dangerously_skip_permissions: bool,
    /// Continue the most recent conversation
    pub continue_conversation: bool,
    /// Session identifier to resume
    pub resume: Option<String>,
    /// Message identifier to resume at
    pub resume_session_at: Option<String>,
    /// Fork the resumed session instead of extending it
    pub fork_session: bool,
    /// Persist the session to disk (`Some(false)` disables)
    pub persist_session: Option<bool>,
    /// Hook matchers per event
    pub hooks: HashMap<HookEvent, Vec<HookMatcherSpec>>,
    /// External MCP server configurations
    pub mcp_servers: HashMap<String, McpServerConfig>,
    /// In-process tool servers
    pub sdk_servers: Vec<Arc<dyn ToolServer>>,
    /// Reject MCP servers not in the configuration
    pub strict_mcp_config: bool,
    /// Working directory for the child
    pub cwd: Option<PathBuf>,
    /// Extra directories the child may access
    pub additional_directories: Vec<String>,
    /// Enable file checkpointing (required for `rewind_files`)
    pub enable_file_checkpointing: bool,
    /// Agent to run as
    pub agent: Option<String>,
    /// Agent catalog sent at initialization
    pub agents: HashMap<String, AgentDefinition>,
    /// Sandbox settings, passed through verbatim
    pub sandbox: Option<Value>,
    /// Emit partial-message stream events
    pub include_partial_messages: bool,
    /// Structured output configuration
    pub output_format: Option<OutputFormat>,
    /// Plugins to load
    pub plugins: Vec<PluginConfig>,
    /// Setting sources to honor
    pub setting_sources: Vec<String>,
    /// Beta features to enable
    pub betas: Vec<String>,
    /// Extra environment variables for the child
    pub env: HashMap<String, String>,
    /// Explicit path to the CLI executable
    pub cli_path: Option<PathBuf>,
    /// Free-form extra flags
    pub extra_args: HashMap<String, Option<String>>,
    /// Callback receiving captured stderr at disconnect
    pub stderr: Option<StderrCallback>,
}

impl Options {
    /// Start building a configuration
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Resolve the CLI executable path
    pub(crate) fn resolve_cli_path(&self) -> Result<PathBuf> {
        match &self.cli_path {
            Some(path) => Ok(path.clone()),
            None => find_cli(),
        }
    }

    /// The callback registry handed to the transport
    pub(crate) fn registry(&self) -> CallbackRegistry {
        let mut tool_servers: HashMap<String, Arc<dyn ToolServer>> = HashMap::new();
        for server in &self.sdk_servers {
            tool_servers.insert(server.name().to_string(), Arc::clone(server));
        }
        CallbackRegistry {
            can_use_tool: self.can_use_tool.clone(),
            hooks: self.hooks.clone(),
            tool_servers,
        }
    }

    /// The agent catalog in wire form
    pub(crate) fn agents_value(&self) -> Option<Map<String, Value>> {
        if self.agents.is_empty() {
            return None;
        }
        let mut map = Map::new();
        for (name, definition) in &self.agents {
            if let Ok(value) = serde_json::to_value(definition) {
                map.insert(name.clone(), value);
            }
        }
        Some(map)
    }

    /// Translate to the flag-level options
    pub(crate) fn to_command_options(&self) -> CommandOptions {
        let mut command = CommandOptions {
            allowed_tools: self.allowed_tools.clone(),
            disallowed_tools: self.disallowed_tools.clone(),
            model: self.model.clone(),
            fallback_model: self.fallback_model.clone(),
            max_thinking_tokens: self.max_thinking_tokens,
            max_turns: self.max_turns,
            max_budget_usd: self.max_budget_usd,
            permission_mode: self.permission_mode,
            permission_prompt_tool_name: self.permission_prompt_tool_name.clone(),
            allow_dangerously_skip_permissions: self.allow_dangerously_skip_permissions,
            continue_conversation: self.continue_conversation,
            resume: self.resume.clone(),
            resume_session_at: self.resume_session_at.clone(),
            fork_session: self.fork_session,
            persist_session: self.persist_session,
            cwd: self.cwd.clone(),
            additional_directories: self.additional_directories.clone(),
            mcp_servers: self.mcp_servers.clone(),
            strict_mcp_config: self.strict_mcp_config,
            agent: self.agent.clone(),
            enable_file_checkpointing: self.enable_file_checkpointing,
            betas: self.betas.clone(),
            setting_sources: self.setting_sources.clone(),
            include_partial_messages: self.include_partial_messages,
            sandbox: self.sandbox.clone(),
            extra_args: self.extra_args.clone(),
            ..CommandOptions::default()
        };

        // A registered permission callback needs prompts routed over stdio.
        if self.can_use_tool.is_some() && command.permission_prompt_tool_name.is_none() {
            command.permission_prompt_tool_name = Some("stdio".to_string());
        }

        if let Some(system_prompt) = &self.system_prompt {
            command.system_prompt = system_prompt.prompt.clone();
            command.append_system_prompt = system_prompt.append.clone();
        }

        if let Some(tools) = &self.tools {
            command.tools = Some(match tools {
                ToolsConfig::List(tools) => serde_json::json!(tools),
                ToolsConfig::Preset(preset) => {
                    serde_json::json!({"type": "preset", "preset": preset})
                }
            });
        }

        if !self.plugins.is_empty() {
            command.plugins = serde_json::to_value(&self.plugins).ok();
        }

        if let Some(format) = &self.output_format {
            command.output_format = serde_json::to_value(format).ok();
        }

        // In-process servers appear in the server map as sdk entries; the
        // instances themselves are reached through the control channel.
        for server in &self.sdk_servers {
            command.mcp_servers.insert(
                server.name().to_string(),
                McpServerConfig::Sdk {
                    name: server.name().to_string(),
                },
            );
        }

        command
    }
}

/// Builder for [`Options`]
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Replace the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.options.system_prompt = Some(SystemPromptConfig::text(prompt));
        self
    }

    /// Append to the default system prompt
    pub fn append_system_prompt(mut self, append: impl Into<String>) -> Self {
        let config = self.options.system_prompt.get_or_insert_with(Default::default);
        config.append = Some(append.into());
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    /// Set the fallback model
    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.options.fallback_model = Some(model.into());
        self
    }

    /// Set the allowed tool list
    pub fn allowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set the disallowed tool list
    pub fn disallowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set the permission mode
    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.options.permission_mode = Some(mode);
        self
    }

    /// Register the tool-permission callback
    pub fn can_use_tool(mut self, callback: CanUseToolCallback) -> Self {
        self.options.can_use_tool = Some(callback);
        self
    }

    /// Add a hook matcher for an event
    pub fn hook(mut self, event: HookEvent, matcher: HookMatcherSpec) -> Self {
        self.options.hooks.entry(event).or_default().push(matcher);
        self
    }

    /// Add an external MCP server
    pub fn mcp_server(mut self, name: impl Into<String>, config: McpServerConfig) -> Self {
        self.options.mcp_servers.insert(name.into(), config);
        self
    }

    /// Add an in-process tool server
    pub fn tool_server(mut self, server: Arc<dyn ToolServer>) -> Self {
        self.options.sdk_servers.push(server);
        self
    }

    /// Set the working directory
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(cwd.into());
        self
    }

    /// Set the turn limit
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.options.max_turns = Some(turns);
        self
    }

    /// Set the thinking-token budget
    pub fn max_thinking_tokens(mut self, tokens: u32) -> Self {
        self.options.max_thinking_tokens = Some(tokens);
        self
    }

    /// Resume a session by identifier
    pub fn resume(mut self, session_id: impl Into<String>) -> Self {
        self.options.resume = Some(session_id.into());
        self
    }

    /// Continue the most recent conversation
    pub fn continue_conversation(mut self) -> Self {
        self.options.continue_conversation = true;
        self
    }

    /// Enable file checkpointing
    pub fn enable_file_checkpointing(mut self) -> Self {
        self.options.enable_file_checkpointing = true;
        self
    }

    /// Add an agent to the catalog
    pub fn agent_definition(
        mut self,
        name: impl Into<String>,
        definition: AgentDefinition,
    ) -> Self {
        self.options.agents.insert(name.into(), definition);
        self
    }

    /// Constrain the final result to a JSON schema
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.options.output_format = Some(OutputFormat::json_schema(schema));
        self
    }

    /// Emit partial-message stream events
    pub fn include_partial_messages(mut self) -> Self {
        self.options.include_partial_messages = true;
        self
    }

    /// Add an environment variable for the child
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Set the CLI executable path explicitly
    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cli_path = Some(path.into());
        self
    }

    /// Add a free-form extra flag
    pub fn extra_arg(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.options.extra_args.insert(name.into(), value);
        self
    }

    /// Receive captured stderr at disconnect
    pub fn stderr(mut self, callback: StderrCallback) -> Self {
        self.options.stderr = Some(callback);
        self
    }

    /// Finish building
    pub fn build(self) -> Options {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assembles_flags() {
        let options = Options::builder()
            .model("sonnet")
            .system_prompt("You are terse.")
            .allowed_tools(["Read", "Glob"])
            .permission_mode(PermissionMode::Plan)
            .max_turns(3)
            .build();

        let command = options.to_command_options();
        assert_eq!(command.model.as_deref(), Some("sonnet"));
        assert_eq!(command.system_prompt.as_deref(), Some("You are terse."));
        assert_eq!(command.allowed_tools, vec!["Read", "Glob"]);
        assert_eq!(command.permission_mode, Some(PermissionMode::Plan));
        assert_eq!(command.max_turns, Some(3));
    }

    #[test]
    fn permission_callback_forces_stdio_prompt_tool() {
        let options = Options {
            can_use_tool: Some(Arc::new(|_, _, _| {
                Box::pin(async { Ok(jetclaude_protocol::PermissionResult::allow()) })
            })),
            ..Options::default()
        };
        let command = options.to_command_options();
        assert_eq!(command.permission_prompt_tool_name.as_deref(), Some("stdio"));

        // An explicit prompt tool wins.
        let options = Options {
            permission_prompt_tool_name: Some("mcp__approver".to_string()),
            ..options
        };
        let command = options.to_command_options();
        assert_eq!(
            command.permission_prompt_tool_name.as_deref(),
            Some("mcp__approver")
        );
    }

    #[test]
    fn tools_preset_is_json_encoded() {
        let options = Options {
            tools: Some(ToolsConfig::Preset("claude_code".to_string())),
            ..Options::default()
        };
        let command = options.to_command_options();
        assert_eq!(
            command.tools.unwrap(),
            serde_json::json!({"type": "preset", "preset": "claude_code"})
        );
    }

    #[test]
    fn agent_catalog_serializes_camel_case() {
        let options = Options::builder()
            .agent_definition(
                "reviewer",
                AgentDefinition {
                    description: "Reviews diffs".to_string(),
                    prompt: "Review carefully.".to_string(),
                    disallowed_tools: vec!["Bash".to_string()],
                    max_turns: Some(2),
                    ..AgentDefinition::default()
                },
            )
            .build();

        let agents = options.agents_value().unwrap();
        assert_eq!(agents["reviewer"]["disallowedTools"][0], "Bash");
        assert_eq!(agents["reviewer"]["maxTurns"], 2);
    }
}
