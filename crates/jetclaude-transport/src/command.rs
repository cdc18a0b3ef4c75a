//! Option-to-flag translation
//!
//! A pure mapping from a [`CommandOptions`] record to the argument vector
//! the CLI is launched with. The transport core never interprets these
//! flags; it only guarantees the fixed stream-json prelude.

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use jetclaude_protocol::mcp::McpServerConfig;
use jetclaude_protocol::PermissionMode;

/// Flag-level configuration for launching the CLI
///
/// Every field maps to one CLI flag; `None`/empty means the flag is omitted.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// `--allowed-tools`, comma-joined
    pub allowed_tools: Vec<String>,
    /// `--disallowed-tools`, comma-joined
    pub disallowed_tools: Vec<String>,
    /// `--system-prompt`
    pub system_prompt: Option<String>,
    /// `--append-system-prompt`
    pub append_system_prompt: Option<String>,
    /// `--model`
    pub model: Option<String>,
    /// `--fallback-model`
    pub fallback_model: Option<String>,
    /// `--max-thinking-tokens`
    pub max_thinking_tokens: Option<u32>,
    /// `--permission-mode`
    pub permission_mode: Option<PermissionMode>,
    /// `--permission-prompt-tool`
    pub permission_prompt_tool_name: Option<String>,
    /// `--continue`
    pub continue_conversation: bool,
    /// `--resume`
    pub resume: Option<String>,
    /// `--resume-at`
    pub resume_session_at: Option<String>,
    /// `--fork-session`
    pub fork_session: bool,
    /// `--no-persist` when `Some(false)`
    pub persist_session: Option<bool>,
    /// `--max-turns`
    pub max_turns: Option<u32>,
    /// `--max-budget-usd`
    pub max_budget_usd: Option<f64>,
    /// Working directory passed as `--cwd`
    pub cwd: Option<PathBuf>,
    /// `--add-dir`, one flag per directory
    pub additional_directories: Vec<String>,
    /// `--mcp-servers`, JSON-encoded
    pub mcp_servers: HashMap<String, McpServerConfig>,
    /// `--strict-mcp-config`
    pub strict_mcp_config: bool,
    /// `--agent`
    pub agent: Option<String>,
    /// `--enable-file-checkpointing`
    pub enable_file_checkpointing: bool,
    /// `--beta`, one flag per value
    pub betas: Vec<String>,
    /// `--settings-source`, one flag per value
    pub setting_sources: Vec<String>,
    /// `--dangerously-skip-permissions`
    pub allow_dangerously_skip_permissions: bool,
    /// `--include-partial-messages`
    pub include_partial_messages: bool,
    /// `--tools`, JSON-encoded
    pub tools: Option<Value>,
    /// `--sandbox`, JSON-encoded
    pub sandbox: Option<Value>,
    /// `--plugins`, JSON-encoded
    pub plugins: Option<Value>,
    /// `--output-format-config`, JSON-encoded
    pub output_format: Option<Value>,
    /// Free-form extra flags; `None` value means a bare flag
    pub extra_args: HashMap<String, Option<String>>,
}

/// Build the argument vector for a streaming session
///
/// `close_stdin` selects print mode without an inline prompt (stdin is
/// closed after one message).
pub fn build_command(cli_path: &str, options: &CommandOptions, close_stdin: bool) -> Vec<String> {
    let mut cmd = vec![
        cli_path.to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
    ];

    if close_stdin {
        cmd.push("--print".to_string());
    } else {
        cmd.push("--input-format".to_string());
        cmd.push("stream-json".to_string());
    }

    append_flags(cmd, options)
}

/// Build the argument vector for a one-shot invocation
pub fn build_command_with_prompt(
    cli_path: &str,
    options: &CommandOptions,
    prompt: &str,
) -> Vec<String> {
    let cmd = vec![
        cli_path.to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
        "--print".to_string(),
        prompt.to_string(),
    ];
    append_flags(cmd, options)
}

fn append_flags(mut cmd: Vec<String>, options: &CommandOptions) -> Vec<String> {
    if !options.allowed_tools.is_empty() {
        push_flag(&mut cmd, "--allowed-tools", options.allowed_tools.join(","));
    }
    if !options.disallowed_tools.is_empty() {
        push_flag(&mut cmd, "--disallowed-tools", options.disallowed_tools.join(","));
    }
    if let Some(prompt) = &options.system_prompt {
        push_flag(&mut cmd, "--system-prompt", prompt.clone());
    }
    if let Some(prompt) = &options.append_system_prompt {
        push_flag(&mut cmd, "--append-system-prompt", prompt.clone());
    }
    if let Some(model) = &options.model {
        push_flag(&mut cmd, "--model", model.clone());
    }
    if let Some(model) = &options.fallback_model {
        push_flag(&mut cmd, "--fallback-model", model.clone());
    }
    if let Some(tokens) = options.max_thinking_tokens {
        push_flag(&mut cmd, "--max-thinking-tokens", tokens.to_string());
    }
    if let Some(mode) = options.permission_mode {
        push_flag(&mut cmd, "--permission-mode", mode.as_str().to_string());
    }
    if let Some(tool) = &options.permission_prompt_tool_name {
        push_flag(&mut cmd, "--permission-prompt-tool", tool.clone());
    }
    if options.continue_conversation {
        cmd.push("--continue".to_string());
    }
    if let Some(session) = &options.resume {
        push_flag(&mut cmd, "--resume", session.clone());
    }
    if let Some(message_id) = &options.resume_session_at {
        push_flag(&mut cmd, "--resume-at", message_id.clone());
    }
    if options.fork_session {
        cmd.push("--fork-session".to_string());
    }
    if options.persist_session == Some(false) {
        cmd.push("--no-persist".to_string());
    }
    if let Some(turns) = options.max_turns {
        push_flag(&mut cmd, "--max-turns", turns.to_string());
    }
    if let Some(budget) = options.max_budget_usd {
        push_flag(&mut cmd, "--max-budget-usd", format!("{budget:.2}"));
    }
    if let Some(cwd) = &options.cwd {
        push_flag(&mut cmd, "--cwd", cwd.display().to_string());
    }
    for dir in &options.additional_directories {
        push_flag(&mut cmd, "--add-dir", dir.clone());
    }
    if !options.mcp_servers.is_empty() {
        if let Ok(encoded) = serde_json::to_string(&options.mcp_servers) {
            push_flag(&mut cmd, "--mcp-servers", encoded);
        }
    }
    if options.strict_mcp_config {
        cmd.push("--strict-mcp-config".to_string());
    }
    if let Some(agent) = &options.agent {
        push_flag(&mut cmd, "--agent", agent.clone());
    }
    if options.enable_file_checkpointing {
        cmd.push("--enable-file-checkpointing".to_string());
    }
    for beta in &options.betas {
        push_flag(&mut cmd, "--beta", beta.clone());
    }
    for source in &options.setting_sources {
        push_flag(&mut cmd, "--settings-source", source.clone());
    }
    if options.allow_dangerously_skip_permissions {
        cmd.push("--dangerously-skip-permissions".to_string());
    }
    if options.include_partial_messages {
        cmd.push("--include-partial-messages".to_string());
    }
    if let Some(tools) = &options.tools {
        if let Ok(encoded) = serde_json::to_string(tools) {
            push_flag(&mut cmd, "--tools", encoded);
        }
    }
    if let Some(sandbox) = &options.sandbox {
        if let Ok(encoded) = serde_json::to_string(sandbox) {
            push_flag(&mut cmd, "--sandbox", encoded);
        }
    }
    if let Some(plugins) = &options.plugins {
        if let Ok(encoded) = serde_json::to_string(plugins) {
            push_flag(&mut cmd, "--plugins", encoded);
        }
    }
    if let Some(format) = &options.output_format {
        if let Ok(encoded) = serde_json::to_string(format) {
            push_flag(&mut cmd, "--output-format-config", encoded);
        }
    }

    // Extra args last, sorted for a stable argv.
    let mut extra: Vec<_> = options.extra_args.iter().collect();
    extra.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in extra {
        match value {
            Some(value) => push_flag(&mut cmd, &format!("--{name}"), value.clone()),
            None => cmd.push(format!("--{name}")),
        }
    }

    cmd
}

fn push_flag(cmd: &mut Vec<String>, name: &str, value: String) {
    cmd.push(name.to_string());
    cmd.push(value);
}
