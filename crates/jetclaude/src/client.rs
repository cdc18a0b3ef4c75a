//! Interactive client over a connected transport
//!
//! [`Client`] is the caller-visible surface of a streaming session: it owns
//! the subprocess transport, performs the `initialize` handshake at connect,
//! caches the handshake results for query, and forwards prompts and control
//! operations. The event and error streams are taken once per connection
//! and close when the session ends.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use jetclaude_protocol::control::{
    AccountInfo, InitializeResponse, ModelInfo, RewindFilesResult, SlashCommand,
};
use jetclaude_protocol::mcp::{McpServerConfig, McpServerStatus, McpSetServersResult};
use jetclaude_protocol::{Message, PermissionMode};
use jetclaude_transport::{
    Error, InitializeParams, Result, StreamMessage, SubprocessTransport, DEFAULT_SESSION_ID,
};

use crate::options::Options;

/// An interactive session with the CLI
///
/// Created disconnected; [`Client::connect`] spawns the child and performs
/// the handshake. A closed client stays closed; reconnection means a new
/// client.
pub struct Client {
    options: Options,
    cli_path: PathBuf,
    transport: tokio::sync::Mutex<Option<Arc<SubprocessTransport>>>,
    init: std::sync::Mutex<Option<InitializeResponse>>,
    events: std::sync::Mutex<Option<mpsc::Receiver<Message>>>,
    errors: std::sync::Mutex<Option<mpsc::Receiver<Error>>>,
}

impl Client {
    /// Create a disconnected client
    ///
    /// Locates the CLI executable now so a missing installation fails fast.
    pub fn new(options: Options) -> Result<Self> {
        let cli_path = options.resolve_cli_path()?;
        Ok(Self {
            options,
            cli_path,
            transport: tokio::sync::Mutex::new(None),
            init: std::sync::Mutex::new(None),
            events: std::sync::Mutex::new(None),
            errors: std::sync::Mutex::new(None),
        })
    }

    /// Spawn the CLI and perform the initialization handshake
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.transport.lock().await;
        if guard.is_some() {
            return Err(jetclaude_transport::Error::connection(
                "client already connected",
            ));
        }

        let transport = Arc::new(
            SubprocessTransport::new(
                &self.cli_path,
                self.options.to_command_options(),
                self.options.registry(),
            )
            .with_env(self.options.env.clone()),
        );
        transport.connect().await?;

        let (events, errors) = transport
            .take_channels()
            .expect("fresh transport has channels");

        let params = InitializeParams {
            json_schema: self
                .options
                .output_format
                .as_ref()
                .map(|format| format.schema.clone()),
            agents: self.options.agents_value(),
            ..InitializeParams::default()
        };
        match transport.control().initialize(params).await {
            Ok(init) => {
                debug!(
                    commands = init.commands.len(),
                    models = init.models.len(),
                    "session initialized"
                );
                *self.init.lock().expect("init lock poisoned") = Some(init);
            }
            Err(error) => {
                let _ = transport.close().await;
                return Err(error);
            }
        }

        *self.events.lock().expect("events lock poisoned") = Some(events);
        *self.errors.lock().expect("errors lock poisoned") = Some(errors);
        *guard = Some(transport);
        Ok(())
    }

    /// Disconnect and terminate the child
    ///
    /// Idempotent. The registered stderr callback, if any, receives the
    /// captured stderr before the capture file is removed.
    pub async fn disconnect(&self) -> Result<()> {
        let transport = self.transport.lock().await.take();
        let Some(transport) = transport else {
            return Ok(());
        };

        if let Some(callback) = &self.options.stderr {
            if let Some(content) = transport.stderr_contents() {
                if !content.is_empty() {
                    callback(content);
                }
            }
        }

        transport.close().await
    }

    /// Whether the session is live
    pub async fn is_connected(&self) -> bool {
        match self.transport.lock().await.as_ref() {
            Some(transport) => transport.is_connected(),
            None => false,
        }
    }

    async fn transport(&self) -> Result<Arc<SubprocessTransport>> {
        self.transport
            .lock()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(Error::Closed)
    }

    /// Send a prompt to the default session
    pub async fn send_prompt(&self, prompt: impl Into<String>) -> Result<()> {
        self.send_prompt_to_session(prompt, DEFAULT_SESSION_ID).await
    }

    /// Send a prompt to a specific session
    pub async fn send_prompt_to_session(
        &self,
        prompt: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<()> {
        let transport = self.transport().await?;
        transport
            .send_message(&StreamMessage::user(prompt, session_id))
            .await
    }

    /// Take the event stream
    ///
    /// Available once per connection; `None` afterwards. The stream closes
    /// when the session disconnects.
    pub fn messages(&self) -> Option<mpsc::Receiver<Message>> {
        self.events.lock().expect("events lock poisoned").take()
    }

    /// Take the error stream, paired with [`Client::messages`]
    pub fn errors(&self) -> Option<mpsc::Receiver<Error>> {
        self.errors.lock().expect("errors lock poisoned").take()
    }

    // ===== Control operations =====

    /// Interrupt the current turn
    pub async fn interrupt(&self) -> Result<()> {
        self.transport().await?.control().interrupt().await
    }

    /// Change the permission mode
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.transport()
            .await?
            .control()
            .set_permission_mode(mode)
            .await
    }

    /// Change the model; `None` resets to the default
    pub async fn set_model(&self, model: Option<&str>) -> Result<()> {
        self.transport().await?.control().set_model(model).await
    }

    /// Change the thinking-token budget; `None` removes the limit
    pub async fn set_max_thinking_tokens(&self, tokens: Option<u32>) -> Result<()> {
        self.transport()
            .await?
            .control()
            .set_max_thinking_tokens(tokens)
            .await
    }

    /// Rewind checkpointed files to the given user message
    pub async fn rewind_files(&self, user_message_id: &str) -> Result<()> {
        self.transport()
            .await?
            .control()
            .rewind_files(user_message_id)
            .await
    }

    /// Preview a file rewind without applying it
    pub async fn rewind_files_dry_run(&self, user_message_id: &str) -> Result<RewindFilesResult> {
        self.transport()
            .await?
            .control()
            .rewind_files_with_options(user_message_id, true)
            .await
    }

    /// Fetch the status of every configured MCP server
    pub async fn mcp_server_status(&self) -> Result<Vec<McpServerStatus>> {
        self.transport().await?.control().mcp_status().await
    }

    /// Replace the set of configured MCP servers
    pub async fn set_mcp_servers(
        &self,
        servers: &HashMap<String, McpServerConfig>,
    ) -> Result<McpSetServersResult> {
        self.transport()
            .await?
            .control()
            .mcp_set_servers(servers)
            .await
    }

    /// Ask a configured MCP server to reconnect
    pub async fn reconnect_mcp_server(&self, server_name: &str) -> Result<()> {
        self.transport()
            .await?
            .control()
            .mcp_reconnect(server_name)
            .await
    }

    /// Enable or disable a configured MCP server
    pub async fn toggle_mcp_server(&self, server_name: &str, enabled: bool) -> Result<()> {
        self.transport()
            .await?
            .control()
            .mcp_toggle(server_name, enabled)
            .await
    }

    // ===== Cached handshake results =====

    /// Slash commands available in this session
    pub fn supported_commands(&self) -> Result<Vec<SlashCommand>> {
        self.with_init(|init| init.commands.clone())
    }

    /// Models available to this account
    pub fn supported_models(&self) -> Result<Vec<ModelInfo>> {
        self.with_init(|init| init.models.clone())
    }

    /// Account summary
    pub fn account_info(&self) -> Result<AccountInfo> {
        self.with_init(|init| init.account.clone())
    }

    /// Output style and the styles the CLI can switch to
    pub fn output_styles(&self) -> Result<(String, Vec<String>)> {
        self.with_init(|init| {
            (
                init.output_style.clone(),
                init.available_output_styles.clone(),
            )
        })
    }

    fn with_init<T>(&self, f: impl FnOnce(&InitializeResponse) -> T) -> Result<T> {
        self.init
            .lock()
            .expect("init lock poisoned")
            .as_ref()
            .map(f)
            .ok_or(Error::Closed)
    }
}

/// Run a closure against a connected client, disconnecting on every exit path
pub async fn with_client<F, Fut, T>(options: Options, f: F) -> Result<T>
where
    F: FnOnce(Arc<Client>) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let client = Arc::new(Client::new(options)?);
    client.connect().await?;
    let result = f(Arc::clone(&client)).await;
    let disconnect = client.disconnect().await;
    match result {
        Ok(value) => disconnect.map(|_| value),
        Err(error) => Err(error),
    }
}
