//! Subprocess supervisor
//!
//! Spawns the CLI as a co-process, owns its stdio endpoints and the reader
//! task, and routes every stdout record either to the control channel or to
//! the event stream. Termination walks a close-stdin, SIGTERM, kill ladder
//! with a five second grace period at each step.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use jetclaude_protocol::control::{ControlRequest, ControlResponse, CONTROL_REQUEST, CONTROL_RESPONSE};
use jetclaude_protocol::message::UserContent;
use jetclaude_protocol::Message;

use crate::command::{build_command, build_command_with_prompt, CommandOptions};
use crate::control::{CallbackRegistry, ControlHandler};
use crate::discovery::validate_working_directory;
use crate::error::{Error, Result};
use crate::framer::{read_record_line, RecordWriter};

/// Depth of the event and error channels
pub const EVENT_CHANNEL_DEPTH: usize = 10;

/// Environment variable identifying the SDK to the CLI
pub const ENTRYPOINT_ENV: &str = "CLAUDE_CODE_ENTRYPOINT";

const ENTRYPOINT_STREAMING: &str = "sdk-rust-client";
const ENTRYPOINT_ONE_SHOT: &str = "sdk-rust";
const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Default session identifier for outbound commands
pub const DEFAULT_SESSION_ID: &str = "default";

/// Startup mode of the child
#[derive(Debug, Clone)]
pub enum Mode {
    /// stdin stays open; the caller may send many commands
    Streaming,
    /// The prompt is passed as an argument and stdin is closed immediately
    OneShot {
        /// The single prompt
        prompt: String,
    },
}

/// Lifecycle state of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never connected
    NotConnected,
    /// `connect` in progress
    Connecting,
    /// Live
    Connected,
    /// `disconnect` in progress
    Closing,
    /// Terminal; reconnection requires a new instance
    Closed,
}

/// An outbound user command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamMessage {
    /// Always `"user"`
    #[serde(rename = "type")]
    pub message_type: String,

    /// The role/content body
    pub message: UserContent,

    /// Tool use this command replies to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,

    /// Target session
    pub session_id: String,
}

impl StreamMessage {
    /// Build a plain-text user command for the given session
    pub fn user(prompt: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message_type: "user".to_string(),
            message: UserContent::text(prompt),
            parent_tool_use_id: None,
            session_id: session_id.into(),
        }
    }
}

/// Transport over a spawned CLI co-process
///
/// Owns the child handle, its stdio endpoints, and the reader task. The
/// control channel shares the stdin writer, so control frames and outbound
/// commands serialize under one lock.
pub struct SubprocessTransport {
    cli_path: PathBuf,
    options: CommandOptions,
    mode: Mode,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,

    state: std::sync::Mutex<SessionState>,
    child: Arc<Mutex<Option<Child>>>,
    writer: Arc<RecordWriter>,
    control: Arc<ControlHandler>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    channels: std::sync::Mutex<Option<(mpsc::Receiver<Message>, mpsc::Receiver<Error>)>>,
    stderr_file: std::sync::Mutex<Option<tempfile::NamedTempFile>>,
}

impl SubprocessTransport {
    /// Create a transport for the given executable and flag set
    ///
    /// Callback registries are installed here, once, and are read-only for
    /// the transport's lifetime.
    pub fn new(
        cli_path: impl Into<PathBuf>,
        options: CommandOptions,
        registry: CallbackRegistry,
    ) -> Self {
        let writer = Arc::new(RecordWriter::detached());
        let control = Arc::new(ControlHandler::new(Arc::clone(&writer), registry));
        Self {
            cli_path: cli_path.into(),
            options,
            mode: Mode::Streaming,
            env: HashMap::new(),
            cwd: None,
            state: std::sync::Mutex::new(SessionState::NotConnected),
            child: Arc::new(Mutex::new(None)),
            writer,
            control,
            reader_task: Mutex::new(None),
            channels: std::sync::Mutex::new(None),
            stderr_file: std::sync::Mutex::new(None),
        }
    }

    /// Select the startup mode (streaming by default)
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Add environment variables for the child
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Set the child's working directory (validated at connect)
    pub fn with_working_directory(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The control channel of this transport
    pub fn control(&self) -> Arc<ControlHandler> {
        Arc::clone(&self.control)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// Whether the transport is live
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Spawn the child and start the reader task
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            match *state {
                SessionState::NotConnected => *state = SessionState::Connecting,
                SessionState::Connecting | SessionState::Connected => {
                    return Err(Error::connection("transport already connected"))
                }
                SessionState::Closing | SessionState::Closed => return Err(Error::Closed),
            }
        }

        match self.connect_inner().await {
            Ok(()) => {
                *self.state.lock().expect("state lock poisoned") = SessionState::Connected;
                Ok(())
            }
            Err(error) => {
                // Failure to start fails the whole session.
                *self.state.lock().expect("state lock poisoned") = SessionState::Closed;
                Err(error)
            }
        }
    }

    async fn connect_inner(&self) -> Result<()> {
        let working_dir = self.cwd.clone().or_else(|| self.options.cwd.clone());
        if let Some(dir) = &working_dir {
            validate_working_directory(dir)?;
        }

        let cli_path = self.cli_path.display().to_string();
        let (argv, entrypoint) = match &self.mode {
            Mode::Streaming => (
                build_command(&cli_path, &self.options, false),
                ENTRYPOINT_STREAMING,
            ),
            Mode::OneShot { prompt } => (
                build_command_with_prompt(&cli_path, &self.options, prompt),
                ENTRYPOINT_ONE_SHOT,
            ),
        };

        let stderr_file = tempfile::Builder::new()
            .prefix("claude_stderr_")
            .suffix(".log")
            .tempfile()
            .map_err(|err| Error::Connection {
                message: "failed to create stderr capture file".to_string(),
                source: Some(err),
            })?;
        let stderr_handle = stderr_file.as_file().try_clone().map_err(|err| Error::Connection {
            message: "failed to clone stderr capture file".to_string(),
            source: Some(err),
        })?;

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .env(ENTRYPOINT_ENV, entrypoint)
            .envs(&self.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr_handle))
            .kill_on_drop(true);
        command.stdin(match self.mode {
            Mode::Streaming => Stdio::piped(),
            Mode::OneShot { .. } => Stdio::null(),
        });
        if let Some(dir) = &working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|err| Error::Connection {
            message: format!("failed to start CLI at {}", self.cli_path.display()),
            source: Some(err),
        })?;
        debug!(pid = child.id(), "CLI process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::connection("failed to open stdout pipe"))?;
        if let Mode::Streaming = self.mode {
            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::connection("failed to open stdin pipe"))?;
            self.writer.attach(stdin).await;
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
        let (error_tx, error_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
        *self.channels.lock().expect("channel lock poisoned") = Some((event_rx, error_rx));

        let stderr_path = stderr_file.path().to_path_buf();
        *self.child.lock().await = Some(child);
        let handle = tokio::spawn(run_reader(
            stdout,
            Arc::clone(&self.control),
            event_tx,
            error_tx,
            Arc::clone(&self.child),
            stderr_path,
        ));
        *self.reader_task.lock().await = Some(handle);
        *self.stderr_file.lock().expect("stderr lock poisoned") = Some(stderr_file);

        Ok(())
    }

    /// Take the event and error streams
    ///
    /// The streams exist once per connection; subsequent calls return
    /// `None`. Both close after disconnect.
    pub fn take_channels(&self) -> Option<(mpsc::Receiver<Message>, mpsc::Receiver<Error>)> {
        self.channels.lock().expect("channel lock poisoned").take()
    }

    /// Write one outbound user command
    ///
    /// A no-op in one-shot mode, where the prompt was passed at startup.
    pub async fn send_message(&self, message: &StreamMessage) -> Result<()> {
        if let Mode::OneShot { .. } = self.mode {
            return Ok(());
        }
        if !self.is_connected() {
            return Err(Error::Closed);
        }
        let line = serde_json::to_string(message)?;
        self.writer.write_record(&line).await
    }

    /// Close the child's stdin, signalling the end of outbound input
    ///
    /// The child is expected to finish its work and exit; the reader keeps
    /// draining stdout until then.
    pub async fn end_input(&self) -> Result<()> {
        self.writer.close().await
    }

    /// Contents of the captured stderr, for diagnostics
    ///
    /// Available until `close` removes the capture file.
    pub fn stderr_contents(&self) -> Option<String> {
        let guard = self.stderr_file.lock().expect("stderr lock poisoned");
        let file = guard.as_ref()?;
        std::fs::read_to_string(file.path()).ok()
    }

    /// Shut the transport down
    ///
    /// Closes stdin, waits up to five seconds for a graceful exit, sends a
    /// termination signal, waits again, then force-kills. Outstanding
    /// control requests complete with a transport-closed error; the event
    /// and error channels close once the reader drains.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            match *state {
                SessionState::Closed => return Ok(()),
                SessionState::NotConnected => {
                    *state = SessionState::Closed;
                    return Ok(());
                }
                _ => *state = SessionState::Closing,
            }
        }

        let _ = self.writer.close().await;

        let child = self.child.lock().await.take();
        let termination = match child {
            Some(child) => terminate_child(child).await,
            None => Ok(()),
        };

        self.control.fail_all_pending();

        if let Some(handle) = self.reader_task.lock().await.take() {
            let mut handle = handle;
            if timeout(TERMINATION_GRACE, &mut handle).await.is_err() {
                warn!("reader task did not exit in time; aborting");
                handle.abort();
                let _ = handle.await;
            }
        }

        // Removes the capture file on drop.
        *self.stderr_file.lock().expect("stderr lock poisoned") = None;

        *self.state.lock().expect("state lock poisoned") = SessionState::Closed;
        termination
    }
}

/// Kill the child along the graceful-exit ladder
async fn terminate_child(mut child: Child) -> Result<()> {
    // stdin is already closed; most CLI versions exit on their own.
    match timeout(TERMINATION_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(?status, "CLI exited after stdin close");
            return Ok(());
        }
        Ok(Err(error)) => {
            // wait() failing usually means the process is already gone.
            debug!(%error, "wait failed; treating child as exited");
            return Ok(());
        }
        Err(_) => {}
    }

    send_terminate_signal(&child);
    match timeout(TERMINATION_GRACE, child.wait()).await {
        Ok(_) => return Ok(()),
        Err(_) => warn!("CLI ignored termination signal; killing"),
    }

    if let Err(error) = child.kill().await {
        // InvalidInput means the child already exited.
        if error.kind() != std::io::ErrorKind::InvalidInput {
            return Err(Error::Io(error));
        }
    }
    let _ = child.wait().await;
    Ok(())
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn send_terminate_signal(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: plain kill(2) on a pid we own; no memory is involved.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn send_terminate_signal(_child: &Child) {}

#[derive(Deserialize)]
struct RecordTag {
    #[serde(rename = "type")]
    record_type: String,
}

/// The reader task: demultiplexes the child's stdout
///
/// Classification looks only at the `type` tag. Control frames go to the
/// control channel (requests on short-lived dispatch tasks); everything
/// else decodes into a message for the event channel. Decode failures go to
/// the error channel and never stop the loop.
async fn run_reader(
    stdout: ChildStdout,
    control: Arc<ControlHandler>,
    events: mpsc::Sender<Message>,
    errors: mpsc::Sender<Error>,
    child: Arc<Mutex<Option<Child>>>,
    stderr_path: PathBuf,
) {
    let mut reader = BufReader::new(stdout);
    let mut consumer_gone = false;

    loop {
        let line = match read_record_line(&mut reader).await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error @ Error::Decode { .. }) => {
                if errors.send(error).await.is_err() {
                    debug!("error consumer dropped; discarding decode error");
                }
                continue;
            }
            Err(error) => {
                let _ = errors.send(error).await;
                break;
            }
        };

        let tag: RecordTag = match serde_json::from_str(&line) {
            Ok(tag) => tag,
            Err(error) => {
                let _ = errors.send(Error::decode(error.to_string(), &line)).await;
                continue;
            }
        };

        match tag.record_type.as_str() {
            CONTROL_RESPONSE => match serde_json::from_str::<ControlResponse>(&line) {
                Ok(frame) => control.handle_response(frame.response),
                Err(error) => {
                    let _ = errors.send(Error::decode(error.to_string(), &line)).await;
                }
            },
            CONTROL_REQUEST => match serde_json::from_str::<ControlRequest>(&line) {
                Ok(frame) => control.clone().handle_request(frame),
                Err(error) => {
                    let _ = errors.send(Error::decode(error.to_string(), &line)).await;
                }
            },
            _ => match jetclaude_protocol::parse_message_line(&line) {
                Ok(message) => {
                    if !consumer_gone && events.send(message).await.is_err() {
                        consumer_gone = true;
                        debug!("event consumer dropped; discarding further events");
                    }
                }
                Err(error) => {
                    let _ = errors.send(Error::decode(error.to_string(), &line)).await;
                }
            },
        }
    }

    // A shutdown in progress takes the child first; if it is still here, the
    // exit was spontaneous and a failure is worth surfacing.
    if let Some(child) = child.lock().await.as_mut() {
        if let Ok(Ok(status)) = timeout(Duration::from_secs(1), child.wait()).await {
            if !status.success() {
                let stderr = stderr_tail(&stderr_path);
                let _ = errors
                    .send(Error::Process {
                        message: "CLI exited unexpectedly".to_string(),
                        exit_code: status.code(),
                        stderr,
                    })
                    .await;
            }
        }
    }

    debug!("reader task exiting");
}

/// Last few KiB of the captured stderr, for error reports
fn stderr_tail(path: &PathBuf) -> String {
    const TAIL_BYTES: usize = 4096;
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let mut start = content.len().saturating_sub(TAIL_BYTES);
            while !content.is_char_boundary(start) {
                start += 1;
            }
            content[start..].to_string()
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_message_wire_shape() {
        let message = StreamMessage::user("hi", DEFAULT_SESSION_ID);
        let encoded = serde_json::to_value(&message).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({
                "type": "user",
                "message": {"role": "user", "content": "hi"},
                "session_id": "default"
            })
        );
    }

    #[test]
    fn new_transport_is_not_connected() {
        let transport = SubprocessTransport::new(
            "claude",
            CommandOptions::default(),
            CallbackRegistry::default(),
        );
        assert_eq!(transport.state(), SessionState::NotConnected);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn send_before_connect_reports_closed() {
        let transport = SubprocessTransport::new(
            "claude",
            CommandOptions::default(),
            CallbackRegistry::default(),
        );
        let err = transport
            .send_message(&StreamMessage::user("hi", DEFAULT_SESSION_ID))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[tokio::test]
    async fn connect_fails_for_missing_executable() {
        let transport = SubprocessTransport::new(
            "/definitely/not/claude",
            CommandOptions::default(),
            CallbackRegistry::default(),
        );
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        // A failed connect is terminal.
        assert_eq!(transport.state(), SessionState::Closed);
        assert!(matches!(transport.connect().await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn connect_validates_working_directory() {
        let transport = SubprocessTransport::new(
            "claude",
            CommandOptions::default(),
            CallbackRegistry::default(),
        )
        .with_working_directory("/definitely/not/a/dir");
        let err = transport.connect().await.unwrap_err();
        assert!(err.to_string().contains("working directory"));
    }

    #[tokio::test]
    async fn close_is_idempotent_without_connect() {
        let transport = SubprocessTransport::new(
            "claude",
            CommandOptions::default(),
            CallbackRegistry::default(),
        );
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert_eq!(transport.state(), SessionState::Closed);
    }
}
