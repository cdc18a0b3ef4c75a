//! One-shot and streaming-input entry points
//!
//! [`query`] is the simplest way to use the SDK: spawn the CLI in one-shot
//! mode, read the resulting messages, done. [`query_stream`] keeps stdin
//! open and forwards caller-supplied commands, for conversations that do
//! not need the full [`Client`](crate::Client) surface.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use jetclaude_protocol::Message;
use jetclaude_transport::{
    Error, Mode, Result, StreamMessage, SubprocessTransport,
};

use crate::options::Options;

/// The messages of one query, in wire order
///
/// A lazy, finite, non-restartable sequence: [`MessageStream::next`] yields
/// each event or surfaced error until the session ends. Dropping the stream
/// without calling [`MessageStream::close`] still terminates the child, but
/// without the graceful five second ladder.
pub struct MessageStream {
    events: mpsc::Receiver<Message>,
    errors: mpsc::Receiver<Error>,
    events_done: bool,
    errors_done: bool,
    transport: Arc<SubprocessTransport>,
}

impl MessageStream {
    pub(crate) fn new(
        events: mpsc::Receiver<Message>,
        errors: mpsc::Receiver<Error>,
        transport: Arc<SubprocessTransport>,
    ) -> Self {
        Self {
            events,
            errors,
            events_done: false,
            errors_done: false,
            transport,
        }
    }

    /// The next message or surfaced error, or `None` when the session ends
    pub async fn next(&mut self) -> Option<Result<Message>> {
        loop {
            if self.events_done && self.errors_done {
                return None;
            }
            tokio::select! {
                event = self.events.recv(), if !self.events_done => {
                    match event {
                        Some(message) => return Some(Ok(message)),
                        None => self.events_done = true,
                    }
                }
                error = self.errors.recv(), if !self.errors_done => {
                    match error {
                        Some(error) => return Some(Err(error)),
                        None => self.errors_done = true,
                    }
                }
            }
        }
    }

    /// Collect the remaining messages, stopping at the first surfaced error
    pub async fn collect(mut self) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(item) = self.next().await {
            messages.push(item?);
        }
        Ok(messages)
    }

    /// Terminate the session
    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }
}

/// Run a single prompt and stream back the resulting messages
///
/// Spawns the CLI in one-shot mode; the child exits after producing its
/// result message, which closes the stream.
pub async fn query(prompt: impl Into<String>, options: Option<Options>) -> Result<MessageStream> {
    let options = options.unwrap_or_default();
    let cli_path = options.resolve_cli_path()?;

    let transport = Arc::new(
        SubprocessTransport::new(&cli_path, options.to_command_options(), options.registry())
            .with_mode(Mode::OneShot {
                prompt: prompt.into(),
            })
            .with_env(options.env.clone()),
    );
    transport.connect().await?;
    debug!(cli = %cli_path.display(), "one-shot query started");

    let (events, errors) = transport
        .take_channels()
        .expect("fresh transport has channels");
    Ok(MessageStream::new(events, errors, transport))
}

/// Run a conversation fed by a channel of outbound commands
///
/// Each command received on `input` is written to the child in order; the
/// returned stream yields the child's messages. Closing the input channel
/// closes the child's stdin, which ends the session.
pub async fn query_stream(
    mut input: mpsc::Receiver<StreamMessage>,
    options: Option<Options>,
) -> Result<MessageStream> {
    let options = options.unwrap_or_default();
    let cli_path = options.resolve_cli_path()?;

    let transport = Arc::new(
        SubprocessTransport::new(&cli_path, options.to_command_options(), options.registry())
            .with_env(options.env.clone()),
    );
    transport.connect().await?;

    let forwarder = Arc::clone(&transport);
    tokio::spawn(async move {
        while let Some(message) = input.recv().await {
            if let Err(error) = forwarder.send_message(&message).await {
                debug!(%error, "stopping input forwarding");
                break;
            }
        }
        let _ = forwarder.end_input().await;
    });

    let (events, errors) = transport
        .take_channels()
        .expect("fresh transport has channels");
    Ok(MessageStream::new(events, errors, transport))
}
