//! End-to-end transport tests against a scripted fake CLI
//!
//! Each test writes a small shell script standing in for the real CLI,
//! spawns it through the transport, and exercises one slice of the
//! protocol: event delivery, control correlation, permission callbacks,
//! forward compatibility, oversize recovery, and shutdown under load.

#![cfg(unix)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use jetclaude_protocol::permissions::PermissionResult;
use jetclaude_protocol::Message;
use jetclaude_transport::{
    CallbackRegistry, CommandOptions, Error, Mode, StreamMessage, SubprocessTransport,
    DEFAULT_SESSION_ID,
};

struct FakeCli {
    dir: tempfile::TempDir,
    path: PathBuf,
}

impl FakeCli {
    fn new(body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claude");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, path }
    }

    fn out_file(&self) -> PathBuf {
        self.dir.path().join("captured.jsonl")
    }

    fn transport(&self, registry: CallbackRegistry) -> SubprocessTransport {
        let env = HashMap::from([(
            "OUT".to_string(),
            self.out_file().display().to_string(),
        )]);
        SubprocessTransport::new(&self.path, CommandOptions::default(), registry).with_env(env)
    }
}

async fn wait_for_file(path: &PathBuf) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(content) = std::fs::read_to_string(path) {
            if !content.trim().is_empty() {
                return content;
            }
        }
        assert!(Instant::now() < deadline, "timed out waiting for {path:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn streaming_send_delivers_events_in_order_then_closes() {
    let cli = FakeCli::new(
        r#"read -r line
echo '{"type":"assistant","message":{"id":"m1","type":"message","role":"assistant","model":"claude-sonnet-4-5","content":[{"type":"text","text":"hello"}]},"uuid":"u1","session_id":"default"}'
echo '{"type":"result","subtype":"success","duration_ms":5,"duration_api_ms":3,"is_error":false,"num_turns":1,"uuid":"u2","session_id":"default"}'"#,
    );
    let transport = cli.transport(CallbackRegistry::default());
    transport.connect().await.unwrap();
    let (mut events, mut errors) = transport.take_channels().unwrap();

    transport
        .send_message(&StreamMessage::user("hi", DEFAULT_SESSION_ID))
        .await
        .unwrap();

    let first = events.recv().await.expect("an assistant event");
    let Message::Assistant(assistant) = &first else {
        panic!("expected assistant first, got {first:?}");
    };
    assert_eq!(assistant.message.text(), "hello");

    let second = events.recv().await.expect("a result event");
    let Message::Result(result) = &second else {
        panic!("expected result second, got {second:?}");
    };
    assert!(!result.is_error);

    // Exactly two events, then the channel closes on child exit.
    assert!(events.recv().await.is_none());
    assert!(errors.recv().await.is_none());

    transport.close().await.unwrap();
}

#[tokio::test]
async fn control_request_is_correlated_on_the_wire() {
    let cli = FakeCli::new(
        r#"read -r line
printf '%s\n' "$line" >> "$OUT"
echo '{"type":"control_response","response":{"request_id":"sdk-req-1","subtype":"success"}}'
read -r rest"#,
    );
    let transport = cli.transport(CallbackRegistry::default());
    transport.connect().await.unwrap();
    let _channels = transport.take_channels().unwrap();

    transport.control().interrupt().await.unwrap();

    let captured = wait_for_file(&cli.out_file()).await;
    assert_eq!(
        captured.trim(),
        r#"{"type":"control_request","request_id":"sdk-req-1","request":{"subtype":"interrupt"}}"#
    );

    transport.close().await.unwrap();
    assert_eq!(transport.control().pending_count(), 0);
}

#[tokio::test]
async fn permission_callback_denies_and_responds_on_stdin() {
    let cli = FakeCli::new(
        r#"echo '{"type":"control_request","request_id":"r1","request":{"subtype":"can_use_tool","tool_name":"Bash","input":{"command":"rm -rf /"},"tool_use_id":"t1"}}'
read -r line
printf '%s\n' "$line" >> "$OUT""#,
    );
    let registry = CallbackRegistry {
        can_use_tool: Some(Arc::new(|tool_name, _input, options| {
            Box::pin(async move {
                assert_eq!(options.tool_use_id, "t1");
                if tool_name == "Bash" {
                    Ok(PermissionResult::deny("Bash is blocked in this session"))
                } else {
                    Ok(PermissionResult::allow())
                }
            })
        })),
        ..CallbackRegistry::default()
    };
    let transport = cli.transport(registry);
    transport.connect().await.unwrap();
    let _channels = transport.take_channels().unwrap();

    let captured = wait_for_file(&cli.out_file()).await;
    let frame: Value = serde_json::from_str(captured.trim()).unwrap();
    assert_eq!(frame["type"], "control_response");
    assert_eq!(frame["response"]["request_id"], "r1");
    assert_eq!(frame["response"]["subtype"], "success");
    assert_eq!(frame["response"]["response"]["behavior"], "deny");
    assert_eq!(
        frame["response"]["response"]["message"],
        "Bash is blocked in this session"
    );

    transport.close().await.unwrap();
}

#[tokio::test]
async fn unknown_message_type_reaches_the_consumer_intact() {
    let cli = FakeCli::new(
        r#"echo '{"type":"future_event","foo":"bar","session_id":"s","uuid":"u"}'"#,
    );
    let transport = cli.transport(CallbackRegistry::default());
    transport.connect().await.unwrap();
    let (mut events, mut errors) = transport.take_channels().unwrap();

    let event = events.recv().await.expect("one opaque event");
    assert_eq!(event.message_type(), "future_event");
    assert_eq!(event.session_id(), "s");
    let Message::Raw(raw) = &event else {
        panic!("expected a raw event");
    };
    assert_eq!(raw.data["foo"], "bar");

    assert!(events.recv().await.is_none());
    // No error was surfaced for the unknown type.
    assert!(errors.recv().await.is_none());

    transport.close().await.unwrap();
}

#[tokio::test]
async fn oversize_line_surfaces_one_error_and_parsing_continues() {
    let cli = FakeCli::new(
        r#"head -c 2097152 /dev/zero | tr '\0' 'a'
echo
echo '{"type":"status","status":"ready","uuid":"u","session_id":"s"}'"#,
    );
    let transport = cli.transport(CallbackRegistry::default());
    transport.connect().await.unwrap();
    let (mut events, mut errors) = transport.take_channels().unwrap();

    let error = errors.recv().await.expect("a decode error");
    assert!(matches!(error, Error::Decode { .. }), "got {error:?}");

    let event = events.recv().await.expect("the line after the oversize one");
    assert_eq!(event.message_type(), "status");

    assert!(events.recv().await.is_none());
    transport.close().await.unwrap();
}

#[tokio::test]
async fn shutdown_under_callback_load_stays_bounded() {
    let mut requests = String::new();
    for i in 1..=10 {
        requests.push_str(&format!(
            "echo '{{\"type\":\"control_request\",\"request_id\":\"r{i}\",\"request\":{{\"subtype\":\"can_use_tool\",\"tool_name\":\"Read\",\"input\":{{}},\"tool_use_id\":\"t{i}\"}}}}'\n"
        ));
    }
    let cli = FakeCli::new(&format!("{requests}cat > \"$OUT\""));

    let registry = CallbackRegistry {
        can_use_tool: Some(Arc::new(|_, _, _| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(PermissionResult::allow())
            })
        })),
        ..CallbackRegistry::default()
    };
    let transport = cli.transport(registry);
    transport.connect().await.unwrap();
    let (mut events, mut errors) = transport.take_channels().unwrap();

    // Let some dispatches start, then tear the session down mid-flight.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let started = Instant::now();
    transport.close().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(6));

    // Reader exited, both channels closed, nothing left pending.
    assert!(events.recv().await.is_none());
    assert!(errors.recv().await.is_none());
    assert_eq!(transport.control().pending_count(), 0);
}

#[tokio::test]
async fn unexpected_death_surfaces_a_process_error() {
    let cli = FakeCli::new(
        r#"echo 'fatal: cannot reach api' >&2
exit 3"#,
    );
    let transport = cli.transport(CallbackRegistry::default());
    transport.connect().await.unwrap();
    let (mut events, mut errors) = transport.take_channels().unwrap();

    let error = errors.recv().await.expect("a process error");
    let Error::Process {
        exit_code, stderr, ..
    } = &error
    else {
        panic!("expected process error, got {error:?}");
    };
    assert_eq!(*exit_code, Some(3));
    assert!(stderr.contains("cannot reach api"));

    assert!(events.recv().await.is_none());
    transport.close().await.unwrap();
}

#[tokio::test]
async fn one_shot_mode_passes_the_prompt_and_ends_on_result() {
    let cli = FakeCli::new(
        r#"for arg in "$@"; do printf '%s\n' "$arg" >> "$OUT"; done
echo '{"type":"result","subtype":"success","duration_ms":1,"duration_api_ms":1,"is_error":false,"num_turns":1,"result":"fin","uuid":"u","session_id":"s"}'"#,
    );
    let transport = cli
        .transport(CallbackRegistry::default())
        .with_mode(Mode::OneShot {
            prompt: "what is 2+2?".to_string(),
        });
    transport.connect().await.unwrap();
    let (mut events, _errors) = transport.take_channels().unwrap();

    // Outbound sends are a no-op in one-shot mode.
    transport
        .send_message(&StreamMessage::user("ignored", DEFAULT_SESSION_ID))
        .await
        .unwrap();

    let event = events.recv().await.expect("the result event");
    let Message::Result(result) = &event else {
        panic!("expected a result event");
    };
    assert_eq!(result.result.as_deref(), Some("fin"));
    assert!(events.recv().await.is_none());

    let args = wait_for_file(&cli.out_file()).await;
    assert!(args.lines().any(|l| l == "--print"));
    assert!(args.lines().any(|l| l == "what is 2+2?"));
    assert!(!args.lines().any(|l| l == "--input-format"));

    transport.close().await.unwrap();
}

#[tokio::test]
async fn stderr_is_captured_for_diagnostics() {
    let cli = FakeCli::new(r#"echo 'something went sideways' >&2"#);
    let transport = cli.transport(CallbackRegistry::default());
    transport.connect().await.unwrap();
    let (mut events, _errors) = transport.take_channels().unwrap();

    // Child exit closes the event stream; stderr is on disk by then.
    assert!(events.recv().await.is_none());
    let stderr = transport.stderr_contents().expect("captured stderr");
    assert!(stderr.contains("something went sideways"));

    transport.close().await.unwrap();
    // The capture file is removed at close.
    assert!(transport.stderr_contents().is_none());
}

#[tokio::test]
async fn slow_consumer_applies_backpressure_without_loss() {
    let mut lines = String::new();
    for i in 0..50 {
        lines.push_str(&format!(
            "echo '{{\"type\":\"status\",\"status\":\"step-{i}\",\"uuid\":\"u{i}\",\"session_id\":\"s\"}}'\n"
        ));
    }
    let cli = FakeCli::new(&lines);
    let transport = cli.transport(CallbackRegistry::default());
    transport.connect().await.unwrap();
    let (mut events, _errors) = transport.take_channels().unwrap();

    // Read slowly; the bounded channel forces the reader to keep pace.
    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        tokio::time::sleep(Duration::from_millis(2)).await;
        let Message::Status(status) = event else {
            panic!("expected status events");
        };
        seen.push(status.status.unwrap());
    }

    let expected: Vec<String> = (0..50).map(|i| format!("step-{i}")).collect();
    assert_eq!(seen, expected);

    transport.close().await.unwrap();
}
