//! Stdio transport (component D): spawns a child process and frames JSON
//! by newline over its stdin/stdout.
//!
//! Piped stdin/stdout/stderr, a dedicated reader task, and an environment
//! merge, structured around the [`Transport`] trait's state machine and
//! message stream instead of a raw `send`/`receive` pair.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, watch};

use super::{message_channel, validate, MessageStream, Transport, TransportError, TransportResult, TransportState};
use crate::jsonrpc::{JsonRpcMessage, DEFAULT_MAX_MESSAGE_SIZE};

/// Well-known locations MCP servers launched via `node`/`npx`/`npm` tend to
/// live in but which are not always on a spawned child's inherited `PATH`
/// (e.g. when the parent process was itself launched from a GUI app or a
/// minimal login shell).
const WELL_KNOWN_NODE_PATHS: &[&str] = &[
    "/usr/local/bin",
    "/opt/homebrew/bin",
    "/usr/local/lib/node_modules/.bin",
    "/usr/lib/node_modules/.bin",
];

#[derive(Debug, Clone)]
pub struct StdioTransportConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub max_message_size: usize,
}

impl StdioTransportConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Spawns `command` as a child process and frames JSON-RPC messages as
/// newline-delimited lines over its stdin/stdout, per §4.4.
pub struct StdioTransport {
    config: StdioTransportConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    state: TransportState,
    state_tx: watch::Sender<TransportState>,
    message_tx: Option<mpsc::Sender<TransportResult<JsonRpcMessage>>>,
    message_rx: Option<MessageStream>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
    stderr_task: Option<tokio::task::JoinHandle<()>>,
}

impl StdioTransport {
    pub fn new(config: StdioTransportConfig) -> Self {
        let (state_tx, _) = watch::channel(TransportState::Disconnected);
        Self {
            config,
            child: None,
            stdin: None,
            state: TransportState::Disconnected,
            state_tx,
            message_tx: None,
            message_rx: None,
            reader_task: None,
            stderr_task: None,
        }
    }

    fn set_state(&mut self, state: TransportState) {
        self.state = state.clone();
        let _ = self.state_tx.send(state);
    }

    fn augmented_path() -> String {
        let existing = std::env::var("PATH").unwrap_or_default();
        let mut parts: Vec<String> = if existing.is_empty() {
            Vec::new()
        } else {
            existing.split(':').map(str::to_string).collect()
        };
        for candidate in WELL_KNOWN_NODE_PATHS {
            if !parts.iter().any(|p| p == candidate) {
                parts.push((*candidate).to_string());
            }
        }
        parts.join(":")
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn state(&self) -> TransportState {
        self.state.clone()
    }

    fn state_stream(&self) -> watch::Receiver<TransportState> {
        self.state_tx.subscribe()
    }

    fn take_messages(&mut self) -> MessageStream {
        self.message_rx.take().unwrap_or_else(super::empty_messages)
    }

    async fn start(&mut self) -> TransportResult<()> {
        self.set_state(TransportState::Connecting);

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .env("PATH", Self::augmented_path())
            .envs(&self.config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            let err = TransportError::ConnectionFailed(format!("failed to spawn child: {e}"));
            self.set_state(TransportState::Failed(err.to_string()));
            err
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::ConnectionFailed("child process has no stdin".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::ConnectionFailed("child process has no stdout".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            TransportError::ConnectionFailed("child process has no stderr".to_string())
        })?;

        let (tx, stream) = message_channel(64);
        self.message_tx = Some(tx.clone());
        self.message_rx = Some(stream);

        let state_tx = self.state_tx.clone();
        let reader_tx = tx;
        self.reader_task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match super::parse(&line) {
                            Ok(message) => {
                                if reader_tx.send(Ok(message)).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, line, "dropping undecodable stdio frame");
                            }
                        }
                    }
                    Ok(None) => {
                        let _ = state_tx.send(TransportState::Disconnected);
                        break;
                    }
                    Err(err) => {
                        let transport_err = TransportError::Io(err);
                        let _ = state_tx.send(TransportState::Failed(transport_err.to_string()));
                        let _ = reader_tx.send(Err(transport_err)).await;
                        break;
                    }
                }
            }
        }));

        self.stderr_task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::info!(target: "mcp_endpoint_rt::stdio_stderr", "{line}");
            }
        }));

        self.stdin = Some(stdin);
        self.child = Some(child);
        self.set_state(TransportState::Connected);
        Ok(())
    }

    async fn stop(&mut self) -> TransportResult<()> {
        if self.state == TransportState::Disconnected {
            return Ok(());
        }
        if let Some(handle) = self.reader_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.stderr_task.take() {
            handle.abort();
        }
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
        self.message_tx = None;
        self.set_state(TransportState::Disconnected);
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage, timeout: Option<Duration>) -> TransportResult<()> {
        let mut encoded = validate(message, self.config.max_message_size)?;
        encoded.push(b'\n');

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| TransportError::InvalidState("transport not started".to_string()))?;

        let write = stdin.write_all(&encoded);
        match timeout {
            Some(duration) => tokio::time::timeout(duration, write)
                .await
                .map_err(|_| TransportError::Timeout(duration))??,
            None => write.await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::RequestId;
    use serde_json::json;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn round_trips_a_line_through_a_cat_child() {
        let config = StdioTransportConfig::new("cat", vec![]);
        let mut transport = StdioTransport::new(config);
        transport.start().await.unwrap();
        assert_eq!(transport.state(), TransportState::Connected);

        let mut stream = transport.take_messages();
        let msg = JsonRpcMessage::request(RequestId::new_string("x"), "ping", Some(json!({})));
        transport.send(&msg, None).await.unwrap();

        let echoed = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(echoed, msg);

        transport.stop().await.unwrap();
        assert_eq!(transport.state(), TransportState::Disconnected);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let config = StdioTransportConfig::new("cat", vec![]);
        let mut transport = StdioTransport::new(config);
        transport.start().await.unwrap();
        transport.stop().await.unwrap();
        transport.stop().await.unwrap();
        assert_eq!(transport.state(), TransportState::Disconnected);
    }

    #[tokio::test]
    async fn oversize_message_is_rejected_locally() {
        let mut config = StdioTransportConfig::new("cat", vec![]);
        config.max_message_size = 10;
        let mut transport = StdioTransport::new(config);
        transport.start().await.unwrap();

        let msg = JsonRpcMessage::request(RequestId::new_string("x"), "ping", Some(json!({})));
        let err = transport.send(&msg, None).await.unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge { .. }));

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn failed_spawn_transitions_to_failed_state() {
        let config = StdioTransportConfig::new("definitely-not-a-real-binary-xyz", vec![]);
        let mut transport = StdioTransport::new(config);
        assert!(transport.start().await.is_err());
        assert!(matches!(transport.state(), TransportState::Failed(_)));
    }
}
