//! SSE + HTTP transport (component E): a long-lived GET against `sse_url`
//! feeds the incremental SSE parser (component B); short-lived POSTs
//! against a `post_url` carry outbound traffic. `post_url` may be known up
//! front or discovered from an `event: endpoint` frame, per §4.5.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use url::Url;

use super::{message_channel, validate, MessageStream, RetryPolicy, Transport, TransportError, TransportResult, TransportState};
use crate::jsonrpc::{JsonRpcMessage, DEFAULT_MAX_MESSAGE_SIZE};
use crate::sse::{SseEvent, SseParser};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Name of the server-issued session header (§6, HTTP collaborator
/// contract), echoed back on every subsequent GET/POST once observed.
const SESSION_HEADER: &str = "Mcp-Session-Id";

#[derive(Debug, Clone)]
pub struct SseHttpConfig {
    pub sse_url: Url,
    /// Known up front for deployments that don't use endpoint discovery.
    pub post_url: Option<Url>,
    pub headers: Vec<(String, String)>,
    pub max_message_size: usize,
    pub retry: RetryPolicy,
    pub max_reconnect_attempts: u32,
    /// HTTP request timeout applied to outbound POSTs (`requestTimeout`).
    /// Not applied to the long-lived SSE GET, which is expected to stay
    /// open indefinitely.
    pub request_timeout: Duration,
    /// Bound on reading a single HTTP response body (`responseTimeout`),
    /// applied to a POST's own in-band streamed reply.
    pub response_timeout: Duration,
    /// TLS certificate verification toggle (`validateCertificates`).
    pub validate_certificates: bool,
    /// Whether the read loop reconnects after a recoverable error
    /// (`autoResumeStreams`); when `false`, the first error is terminal.
    pub auto_resume_streams: bool,
    /// Cap on concurrently open event streams per transport
    /// (`maxSimultaneousStreams`): the main SSE GET plus any in-band
    /// `text/event-stream` POST replies.
    pub max_simultaneous_streams: usize,
}

impl SseHttpConfig {
    pub fn new(sse_url: Url) -> Self {
        Self {
            sse_url,
            post_url: None,
            headers: Vec::new(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            retry: RetryPolicy::default(),
            max_reconnect_attempts: 5,
            request_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(30),
            validate_certificates: true,
            auto_resume_streams: true,
            max_simultaneous_streams: 4,
        }
    }

    fn build_client(&self) -> TransportResult<Client> {
        Client::builder()
            .danger_accept_invalid_certs(!self.validate_certificates)
            .build()
            .map_err(|e| TransportError::ConnectionFailed(format!("failed to build HTTP client: {e}")))
    }
}

struct Shared {
    post_url: Mutex<Option<Url>>,
    outbound_queue: Mutex<VecDeque<JsonRpcMessage>>,
    last_event_id: Mutex<Option<String>>,
    /// Server-issued `Mcp-Session-Id`, once observed on any response,
    /// echoed as a request header on every subsequent GET/POST.
    session_id: Mutex<Option<String>>,
    streams: Semaphore,
}

pub struct SseHttpTransport {
    config: SseHttpConfig,
    client: Client,
    state: TransportState,
    state_tx: watch::Sender<TransportState>,
    message_tx: Option<mpsc::Sender<TransportResult<JsonRpcMessage>>>,
    message_rx: Option<MessageStream>,
    shared: Arc<Shared>,
    read_task: Option<tokio::task::JoinHandle<()>>,
    keepalive_task: Option<tokio::task::JoinHandle<()>>,
}

impl SseHttpTransport {
    pub fn new(config: SseHttpConfig) -> Self {
        let (state_tx, _) = watch::channel(TransportState::Disconnected);
        let shared = Arc::new(Shared {
            post_url: Mutex::new(config.post_url.clone()),
            outbound_queue: Mutex::new(VecDeque::new()),
            last_event_id: Mutex::new(None),
            session_id: Mutex::new(None),
            streams: Semaphore::new(config.max_simultaneous_streams.max(1)),
        });
        let client = config.build_client().unwrap_or_else(|_| Client::new());
        Self {
            client,
            config,
            state: TransportState::Disconnected,
            state_tx,
            message_tx: None,
            message_rx: None,
            shared,
            read_task: None,
            keepalive_task: None,
        }
    }

    /// Record a server-issued `Mcp-Session-Id` response header, if present,
    /// so it is echoed on every subsequent GET/POST for the lifetime of
    /// this transport.
    async fn capture_session_id(shared: &Shared, response: &reqwest::Response) {
        if let Some(value) = response.headers().get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
            *shared.session_id.lock().await = Some(value.to_string());
        }
    }

    /// Attach the configured headers plus the current session id (if any)
    /// onto a request builder.
    async fn apply_headers(
        mut builder: reqwest::RequestBuilder,
        headers: &[(String, String)],
        shared: &Shared,
    ) -> reqwest::RequestBuilder {
        for (key, value) in headers {
            builder = builder.header(key, value);
        }
        if let Some(session_id) = shared.session_id.lock().await.clone() {
            builder = builder.header(SESSION_HEADER, session_id);
        }
        builder
    }

    fn set_state(&mut self, state: TransportState) {
        self.state = state.clone();
        let _ = self.state_tx.send(state);
    }

    /// Resolve an `event: endpoint` frame's relative URL against `sse_url`,
    /// rejecting a scheme mismatch.
    fn resolve_post_url(base: &Url, relative: &str) -> TransportResult<Url> {
        let resolved = base
            .join(relative)
            .map_err(|e| TransportError::InvalidMessage(format!("invalid endpoint URL: {e}")))?;
        if resolved.scheme() != base.scheme() {
            return Err(TransportError::InvalidUrlScheme(format!(
                "endpoint scheme {} does not match SSE scheme {}",
                resolved.scheme(),
                base.scheme()
            )));
        }
        Ok(resolved)
    }

    #[allow(clippy::too_many_arguments)]
    async fn post_message(
        client: &Client,
        post_url: &Url,
        headers: &[(String, String)],
        shared: &Arc<Shared>,
        message: &JsonRpcMessage,
        max_size: usize,
        request_timeout: Duration,
        response_timeout: Duration,
        message_tx: &mpsc::Sender<TransportResult<JsonRpcMessage>>,
    ) -> TransportResult<()> {
        let _ = validate(message, max_size)?;
        let mut builder = client
            .post(post_url.clone())
            .timeout(request_timeout)
            .header("Content-Type", "application/json")
            .json(message);
        builder = Self::apply_headers(builder, headers, shared).await;

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::OperationFailed(format!("POST failed: {e}")))?;
        Self::capture_session_id(shared, &response).await;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TransportError::OperationFailed(
                "session expired (404 on postURL)".to_string(),
            ));
        }
        if status == StatusCode::ACCEPTED {
            return Ok(());
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("application/json") {
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| TransportError::InvalidMessage(e.to_string()))?;
            for message in decode_json_or_batch(body)? {
                let _ = message_tx.send(Ok(message)).await;
            }
            return Ok(());
        }

        if content_type.starts_with("text/event-stream") {
            let _permit = shared
                .streams
                .acquire()
                .await
                .map_err(|e| TransportError::OperationFailed(format!("stream semaphore closed: {e}")))?;
            let mut parser = SseParser::new();
            let mut stream = response.bytes_stream();
            let mut leftover = String::new();
            loop {
                let next = tokio::time::timeout(response_timeout, stream.next())
                    .await
                    .map_err(|_| TransportError::Timeout(response_timeout))?;
                let Some(chunk) = next else { break };
                let chunk = chunk.map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
                leftover.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = leftover.find('\n') {
                    let line = leftover[..pos].trim_end_matches('\r').to_string();
                    leftover.drain(..=pos);
                    if let Some(event) = parser.feed_line(&line) {
                        if event.event_type == "message" {
                            if let Ok(value) = serde_json::from_str(&event.data) {
                                for message in decode_json_or_batch(value)? {
                                    let _ = message_tx.send(Ok(message)).await;
                                }
                            }
                        }
                    }
                }
            }
            return Ok(());
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn drain_queue(
        client: Client,
        shared: Arc<Shared>,
        post_url: Url,
        headers: Vec<(String, String)>,
        max_size: usize,
        request_timeout: Duration,
        response_timeout: Duration,
        message_tx: mpsc::Sender<TransportResult<JsonRpcMessage>>,
    ) {
        loop {
            let next = shared.outbound_queue.lock().await.pop_front();
            let Some(message) = next else { break };
            if let Err(err) = Self::post_message(
                &client,
                &post_url,
                &headers,
                &shared,
                &message,
                max_size,
                request_timeout,
                response_timeout,
                &message_tx,
            )
            .await
            {
                tracing::warn!(error = %err, "failed to drain queued outbound SSE message");
            }
        }
    }
}

fn decode_json_or_batch(value: serde_json::Value) -> TransportResult<Vec<JsonRpcMessage>> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item)
                    .map_err(|e| TransportError::InvalidMessage(e.to_string()))
            })
            .collect(),
        single => {
            let message = serde_json::from_value(single)
                .map_err(|e| TransportError::InvalidMessage(e.to_string()))?;
            Ok(vec![message])
        }
    }
}

#[async_trait]
impl Transport for SseHttpTransport {
    fn state(&self) -> TransportState {
        self.state.clone()
    }

    fn state_stream(&self) -> watch::Receiver<TransportState> {
        self.state_tx.subscribe()
    }

    fn take_messages(&mut self) -> MessageStream {
        self.message_rx.take().unwrap_or_else(super::empty_messages)
    }

    fn is_retryable(&self) -> bool {
        true
    }

    async fn start(&mut self) -> TransportResult<()> {
        self.set_state(TransportState::Connecting);

        let (tx, stream) = message_channel(64);
        self.message_rx = Some(stream);
        self.message_tx = Some(tx.clone());

        let client = self.client.clone();
        let sse_url = self.config.sse_url.clone();
        let headers = self.config.headers.clone();
        let max_reconnects = self.config.max_reconnect_attempts;
        let retry = self.config.retry.clone();
        let shared = self.shared.clone();
        let max_size = self.config.max_message_size;
        let request_timeout = self.config.request_timeout;
        let response_timeout = self.config.response_timeout;
        let auto_resume_streams = self.config.auto_resume_streams;
        let state_tx = self.state_tx.clone();
        let message_tx = tx;

        self.read_task = Some(tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                match run_read_loop(
                    &client,
                    &sse_url,
                    &headers,
                    &shared,
                    &message_tx,
                    &state_tx,
                    max_size,
                    request_timeout,
                    response_timeout,
                )
                .await
                {
                    Ok(()) => break,
                    Err(err) if !auto_resume_streams || attempt >= max_reconnects => {
                        let _ = state_tx.send(TransportState::Failed(err.to_string()));
                        let _ = message_tx.send(Err(err)).await;
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, attempt, "SSE read loop error, reconnecting");
                        let _ = state_tx.send(TransportState::Connecting);
                        attempt += 1;
                        tokio::time::sleep(retry.delay_for(attempt)).await;
                    }
                }
            }
        }));

        let state_tx_keepalive = self.state_tx.clone();
        self.keepalive_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(KEEPALIVE_INTERVAL);
            loop {
                ticker.tick().await;
                if state_tx_keepalive.borrow().clone() != TransportState::Connected {
                    break;
                }
                tracing::trace!("SSE keepalive tick");
            }
        }));

        // If the postURL is already known, this transport is immediately
        // usable; endpoint discovery otherwise flips it to Connected once
        // the `endpoint` event arrives.
        if self.config.post_url.is_some() {
            self.set_state(TransportState::Connected);
        }

        Ok(())
    }

    async fn stop(&mut self) -> TransportResult<()> {
        if self.state == TransportState::Disconnected {
            return Ok(());
        }
        if let Some(handle) = self.read_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.keepalive_task.take() {
            handle.abort();
        }
        self.message_tx = None;
        self.set_state(TransportState::Disconnected);
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage, timeout: Option<Duration>) -> TransportResult<()> {
        let _ = validate(message, self.config.max_message_size)?;

        let post_url = self.shared.post_url.lock().await.clone();
        let Some(post_url) = post_url else {
            self.shared.outbound_queue.lock().await.push_back(message.clone());
            return Ok(());
        };

        let message_tx = self
            .message_tx
            .clone()
            .ok_or_else(|| TransportError::InvalidState("transport not started".to_string()))?;

        let send_fut = Self::post_message(
            &self.client,
            &post_url,
            &self.config.headers,
            &self.shared,
            message,
            self.config.max_message_size,
            self.config.request_timeout,
            self.config.response_timeout,
            &message_tx,
        );

        match timeout {
            Some(duration) => tokio::time::timeout(duration, send_fut)
                .await
                .map_err(|_| TransportError::Timeout(duration))??,
            None => send_fut.await?,
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_read_loop(
    client: &Client,
    sse_url: &Url,
    headers: &[(String, String)],
    shared: &Arc<Shared>,
    message_tx: &mpsc::Sender<TransportResult<JsonRpcMessage>>,
    state_tx: &watch::Sender<TransportState>,
    max_size: usize,
    request_timeout: Duration,
    response_timeout: Duration,
) -> TransportResult<()> {
    let last_event_id = shared.last_event_id.lock().await.clone();
    let mut builder = client.get(sse_url.clone()).header("Accept", "text/event-stream");
    builder = SseHttpTransport::apply_headers(builder, headers, shared).await;
    if let Some(id) = &last_event_id {
        builder = builder.header("Last-Event-ID", id);
    }

    let _permit = shared
        .streams
        .acquire()
        .await
        .map_err(|e| TransportError::OperationFailed(format!("stream semaphore closed: {e}")))?;

    let response = builder
        .send()
        .await
        .map_err(|e| TransportError::ConnectionFailed(format!("SSE GET failed: {e}")))?;
    SseHttpTransport::capture_session_id(shared, &response).await;

    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return Err(TransportError::NotSupported(
            "server does not support SSE (405)".to_string(),
        ));
    }
    if !response.status().is_success() {
        return Err(TransportError::ConnectionFailed(format!(
            "SSE GET returned {}",
            response.status()
        )));
    }
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("text/event-stream") {
        return Err(TransportError::InvalidMessage(format!(
            "expected text/event-stream, got {content_type}"
        )));
    }

    let mut parser = SseParser::new();
    let mut stream = response.bytes_stream();
    let mut leftover = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        leftover.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(pos) = leftover.find('\n') {
            let line = leftover[..pos].trim_end_matches('\r').to_string();
            leftover.drain(..=pos);
            if let Some(event) = parser.feed_line(&line) {
                handle_event(
                    event,
                    sse_url,
                    shared,
                    message_tx,
                    state_tx,
                    client,
                    headers,
                    max_size,
                    request_timeout,
                    response_timeout,
                )
                .await?;
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_event(
    event: SseEvent,
    sse_url: &Url,
    shared: &Arc<Shared>,
    message_tx: &mpsc::Sender<TransportResult<JsonRpcMessage>>,
    state_tx: &watch::Sender<TransportState>,
    client: &Client,
    headers: &[(String, String)],
    max_size: usize,
    request_timeout: Duration,
    response_timeout: Duration,
) -> TransportResult<()> {
    if let Some(id) = &event.id {
        *shared.last_event_id.lock().await = Some(id.clone());
    }

    match event.event_type.as_str() {
        "endpoint" => {
            let resolved = SseHttpTransport::resolve_post_url(sse_url, event.data.trim())?;
            *shared.post_url.lock().await = Some(resolved.clone());
            let _ = state_tx.send(TransportState::Connected);
            tokio::spawn(SseHttpTransport::drain_queue(
                client.clone(),
                shared.clone(),
                resolved,
                headers.to_vec(),
                max_size,
                request_timeout,
                response_timeout,
                message_tx.clone(),
            ));
        }
        "message" => {
            let value: serde_json::Value = serde_json::from_str(&event.data)
                .map_err(|e| TransportError::InvalidMessage(e.to_string()))?;
            for message in decode_json_or_batch(value)? {
                let _ = message_tx.send(Ok(message)).await;
            }
        }
        "ping" => {
            let builder = SseHttpTransport::apply_headers(client.get(sse_url.clone()), headers, shared).await;
            let _ = builder.send().await;
        }
        other => {
            tracing::debug!(event_type = other, "ignoring unknown SSE event type");
        }
    }
    Ok(())
}
