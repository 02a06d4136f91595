//! The MCP endpoint (component F): a single bidirectional session over one
//! transport. Owns the state machine, the request/response multiplexer, the
//! message pump, and the server-initiated request handler registry.
//!
//! Constructed from a [`ClientConfig`] and started against a concrete
//! [`Transport`]; everything above a raw byte stream — session negotiation,
//! capability gating, progress, cancellation — lives here.

pub mod events;
pub mod handlers;
mod pump;
pub mod state;

pub use events::{EndpointEvent, McpNotification};
pub use handlers::{RequestHandler, SamplingHandler, SharedRequestHandler};
pub use state::{EndpointState, SessionInfo};

use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::{EndpointError, Result};
use crate::jsonrpc::{JsonRpcMessage, ProtocolVersion, RequestId};
use crate::mcp::methods::{
    CallToolParams, CallToolResult, CompleteArgument, CompleteParams, CompleteResult,
    GetPromptParams, GetPromptResult, InitializeParams, InitializeResult, ListPromptsParams,
    ListPromptsResult, ListResourceTemplatesParams, ListResourceTemplatesResult,
    ListResourcesParams, ListResourcesResult, ListToolsParams, ListToolsResult, PingResult,
    ReadResourceParams, ReadResourceResult, SetLevelParams, SubscribeResourceParams,
};
use crate::mcp::notifications::method as notif_method;
use crate::mcp::types::Root;
use crate::mcp::{CapabilityGate, LogLevel};
use crate::progress::{ProgressHandler, ProgressManager};
use crate::subscriber::SubscriberStream;
use crate::transport::{Transport, TransportError};

use handlers::{RootsListHandler, SamplingRequestHandler};
use pump::{inject_progress_token, ping_once, raw_send, run_message_pump, write_notification, Shared};

/// A single MCP session: session negotiation, the request/response
/// multiplexer, server→client dispatch, and the background health-check
/// task, all owned by one instance.
pub struct Endpoint {
    config: ClientConfig,
    shared: Shared,
    sampling_handler: RwLock<Option<Arc<dyn SamplingHandler>>>,
    pump_handle: Mutex<Option<JoinHandle<()>>>,
    health_handle: Mutex<Option<JoinHandle<()>>>,
    health_supervisor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Endpoint {
    pub fn new(config: ClientConfig) -> Self {
        let (state_events, _) = broadcast::channel(config.subscriber_buffer);
        let (notifications, _) = broadcast::channel(config.subscriber_buffer);
        let shared = Shared {
            pending: Arc::new(DashMap::new()),
            progress: ProgressManager::new(),
            notifications,
            handlers: Arc::new(DashMap::new()),
            roots: Arc::new(RwLock::new(Vec::new())),
            transport: Arc::new(Mutex::new(None)),
            state: Arc::new(RwLock::new(EndpointState::Disconnected)),
            state_events,
        };
        Self {
            config,
            shared,
            sampling_handler: RwLock::new(None),
            pump_handle: Mutex::new(None),
            health_handle: Mutex::new(None),
            health_supervisor_handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current lifecycle state, observed synchronously against the latest
    /// write.
    pub async fn state(&self) -> EndpointState {
        self.shared.state.read().await.clone()
    }

    /// Stream of every subsequent state transition (§9).
    pub fn state_stream(&self) -> SubscriberStream<EndpointEvent> {
        SubscriberStream::new(self.shared.state_events.subscribe())
    }

    /// Stream of server-originated notifications not already consumed
    /// internally (`notifications/cancelled`, `notifications/progress`).
    pub fn notifications(&self) -> SubscriberStream<McpNotification> {
        SubscriberStream::new(self.shared.notifications.subscribe())
    }

    /// Install (or replace) the callback backing `sampling/createMessage`.
    /// Takes effect immediately if the endpoint is currently running;
    /// otherwise it is installed the next time [`Endpoint::start`] runs.
    pub async fn set_sampling_handler(&self, handler: Arc<dyn SamplingHandler>) {
        *self.sampling_handler.write().await = Some(handler.clone());
        if self.state().await.is_running() {
            self.shared.handlers.insert(
                "sampling/createMessage".to_string(),
                Arc::new(SamplingRequestHandler { inner: handler }),
            );
        }
    }

    /// Register (or replace) an additional server→client handler, beyond
    /// the `roots/list` and `sampling/createMessage` defaults. Used by the
    /// host supervisor to install host-scoped handlers before `start`.
    pub fn register_handler(&self, method: impl Into<String>, handler: SharedRequestHandler) {
        self.shared.handlers.insert(method.into(), handler);
    }

    /// Replace the client's advertised root set. Emits
    /// `notifications/roots/list_changed` to the server only when the
    /// effective set actually changes (§4.6, "Roots updates").
    pub async fn set_roots(&self, roots: Vec<Root>) -> Result<()> {
        let changed = {
            let mut guard = self.shared.roots.write().await;
            let before: std::collections::HashSet<_> = guard.iter().cloned().collect();
            let after: std::collections::HashSet<_> = roots.iter().cloned().collect();
            let changed = before != after;
            *guard = roots;
            changed
        };
        if changed && self.state().await.is_running() {
            write_notification(&self.shared, notif_method::ROOTS_LIST_CHANGED, None).await?;
        }
        Ok(())
    }

    async fn set_state(&self, state: EndpointState) {
        let mut guard = self.shared.state.write().await;
        *guard = state.clone();
        drop(guard);
        let _ = self.shared.state_events.send(EndpointEvent { state });
    }

    /// Bring the endpoint up over `transport`: connect, spawn the message
    /// pump, perform the `initialize`/`notifications/initialized`
    /// handshake, and (if configured) start the health-check task.
    ///
    /// Calling `start` while already `Running`, `Connecting`, or
    /// `Initializing` implicitly stops the current session first, matching
    /// the behavior of every other lifecycle-mutating call in this crate.
    pub async fn start(&self, mut transport: Box<dyn Transport>) -> Result<()> {
        {
            let state = self.state().await;
            if matches!(
                state,
                EndpointState::Running(_) | EndpointState::Connecting | EndpointState::Initializing
            ) {
                self.stop(true).await?;
            }
        }

        self.set_state(EndpointState::Connecting).await;

        let connect_result = tokio::time::timeout(self.config.connect_timeout, transport.start()).await;
        match connect_result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.set_state(EndpointState::Failed(err.to_string())).await;
                return Err(err.into());
            }
            Err(_elapsed) => {
                let err = TransportError::Timeout(self.config.connect_timeout);
                self.set_state(EndpointState::Failed(err.to_string())).await;
                return Err(err.into());
            }
        }

        let message_stream = transport.take_messages();
        *self.shared.transport.lock().await = Some(transport);

        let pump_shared = self.shared.clone();
        let handle = tokio::spawn(run_message_pump(message_stream, pump_shared));
        *self.pump_handle.lock().await = Some(handle);

        self.set_state(EndpointState::Initializing).await;

        self.shared.handlers.insert(
            "roots/list".to_string(),
            Arc::new(RootsListHandler {
                roots: self.shared.roots.clone(),
            }),
        );
        if let Some(sampling) = self.sampling_handler.read().await.clone() {
            self.shared.handlers.insert(
                "sampling/createMessage".to_string(),
                Arc::new(SamplingRequestHandler { inner: sampling }),
            );
        }

        if let Err(err) = self.perform_handshake().await {
            self.set_state(EndpointState::Failed(err.to_string())).await;
            return Err(err);
        }

        if self.config.health_check_enabled {
            self.spawn_health_check().await;
        }

        Ok(())
    }

    async fn perform_handshake(&self) -> Result<()> {
        let params = InitializeParams::new(self.config.capabilities.clone(), self.config.client_info.clone());
        let value = raw_send(
            &self.shared,
            self.config.send_timeout,
            "initialize",
            Some(serde_json::to_value(&params)?),
        )
        .await?;
        let result: InitializeResult = serde_json::from_value(value)
            .map_err(|e| EndpointError::invalid_response("initialize", e.to_string()))?;

        let negotiated = ProtocolVersion::parse(result.protocol_version.clone())
            .map_err(|_| EndpointError::UnsupportedVersion(result.protocol_version.clone()))?;
        if !negotiated.is_supported() {
            return Err(EndpointError::UnsupportedVersion(negotiated.to_string()));
        }

        write_notification(&self.shared, notif_method::INITIALIZED, None).await?;

        self.set_state(EndpointState::Running(SessionInfo {
            negotiated_version: negotiated,
            initialize_result: result,
        }))
        .await;
        Ok(())
    }

    async fn spawn_health_check(&self) {
        let ping_shared = self.shared.clone();
        let send_timeout = self.config.send_timeout;
        let (mut events, ping_handle) = crate::transport::health::spawn(self.config.health_check_interval, move || {
            let shared = ping_shared.clone();
            async move { ping_once(&shared, send_timeout).await }
        });
        *self.health_handle.lock().await = Some(ping_handle);

        let supervisor_shared = self.shared.clone();
        let max_failures = self.config.max_reconnect_attempts;
        let supervisor = tokio::spawn(async move {
            let mut failures = 0u32;
            while let Some(event) = events.recv().await {
                match event {
                    crate::transport::HealthEvent::Ok => failures = 0,
                    crate::transport::HealthEvent::Failed => {
                        failures += 1;
                        if failures >= max_failures {
                            let mut guard = supervisor_shared.state.write().await;
                            if !matches!(*guard, EndpointState::Disconnected) {
                                *guard = EndpointState::Failed(format!(
                                    "health check failed {failures} consecutive times"
                                ));
                                let _ = supervisor_shared
                                    .state_events
                                    .send(EndpointEvent { state: guard.clone() });
                            }
                            drop(guard);
                            supervisor_shared.handlers.clear();
                            pump::drain_pending_with_connection_closed(&supervisor_shared.pending, &supervisor_shared.progress)
                                .await;
                            break;
                        }
                    }
                }
            }
        });
        *self.health_supervisor_handle.lock().await = Some(supervisor);
    }

    /// Tear the session down: cancel the pump and health-check tasks,
    /// optionally fail every pending request with `connectionClosed`, stop
    /// the transport, clear the handler registry, and set `Disconnected`.
    /// Idempotent.
    pub async fn stop(&self, cancel_pending: bool) -> Result<()> {
        if let Some(handle) = self.pump_handle.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.health_handle.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.health_supervisor_handle.lock().await.take() {
            handle.abort();
        }

        if cancel_pending {
            pump::drain_pending_with_connection_closed(&self.shared.pending, &self.shared.progress).await;
        }

        {
            let mut guard = self.shared.transport.lock().await;
            if let Some(transport) = guard.as_mut() {
                transport.stop().await?;
            }
            *guard = None;
        }

        self.shared.handlers.clear();
        self.set_state(EndpointState::Disconnected).await;
        Ok(())
    }

    /// Cancel an in-flight request: complete it locally with `Cancelled`
    /// and best-effort notify the server via `notifications/cancelled`.
    pub async fn cancel(&self, id: &RequestId, reason: Option<&str>) -> Result<()> {
        if let Some((_, entry)) = self.shared.pending.remove(id) {
            let _ = entry
                .sender
                .send(pump::PendingOutcome::Cancelled(reason.map(str::to_string)));
        }
        self.shared.progress.unregister(id);

        let params = crate::mcp::notifications::CancelledParams {
            request_id: id.clone(),
            reason: reason.map(str::to_string),
        };
        write_notification(&self.shared, notif_method::CANCELLED, Some(serde_json::to_value(params)?)).await?;
        Ok(())
    }

    async fn check_gate(&self, method: &str) -> Result<()> {
        let state = self.state().await;
        match state {
            EndpointState::Running(session) => CapabilityGate::for_method(method)
                .check(session.server_capabilities(), &session.negotiated_version)
                .map_err(EndpointError::CapabilityDenied),
            other => Err(EndpointError::invalid_state(other.label())),
        }
    }

    /// The generic send contract (§4.6): gate, allocate an id, optionally
    /// wire a progress handler, write the request, and await its terminal
    /// outcome bounded by `sendTimeout`.
    pub async fn send<P, R>(&self, method: &str, params: P, progress: Option<ProgressHandler>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.check_gate(method).await?;

        let mut params_value = serde_json::to_value(params)?;
        let id = RequestId::new_uuid();
        if let Some(handler) = progress {
            inject_progress_token(&mut params_value, &id);
            self.shared.progress.register(id.clone(), handler);
        }

        let value = self
            .send_with_id(id, method, Some(params_value))
            .await?;
        serde_json::from_value(value).map_err(|e| EndpointError::invalid_response(method, e.to_string()))
    }

    /// Identical to [`raw_send`] but reuses a caller-chosen id so that a
    /// progress handler can be registered against it before the request is
    /// written.
    async fn send_with_id(&self, id: RequestId, method: &str, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        use tokio::sync::oneshot;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id.clone(), pump::PendingEntry { sender: tx });

        let message = JsonRpcMessage::request(id.clone(), method, params);
        let send_result = {
            let mut guard = self.shared.transport.lock().await;
            match guard.as_mut() {
                Some(transport) => transport.send(&message, Some(self.config.send_timeout)).await,
                None => Err(TransportError::InvalidState("transport not connected".to_string())),
            }
        };
        if let Err(err) = send_result {
            self.shared.pending.remove(&id);
            self.shared.progress.unregister(&id);
            return Err(err.into());
        }

        let outcome = tokio::time::timeout(self.config.send_timeout, rx).await;
        self.shared.progress.unregister(&id);

        match outcome {
            Ok(Ok(pump::PendingOutcome::Response(value))) => Ok(value),
            Ok(Ok(pump::PendingOutcome::Error(err))) => Err(EndpointError::Protocol(err)),
            Ok(Ok(pump::PendingOutcome::Cancelled(reason))) => Err(EndpointError::cancelled(reason.as_deref())),
            Ok(Err(_recv_dropped)) => Err(EndpointError::ConnectionClosed),
            Err(_elapsed) => {
                self.shared.pending.remove(&id);
                Err(EndpointError::timeout(method))
            }
        }
    }

    // ---- typed convenience wrappers (§3) --------------------------------

    pub async fn ping(&self) -> Result<PingResult> {
        self.send("ping", serde_json::json!({}), None).await
    }

    pub async fn list_tools(&self, cursor: Option<String>) -> Result<ListToolsResult> {
        self.send("tools/list", ListToolsParams { cursor }, None).await
    }

    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<serde_json::Value>,
        progress: Option<ProgressHandler>,
    ) -> Result<CallToolResult> {
        self.send(
            "tools/call",
            CallToolParams {
                name: name.into(),
                arguments,
            },
            progress,
        )
        .await
    }

    pub async fn list_resources(&self, cursor: Option<String>) -> Result<ListResourcesResult> {
        self.send("resources/list", ListResourcesParams { cursor }, None).await
    }

    pub async fn list_resource_templates(&self, cursor: Option<String>) -> Result<ListResourceTemplatesResult> {
        self.send("resources/templates/list", ListResourceTemplatesParams { cursor }, None)
            .await
    }

    pub async fn read_resource(&self, uri: impl Into<String>) -> Result<ReadResourceResult> {
        self.send("resources/read", ReadResourceParams { uri: uri.into() }, None).await
    }

    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> Result<()> {
        let _: serde_json::Value = self
            .send("resources/subscribe", SubscribeResourceParams { uri: uri.into() }, None)
            .await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> Result<()> {
        let _: serde_json::Value = self
            .send("resources/unsubscribe", SubscribeResourceParams { uri: uri.into() }, None)
            .await?;
        Ok(())
    }

    pub async fn list_prompts(&self, cursor: Option<String>) -> Result<ListPromptsResult> {
        self.send("prompts/list", ListPromptsParams { cursor }, None).await
    }

    pub async fn get_prompt(&self, name: impl Into<String>, arguments: Option<serde_json::Value>) -> Result<GetPromptResult> {
        self.send(
            "prompts/get",
            GetPromptParams {
                name: name.into(),
                arguments,
            },
            None,
        )
        .await
    }

    pub async fn set_log_level(&self, level: LogLevel) -> Result<()> {
        let _: serde_json::Value = self.send("logging/setLevel", SetLevelParams { level }, None).await?;
        Ok(())
    }

    pub async fn complete(&self, reference: serde_json::Value, argument: CompleteArgument) -> Result<CompleteResult> {
        self.send("completion/complete", CompleteParams { reference, argument }, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_endpoint_starts_disconnected() {
        let endpoint = Endpoint::new(ClientConfig::default());
        assert_eq!(endpoint.state().await, EndpointState::Disconnected);
    }

    #[tokio::test]
    async fn send_before_start_is_invalid_state() {
        let endpoint = Endpoint::new(ClientConfig::default());
        let err = endpoint.ping().await.unwrap_err();
        assert!(matches!(err, EndpointError::InvalidState(_)));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let endpoint = Endpoint::new(ClientConfig::default());
        endpoint.stop(true).await.unwrap();
        assert_eq!(endpoint.state().await, EndpointState::Disconnected);
    }
}
