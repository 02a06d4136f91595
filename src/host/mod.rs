//! Host supervisor (component H): owns multiple endpoints by string id,
//! fans out `*/list_changed` notifications into the owning connection's
//! cache refresh, and exposes a single unified event stream across every
//! connection (§4.8).
//!
//! The host never owns an endpoint cyclically (§9, "Cyclic references"):
//! each [`ConnectionRecord`] holds the one live [`Endpoint`] it supervises,
//! and the two background tasks that watch it — notification routing and
//! state-change fan-out — are owned by the host and aborted on
//! `disconnect`, rather than the endpoint holding a reference back.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::endpoint::{Endpoint, EndpointEvent, EndpointState, McpNotification, SamplingHandler};
use crate::jsonrpc::ProtocolVersion;
use crate::mcp::methods::{Prompt, ResourceDescriptor, Tool};
use crate::mcp::{ServerCapabilities, ServerInfo};
use crate::subscriber::SubscriberStream;
use crate::transport::Transport;

pub type ConnectionId = String;

/// A single capability gate used to filter connections, mirroring the
/// endpoint's own [`crate::mcp::CapabilityGate`] but expressed per-server
/// rather than per-method (§4.8, `connectionsSupporting`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Tools,
    Resources,
    ResourceSubscribe,
    Prompts,
    Logging,
    Completions,
}

impl Feature {
    fn supported_by(self, capabilities: &ServerCapabilities, version: &ProtocolVersion) -> bool {
        match self {
            Feature::Tools => capabilities.has_tools(),
            Feature::Resources => capabilities.has_resources(),
            Feature::ResourceSubscribe => capabilities.supports_resource_subscribe(),
            Feature::Prompts => capabilities.has_prompts(),
            Feature::Logging => capabilities.has_logging(),
            Feature::Completions => version.supports_completions(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("connection already exists: {0}")]
    AlreadyConnected(ConnectionId),
    #[error("no such connection: {0}")]
    NotFound(ConnectionId),
    #[error("endpoint did not reach Running after start (state: {0})")]
    FailedToStart(String),
    #[error(transparent)]
    Endpoint(#[from] crate::error::EndpointError),
}

pub type Result<T> = std::result::Result<T, HostError>;

/// Emitted on the host's unified event stream (§4.8).
#[derive(Debug, Clone)]
pub enum HostEvent {
    ConnectionAdded(ConnectionId),
    ConnectionRemoved(ConnectionId),
    ConnectionStateChanged {
        id: ConnectionId,
        state: EndpointState,
    },
    /// A notification not specially routed by the host (anything other
    /// than `*/list_changed`), forwarded unchanged alongside the
    /// connection it arrived on.
    Notification {
        id: ConnectionId,
        notification: McpNotification,
    },
}

#[derive(Default)]
struct RefreshFlags {
    tools: AtomicBool,
    resources: AtomicBool,
    prompts: AtomicBool,
}

/// One supervised connection (§3, "ConnectionRecord").
///
/// `server_info`, `capabilities`, and `negotiated_version` are copied out
/// of the `initialize` result at `connect` time and never change
/// afterward — `SessionInfo` is immutable for the lifetime of a `Running`
/// state. The list caches, `last_activity`, and `reconnect_count` do
/// mutate and are each shared via `Arc`, so cloning a `ConnectionRecord` out
/// of the host's map hands back a live view rather than a frozen snapshot.
#[derive(Clone)]
pub struct ConnectionRecord {
    id: ConnectionId,
    endpoint: Arc<Endpoint>,
    server_info: ServerInfo,
    capabilities: ServerCapabilities,
    negotiated_version: ProtocolVersion,
    tools: Arc<RwLock<Vec<Tool>>>,
    resources: Arc<RwLock<Vec<ResourceDescriptor>>>,
    prompts: Arc<RwLock<Vec<Prompt>>>,
    last_activity: Arc<StdMutex<Instant>>,
    reconnect_count: Arc<AtomicU32>,
    refreshing: Arc<RefreshFlags>,
}

impl ConnectionRecord {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn negotiated_version(&self) -> &ProtocolVersion {
        &self.negotiated_version
    }

    pub async fn tools(&self) -> Vec<Tool> {
        self.tools.read().await.clone()
    }

    pub async fn resources(&self) -> Vec<ResourceDescriptor> {
        self.resources.read().await.clone()
    }

    pub async fn prompts(&self) -> Vec<Prompt> {
        self.prompts.read().await.clone()
    }

    pub fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count.load(Ordering::SeqCst)
    }

    pub fn is_refreshing_tools(&self) -> bool {
        self.refreshing.tools.load(Ordering::SeqCst)
    }

    pub fn is_refreshing_resources(&self) -> bool {
        self.refreshing.resources.load(Ordering::SeqCst)
    }

    pub fn is_refreshing_prompts(&self) -> bool {
        self.refreshing.prompts.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        if let Ok(mut guard) = self.last_activity.lock() {
            *guard = Instant::now();
        }
    }

    /// Issue `tools/list`, store the result, and update `lastActivity`.
    /// Failure is logged and leaves the cache unchanged; the refreshing
    /// flag is cleared on every exit path (§4.8, "ConnectionRecord
    /// refresh"). A no-op when the server never advertised `tools`.
    pub async fn refresh_tools(&self) {
        if !self.capabilities.has_tools() {
            return;
        }
        self.refreshing.tools.store(true, Ordering::SeqCst);
        match self.endpoint.list_tools(None).await {
            Ok(result) => {
                *self.tools.write().await = result.tools;
                self.touch();
            }
            Err(err) => {
                tracing::warn!(connection = %self.id, error = %err, "tools/list refresh failed");
            }
        }
        self.refreshing.tools.store(false, Ordering::SeqCst);
    }

    pub async fn refresh_resources(&self) {
        if !self.capabilities.has_resources() {
            return;
        }
        self.refreshing.resources.store(true, Ordering::SeqCst);
        match self.endpoint.list_resources(None).await {
            Ok(result) => {
                *self.resources.write().await = result.resources;
                self.touch();
            }
            Err(err) => {
                tracing::warn!(connection = %self.id, error = %err, "resources/list refresh failed");
            }
        }
        self.refreshing.resources.store(false, Ordering::SeqCst);
    }

    pub async fn refresh_prompts(&self) {
        if !self.capabilities.has_prompts() {
            return;
        }
        self.refreshing.prompts.store(true, Ordering::SeqCst);
        match self.endpoint.list_prompts(None).await {
            Ok(result) => {
                *self.prompts.write().await = result.prompts;
                self.touch();
            }
            Err(err) => {
                tracing::warn!(connection = %self.id, error = %err, "prompts/list refresh failed");
            }
        }
        self.refreshing.prompts.store(false, Ordering::SeqCst);
    }
}

/// Routes one connection's notification stream: `*/list_changed` triggers
/// the corresponding cache refresh, everything else (including
/// `resources/updated`, which names one resource rather than a list) is
/// forwarded unchanged on the host's event stream (§4.8).
async fn route_notifications(
    record: ConnectionRecord,
    mut stream: SubscriberStream<McpNotification>,
    events: broadcast::Sender<HostEvent>,
) {
    use futures::StreamExt;

    while let Some(item) = stream.next().await {
        match item {
            Ok(McpNotification::ToolsListChanged) => record.refresh_tools().await,
            Ok(McpNotification::ResourcesListChanged) => record.refresh_resources().await,
            Ok(McpNotification::PromptsListChanged) => record.refresh_prompts().await,
            Ok(other) => {
                record.touch();
                let _ = events.send(HostEvent::Notification {
                    id: record.id.clone(),
                    notification: other,
                });
            }
            Err(lagged) => {
                tracing::warn!(
                    connection = %record.id,
                    skipped = lagged.skipped,
                    "host notification subscriber lagged; dropping"
                );
                break;
            }
        }
    }
}

/// Forwards one connection's state transitions onto the host's event
/// stream, and treats a transition into `Running` (reconnection included)
/// as activity.
async fn route_state_changes(
    record: ConnectionRecord,
    mut stream: SubscriberStream<EndpointEvent>,
    events: broadcast::Sender<HostEvent>,
) {
    use futures::StreamExt;

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                if event.state.is_running() {
                    record.touch();
                }
                let _ = events.send(HostEvent::ConnectionStateChanged {
                    id: record.id.clone(),
                    state: event.state,
                });
            }
            Err(lagged) => {
                tracing::warn!(
                    connection = %record.id,
                    skipped = lagged.skipped,
                    "host state subscriber lagged; dropping"
                );
                break;
            }
        }
    }
}

/// Supervises a fleet of [`Endpoint`]s, keyed by an application-chosen
/// string id (§4.8).
pub struct Host {
    config: ClientConfig,
    connections: Arc<DashMap<ConnectionId, ConnectionRecord>>,
    tasks: Arc<DashMap<ConnectionId, Vec<JoinHandle<()>>>>,
    events: broadcast::Sender<HostEvent>,
    sampling_handler: RwLock<Option<Arc<dyn SamplingHandler>>>,
}

impl Host {
    pub fn new(config: ClientConfig) -> Self {
        let (events, _) = broadcast::channel(config.subscriber_buffer);
        Self {
            config,
            connections: Arc::new(DashMap::new()),
            tasks: Arc::new(DashMap::new()),
            events,
            sampling_handler: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Unified event stream: connection lifecycle plus forwarded
    /// notifications, across every supervised connection.
    pub fn events(&self) -> SubscriberStream<HostEvent> {
        SubscriberStream::new(self.events.subscribe())
    }

    /// Install the host-scoped callback backing `sampling/createMessage`.
    /// Applied to every endpoint created by a subsequent `connect` call;
    /// does not retroactively affect already-connected endpoints.
    pub async fn set_sampling_handler(&self, handler: Arc<dyn SamplingHandler>) {
        *self.sampling_handler.write().await = Some(handler);
    }

    /// Bring a new connection up: reject if `id` already exists, build a
    /// fresh endpoint from the host's client config, install any
    /// host-scoped request handlers, `start` it over `transport`, and
    /// require the resulting state is `Running` (§4.8).
    pub async fn connect(&self, id: impl Into<String>, transport: Box<dyn Transport>) -> Result<ConnectionRecord> {
        let id: ConnectionId = id.into();
        if self.connections.contains_key(&id) {
            return Err(HostError::AlreadyConnected(id));
        }

        let endpoint = Arc::new(Endpoint::new(self.config.clone()));
        if let Some(handler) = self.sampling_handler.read().await.clone() {
            endpoint.set_sampling_handler(handler).await;
        }

        endpoint.start(transport).await?;
        let session = match endpoint.state().await {
            EndpointState::Running(session) => session,
            other => {
                let _ = endpoint.stop(true).await;
                return Err(HostError::FailedToStart(other.label().to_string()));
            }
        };

        let record = ConnectionRecord {
            id: id.clone(),
            endpoint: endpoint.clone(),
            server_info: session.initialize_result.server_info.clone(),
            capabilities: session.server_capabilities().clone(),
            negotiated_version: session.negotiated_version.clone(),
            tools: Arc::new(RwLock::new(Vec::new())),
            resources: Arc::new(RwLock::new(Vec::new())),
            prompts: Arc::new(RwLock::new(Vec::new())),
            last_activity: Arc::new(StdMutex::new(Instant::now())),
            reconnect_count: Arc::new(AtomicU32::new(0)),
            refreshing: Arc::new(RefreshFlags::default()),
        };

        let notification_task = tokio::spawn(route_notifications(
            record.clone(),
            endpoint.notifications(),
            self.events.clone(),
        ));
        let state_task = tokio::spawn(route_state_changes(record.clone(), endpoint.state_stream(), self.events.clone()));
        self.tasks.insert(id.clone(), vec![notification_task, state_task]);
        self.connections.insert(id.clone(), record.clone());

        let _ = self.events.send(HostEvent::ConnectionAdded(id));
        Ok(record)
    }

    /// Stop the endpoint, cancel its subscriber tasks, remove the record,
    /// and emit `connectionRemoved` (§4.8).
    pub async fn disconnect(&self, id: &str) -> Result<()> {
        let (_, record) = self
            .connections
            .remove(id)
            .ok_or_else(|| HostError::NotFound(id.to_string()))?;

        if let Some((_, handles)) = self.tasks.remove(id) {
            for handle in handles {
                handle.abort();
            }
        }

        record.endpoint.stop(true).await?;
        let _ = self.events.send(HostEvent::ConnectionRemoved(id.to_string()));
        Ok(())
    }

    pub fn all_connections(&self) -> Vec<ConnectionRecord> {
        self.connections.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn connection(&self, id: &str) -> Option<ConnectionRecord> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    pub fn connections_supporting(&self, feature: Feature) -> Vec<ConnectionRecord> {
        self.connections
            .iter()
            .filter(|entry| feature.supported_by(&entry.value().capabilities, &entry.value().negotiated_version))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Connections whose `lastActivity` is at least `timeout` in the past.
    pub fn inactive_connections(&self, timeout: Duration) -> Vec<ConnectionRecord> {
        let now = Instant::now();
        self.connections
            .iter()
            .filter(|entry| now.duration_since(entry.value().last_activity()) >= timeout)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub async fn failed_connections(&self) -> Vec<ConnectionRecord> {
        let records: Vec<ConnectionRecord> = self.all_connections();
        let mut failed = Vec::new();
        for record in records {
            if record.endpoint.state().await.is_terminal_failure() {
                failed.push(record);
            }
        }
        failed
    }

    /// Union (by tool name) across every connection's cached tool list.
    pub async fn available_tools(&self) -> Vec<Tool> {
        let records: Vec<ConnectionRecord> = self.all_connections();
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for record in records {
            for tool in record.tools().await {
                if seen.insert(tool.name.clone()) {
                    merged.push(tool);
                }
            }
        }
        merged
    }

    /// Increment `reconnectCount` and delegate to the endpoint's `start`
    /// over a freshly supplied transport (§4.8, "Reconnection counter").
    /// The old transport cannot be redialed in place — a byte-framed duplex
    /// is consumed by `Transport::start` — so the caller supplies a new
    /// one, exactly as it did for the original `connect`.
    pub async fn reconnect(&self, id: &str, transport: Box<dyn Transport>) -> Result<()> {
        let record = self.connection(id).ok_or_else(|| HostError::NotFound(id.to_string()))?;
        record.reconnect_count.fetch_add(1, Ordering::SeqCst);
        record.endpoint.start(transport).await?;
        record.touch();
        Ok(())
    }
}
