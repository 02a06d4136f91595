//! The request/response multiplexer and inbound message pump (§4.6).
//!
//! `Shared` is the set of fields the endpoint and its two background tasks
//! (message pump, health check) all need concurrent access to. Splitting it
//! out of [`super::Endpoint`] lets both tasks be spawned as plain `'static`
//! futures without borrowing `self`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot, Mutex, RwLock};

use crate::error::EndpointError;
use crate::jsonrpc::{JsonRpcError, JsonRpcMessage, RequestId};
use crate::mcp::notifications::{method, CancelledParams, LogMessageParams, ProgressParams, ResourcesUpdatedParams};
use crate::progress::{ProgressManager, ProgressUpdate};
use crate::transport::{MessageStream, Transport, TransportResult};

use super::events::{EndpointEvent, McpNotification};
use super::handlers::SharedRequestHandler;
use super::state::EndpointState;

/// An in-flight outbound request, keyed by its `RequestId` in
/// [`Shared::pending`].
pub(super) struct PendingEntry {
    pub(super) sender: oneshot::Sender<PendingOutcome>,
}

/// Terminal outcome of one outbound request, handed back through the
/// `oneshot` registered at `send` time.
pub(super) enum PendingOutcome {
    Response(Value),
    Error(JsonRpcError),
    Cancelled(Option<String>),
}

#[derive(Clone)]
pub(super) struct Shared {
    pub(super) pending: Arc<DashMap<RequestId, PendingEntry>>,
    pub(super) progress: ProgressManager,
    pub(super) notifications: broadcast::Sender<McpNotification>,
    pub(super) handlers: Arc<DashMap<String, SharedRequestHandler>>,
    pub(super) roots: Arc<RwLock<Vec<crate::mcp::types::Root>>>,
    pub(super) transport: Arc<Mutex<Option<Box<dyn Transport>>>>,
    pub(super) state: Arc<RwLock<EndpointState>>,
    pub(super) state_events: broadcast::Sender<EndpointEvent>,
}

/// Merge `{"_meta": {"progressToken": id}}` into `params`, creating the
/// object if `params` is null (§4.7, step 4 of the send contract).
pub(super) fn inject_progress_token(params: &mut Value, id: &RequestId) {
    if !params.is_object() {
        *params = Value::Object(serde_json::Map::new());
    }
    let obj = params
        .as_object_mut()
        .expect("just normalized params to an object");
    let meta = obj
        .entry("_meta")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if !meta.is_object() {
        *meta = Value::Object(serde_json::Map::new());
    }
    if let Some(meta_obj) = meta.as_object_mut() {
        meta_obj.insert("progressToken".to_string(), serde_json::to_value(id).unwrap_or(Value::Null));
    }
}

/// Steps 5-8 of the send contract: register the pending entry, write the
/// request, and wait (bounded by `send_timeout`) for its terminal outcome.
/// Shared by the typed `Endpoint::send` and the untyped health-check ping.
pub(super) async fn raw_send(
    shared: &Shared,
    send_timeout: Duration,
    method: &str,
    params: Option<Value>,
) -> Result<Value, EndpointError> {
    let id = RequestId::new_uuid();
    let (tx, rx) = oneshot::channel();
    shared.pending.insert(id.clone(), PendingEntry { sender: tx });

    let message = JsonRpcMessage::request(id.clone(), method, params);
    let send_result = {
        let mut guard = shared.transport.lock().await;
        match guard.as_mut() {
            Some(transport) => transport.send(&message, Some(send_timeout)).await,
            None => Err(crate::transport::TransportError::InvalidState(
                "transport not connected".to_string(),
            )),
        }
    };

    if let Err(err) = send_result {
        shared.pending.remove(&id);
        shared.progress.unregister(&id);
        return Err(err.into());
    }

    let outcome = tokio::time::timeout(send_timeout, rx).await;
    shared.progress.unregister(&id);

    match outcome {
        Ok(Ok(PendingOutcome::Response(value))) => Ok(value),
        Ok(Ok(PendingOutcome::Error(err))) => Err(EndpointError::Protocol(err)),
        Ok(Ok(PendingOutcome::Cancelled(reason))) => Err(EndpointError::cancelled(reason.as_deref())),
        Ok(Err(_recv_dropped)) => Err(EndpointError::ConnectionClosed),
        Err(_elapsed) => {
            shared.pending.remove(&id);
            Err(EndpointError::timeout(method))
        }
    }
}

/// Complete every still-pending request with `connectionClosed`, used when
/// the transport fails or the endpoint is stopped with `cancelPending`.
pub(super) async fn drain_pending_with_connection_closed(pending: &DashMap<RequestId, PendingEntry>, progress: &ProgressManager) {
    let ids: Vec<RequestId> = pending.iter().map(|entry| entry.key().clone()).collect();
    for id in ids {
        if let Some((_, entry)) = pending.remove(&id) {
            let _ = entry.sender.send(PendingOutcome::Error(JsonRpcError::connection_closed()));
        }
        progress.unregister(&id);
    }
}

fn classify_notification(method: &str, params: Option<Value>) -> Option<McpNotification> {
    match method {
        method::INITIALIZED | method::CANCELLED | method::PROGRESS => None,
        method::ROOTS_LIST_CHANGED => Some(McpNotification::RootsListChanged),
        method::RESOURCES_LIST_CHANGED => Some(McpNotification::ResourcesListChanged),
        method::PROMPTS_LIST_CHANGED => Some(McpNotification::PromptsListChanged),
        method::TOOLS_LIST_CHANGED => Some(McpNotification::ToolsListChanged),
        method::RESOURCES_UPDATED => {
            let params: ResourcesUpdatedParams = serde_json::from_value(params?).ok()?;
            Some(McpNotification::ResourcesUpdated(params))
        }
        method::MESSAGE => {
            let params: LogMessageParams = serde_json::from_value(params?).ok()?;
            Some(McpNotification::Message(params))
        }
        other => Some(McpNotification::Other {
            method: other.to_string(),
            params,
        }),
    }
}

async fn reply(shared: &Shared, id: RequestId, outcome: Result<Value, JsonRpcError>) {
    let message = match outcome {
        Ok(value) => JsonRpcMessage::response(id, value),
        Err(err) => JsonRpcMessage::error(id, err),
    };
    let mut guard = shared.transport.lock().await;
    if let Some(transport) = guard.as_mut() {
        if let Err(err) = transport.send(&message, None).await {
            tracing::warn!(error = %err, "failed to write reply to a server-initiated request");
        }
    }
}

async fn handle_request(shared: &Shared, id: RequestId, method: String, params: Option<Value>) {
    let handler = shared.handlers.get(&method).map(|entry| entry.value().clone());
    let outcome = match handler {
        Some(handler) => handler.handle(params).await,
        None => Err(JsonRpcError::method_not_found(&method)),
    };
    reply(shared, id, outcome).await;
}

async fn handle_notification(shared: &Shared, method: String, params: Option<Value>) {
    match method.as_str() {
        method::CANCELLED => {
            let Some(params) = params else { return };
            let Ok(params): Result<CancelledParams, _> = serde_json::from_value(params) else {
                return;
            };
            if let Some((_, entry)) = shared.pending.remove(&params.request_id) {
                let _ = entry.sender.send(PendingOutcome::Cancelled(params.reason));
            }
            shared.progress.unregister(&params.request_id);
        }
        method::PROGRESS => {
            let Some(params) = params else { return };
            let Ok(params): Result<ProgressParams, _> = serde_json::from_value(params) else {
                return;
            };
            shared.progress.dispatch(
                &params.progress_token,
                ProgressUpdate {
                    progress: params.progress,
                    total: params.total,
                    message: params.message,
                },
            );
        }
        other => {
            if let Some(notification) = classify_notification(other, params) {
                let _ = shared.notifications.send(notification);
            }
        }
    }
}

async fn fail(shared: &Shared, reason: String) {
    {
        let mut state = shared.state.write().await;
        if !matches!(*state, EndpointState::Disconnected) {
            *state = EndpointState::Failed(reason);
            let _ = shared.state_events.send(EndpointEvent { state: state.clone() });
        }
    }
    shared.handlers.clear();
    drain_pending_with_connection_closed(&shared.pending, &shared.progress).await;
}

/// Consumes the transport's message stream for as long as the endpoint is
/// connected, dispatching each frame per §4.6. Runs until the stream ends
/// (transport closed, gracefully or not) or the task is aborted by `stop`.
pub(super) async fn run_message_pump(mut stream: MessageStream, shared: Shared) {
    use futures::StreamExt;

    loop {
        match stream.next().await {
            Some(Ok(JsonRpcMessage::Response(response))) => {
                match shared.pending.remove(&response.id) {
                    Some((_, entry)) => {
                        let _ = entry.sender.send(PendingOutcome::Response(response.result));
                    }
                    None => {
                        tracing::warn!(id = ?response.id, "dropping response with no pending request");
                    }
                }
                shared.progress.unregister(&response.id);
            }
            Some(Ok(JsonRpcMessage::Error(error))) => {
                match shared.pending.remove(&error.id) {
                    Some((_, entry)) => {
                        let _ = entry.sender.send(PendingOutcome::Error(error.error));
                    }
                    None => {
                        tracing::warn!(id = ?error.id, "dropping error response with no pending request");
                    }
                }
                shared.progress.unregister(&error.id);
            }
            Some(Ok(JsonRpcMessage::Notification(notification))) => {
                handle_notification(&shared, notification.method, notification.params).await;
            }
            Some(Ok(JsonRpcMessage::Request(request))) => {
                handle_request(&shared, request.id, request.method, request.params).await;
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, "transport reported an error; failing the endpoint");
                fail(&shared, err.to_string()).await;
                break;
            }
            None => {
                fail(&shared, "transport message stream ended".to_string()).await;
                break;
            }
        }
    }
}

/// Bridges the transport-agnostic health-check monitor to a real `ping`
/// round-trip over the live transport.
pub(super) async fn ping_once(shared: &Shared, timeout: Duration) -> bool {
    raw_send(shared, timeout, "ping", Some(serde_json::json!({})))
        .await
        .is_ok()
}

pub(super) async fn write_notification(shared: &Shared, method: &str, params: Option<Value>) -> TransportResult<()> {
    let message = JsonRpcMessage::notification(method, params);
    let mut guard = shared.transport.lock().await;
    match guard.as_mut() {
        Some(transport) => transport.send(&message, None).await,
        None => Ok(()),
    }
}
