//! Crate-level end-to-end scenarios (§8), driven over the in-memory mock
//! transport so they exercise the full endpoint without a real process or
//! socket.

mod common;

use std::time::Duration;

use common::mock_pair;
use mcp_endpoint_rt::config::ClientConfig;
use mcp_endpoint_rt::endpoint::{Endpoint, EndpointState};
use mcp_endpoint_rt::jsonrpc::{JsonRpcMessage, RequestId};
use mcp_endpoint_rt::progress::ProgressUpdate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn initialize_result_json() -> serde_json::Value {
    serde_json::json!({
        "protocolVersion": "2025-03-26",
        "serverInfo": {"name": "srv", "version": "1"},
        "capabilities": {"tools": {}}
    })
}

/// Scenario 1: the initialize handshake (§8.1). The endpoint writes
/// `initialize`, the test answers with a matching response, and the
/// endpoint then writes `notifications/initialized` before settling on
/// `Running`.
#[tokio::test]
async fn initialize_handshake_reaches_running() {
    let (transport, mut peer) = mock_pair();
    let endpoint = Endpoint::new(ClientConfig::default());

    let harness = tokio::spawn(async move {
        let request = peer.recv_outbound().await;
        let (id, method, params) = match request {
            JsonRpcMessage::Request(r) => (r.id, r.method, r.params),
            other => panic!("expected a request, got {other:?}"),
        };
        assert_eq!(method, "initialize");
        assert_eq!(
            params.as_ref().and_then(|p| p.get("protocolVersion")).and_then(|v| v.as_str()),
            Some("2025-03-26")
        );
        peer.send_inbound(JsonRpcMessage::response(id, initialize_result_json())).await;

        let initialized = peer.recv_outbound().await;
        assert_eq!(initialized.method(), Some("notifications/initialized"));
        assert!(initialized.id().is_none());
        peer
    });

    endpoint.start(Box::new(transport)).await.unwrap();
    harness.await.unwrap();

    assert!(endpoint.state().await.is_running());
}

/// Scenario 2: `tools/call` with progress (§8.2). Two progress
/// notifications arrive before the terminal response; the test asserts
/// exactly two progress callbacks fire, in order, strictly before the
/// response resolves.
#[tokio::test]
async fn tools_call_delivers_progress_before_response() {
    let (transport, mut peer) = mock_pair();
    let endpoint = Arc::new(Endpoint::new(ClientConfig::default()));

    let init_peer = tokio::spawn({
        let mut peer = peer;
        async move {
            let request = peer.recv_outbound().await;
            let id = request.id().unwrap().clone();
            peer.send_inbound(JsonRpcMessage::response(id, initialize_result_json())).await;
            let _initialized = peer.recv_outbound().await;
            peer
        }
    });
    endpoint.start(Box::new(transport)).await.unwrap();
    peer = init_peer.await.unwrap();

    let progress_count = Arc::new(AtomicUsize::new(0));
    let progress_count_clone = progress_count.clone();
    let handler: mcp_endpoint_rt::progress::ProgressHandler = Arc::new(move |update: ProgressUpdate| {
        let n = progress_count_clone.fetch_add(1, Ordering::SeqCst);
        match n {
            0 => assert_eq!(update.progress, 0.5),
            1 => assert_eq!(update.progress, 1.0),
            _ => panic!("unexpected extra progress callback"),
        }
    });

    let endpoint_for_call = endpoint.clone();
    let call = tokio::spawn(async move {
        endpoint_for_call
            .call_tool("demo-tool", None, Some(handler))
            .await
            .unwrap()
    });

    let request = peer.recv_outbound().await;
    let (id, params) = match request {
        JsonRpcMessage::Request(r) => (r.id, r.params.unwrap()),
        other => panic!("expected a request, got {other:?}"),
    };
    let token = params["_meta"]["progressToken"].clone();
    assert_eq!(token, serde_json::to_value(&id).unwrap());

    peer.send_inbound(JsonRpcMessage::notification(
        "notifications/progress",
        Some(serde_json::json!({"progressToken": token, "progress": 0.5, "total": 1.0})),
    ))
    .await;
    peer.send_inbound(JsonRpcMessage::notification(
        "notifications/progress",
        Some(serde_json::json!({"progressToken": token, "progress": 1.0, "total": 1.0})),
    ))
    .await;
    peer.send_inbound(JsonRpcMessage::response(
        id,
        serde_json::json!({"content": [{"type": "text", "text": "ok"}], "isError": false}),
    ))
    .await;

    let result = call.await.unwrap();
    assert!(!result.is_error);
    assert_eq!(progress_count.load(Ordering::SeqCst), 2);
}

/// Scenario 3: cancellation (§8.3). Cancelling an outstanding request
/// completes it locally with `Cancelled`, and a subsequent late response
/// from the server is not delivered to the original caller.
#[tokio::test]
async fn cancelling_a_request_completes_it_locally() {
    let (transport, mut peer) = mock_pair();
    let endpoint = Arc::new(Endpoint::new(ClientConfig::default()));

    let init_peer = tokio::spawn({
        let mut peer = peer;
        async move {
            let request = peer.recv_outbound().await;
            let id = request.id().unwrap().clone();
            peer.send_inbound(JsonRpcMessage::response(id, initialize_result_json())).await;
            let _initialized = peer.recv_outbound().await;
            peer
        }
    });
    endpoint.start(Box::new(transport)).await.unwrap();
    peer = init_peer.await.unwrap();

    let endpoint_for_call = endpoint.clone();
    let call = tokio::spawn(async move { endpoint_for_call.call_tool("slow-tool", None, None).await });

    let request = peer.recv_outbound().await;
    let id = request.id().unwrap().clone();

    endpoint.cancel(&id, Some("user")).await.unwrap();
    let cancel_notice = peer.recv_outbound().await;
    assert_eq!(cancel_notice.method(), Some("notifications/cancelled"));

    // A late response from the server must not resurrect the cancelled call.
    peer.send_inbound(JsonRpcMessage::response(
        id,
        serde_json::json!({"content": [], "isError": false}),
    ))
    .await;

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, mcp_endpoint_rt::error::EndpointError::Cancelled { .. }));
}

/// Scenario 4: unsupported capability (§8.4). A server with empty
/// capabilities rejects `tools/list` before a single byte reaches the
/// transport.
#[tokio::test]
async fn unsupported_capability_writes_nothing() {
    let (transport, mut peer) = mock_pair();
    let endpoint = Endpoint::new(ClientConfig::default());

    let harness = tokio::spawn(async move {
        let request = peer.recv_outbound().await;
        let id = request.id().unwrap().clone();
        let result = serde_json::json!({
            "protocolVersion": "2025-03-26",
            "serverInfo": {"name": "srv", "version": "1"},
            "capabilities": {}
        });
        peer.send_inbound(JsonRpcMessage::response(id, result)).await;
        let _initialized = peer.recv_outbound().await;
        peer
    });
    endpoint.start(Box::new(transport)).await.unwrap();
    let mut peer = harness.await.unwrap();

    let err = endpoint.list_tools(None).await.unwrap_err();
    assert!(matches!(
        err,
        mcp_endpoint_rt::error::EndpointError::CapabilityDenied(ref msg) if msg == "Server does not support tools."
    ));

    assert!(peer.try_recv_outbound_within(Duration::from_millis(50)).await.is_none());
}

/// `stop(); stop()` is a no-op the second time, as required by §8's
/// idempotence law.
#[tokio::test]
async fn double_stop_is_idempotent() {
    let (transport, mut peer) = mock_pair();
    let endpoint = Endpoint::new(ClientConfig::default());

    let harness = tokio::spawn(async move {
        let request = peer.recv_outbound().await;
        let id = request.id().unwrap().clone();
        peer.send_inbound(JsonRpcMessage::response(id, initialize_result_json())).await;
        let _initialized = peer.recv_outbound().await;
    });
    endpoint.start(Box::new(transport)).await.unwrap();
    harness.await.unwrap();

    endpoint.stop(true).await.unwrap();
    assert_eq!(endpoint.state().await, EndpointState::Disconnected);
    endpoint.stop(true).await.unwrap();
    assert_eq!(endpoint.state().await, EndpointState::Disconnected);
}

/// A fatal transport error folds the endpoint into `Failed` and fails
/// every request still pending at that moment.
#[tokio::test]
async fn transport_failure_fails_pending_requests() {
    let (transport, mut peer) = mock_pair();
    let endpoint = Arc::new(Endpoint::new(ClientConfig::default()));

    let init_peer = tokio::spawn({
        let mut peer = peer;
        async move {
            let request = peer.recv_outbound().await;
            let id = request.id().unwrap().clone();
            peer.send_inbound(JsonRpcMessage::response(id, initialize_result_json())).await;
            let _initialized = peer.recv_outbound().await;
            peer
        }
    });
    endpoint.start(Box::new(transport)).await.unwrap();
    peer = init_peer.await.unwrap();

    let endpoint_for_call = endpoint.clone();
    let call = tokio::spawn(async move { endpoint_for_call.ping().await });

    let _request = peer.recv_outbound().await;
    peer.fail_inbound(mcp_endpoint_rt::transport::TransportError::ConnectionFailed(
        "socket reset".to_string(),
    ))
    .await;

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, mcp_endpoint_rt::error::EndpointError::Protocol(_)));

    // Give the pump task a beat to fold the failure into endpoint state.
    for _ in 0..20 {
        if endpoint.state().await.is_terminal_failure() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(endpoint.state().await.is_terminal_failure());
}

#[allow(dead_code)]
fn unused_request_id_import_anchor() -> RequestId {
    RequestId::new_string("anchor")
}
