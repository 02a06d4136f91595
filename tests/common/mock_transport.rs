//! A paired in-memory [`Transport`] implementation: one half behaves like
//! the client-facing `Transport` the endpoint drives, the other half
//! (`MockPeer`) lets a test stand in for "the server" — reading what the
//! endpoint wrote and pushing back whatever bytes the scenario calls for.

use std::time::Duration;

use async_trait::async_trait;
use mcp_endpoint_rt::jsonrpc::JsonRpcMessage;
use mcp_endpoint_rt::transport::{empty_messages, MessageStream, Transport, TransportError, TransportResult, TransportState};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;

pub struct MockTransport {
    outbound: mpsc::UnboundedSender<JsonRpcMessage>,
    inbound_rx: Option<mpsc::Receiver<TransportResult<JsonRpcMessage>>>,
    state_tx: watch::Sender<TransportState>,
    state_rx: watch::Receiver<TransportState>,
}

pub struct MockPeer {
    outbound_rx: mpsc::UnboundedReceiver<JsonRpcMessage>,
    inbound_tx: mpsc::Sender<TransportResult<JsonRpcMessage>>,
}

/// Build a connected pair: `MockTransport` is handed to
/// `Endpoint::start`/`Host::connect`; `MockPeer` drives the test's
/// server-side assertions and responses.
pub fn mock_pair() -> (MockTransport, MockPeer) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::channel(32);
    let (state_tx, state_rx) = watch::channel(TransportState::Disconnected);
    (
        MockTransport {
            outbound: outbound_tx,
            inbound_rx: Some(inbound_rx),
            state_tx,
            state_rx,
        },
        MockPeer { outbound_rx, inbound_tx },
    )
}

#[async_trait]
impl Transport for MockTransport {
    fn state(&self) -> TransportState {
        self.state_rx.borrow().clone()
    }

    fn state_stream(&self) -> watch::Receiver<TransportState> {
        self.state_rx.clone()
    }

    fn take_messages(&mut self) -> MessageStream {
        match self.inbound_rx.take() {
            Some(rx) => Box::pin(ReceiverStream::new(rx)),
            None => empty_messages(),
        }
    }

    async fn start(&mut self) -> TransportResult<()> {
        let _ = self.state_tx.send(TransportState::Connected);
        Ok(())
    }

    async fn stop(&mut self) -> TransportResult<()> {
        let _ = self.state_tx.send(TransportState::Disconnected);
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage, _timeout: Option<Duration>) -> TransportResult<()> {
        self.outbound
            .send(message.clone())
            .map_err(|_| TransportError::ConnectionFailed("peer dropped the outbound channel".to_string()))
    }
}

impl MockPeer {
    /// Wait for the next message the endpoint wrote.
    pub async fn recv_outbound(&mut self) -> JsonRpcMessage {
        self.outbound_rx
            .recv()
            .await
            .expect("transport closed before a message was sent")
    }

    /// Same as [`Self::recv_outbound`] but fails the test instead of
    /// hanging forever if nothing arrives in time — used by the
    /// capability-gate scenario to prove a rejected call wrote zero bytes.
    pub async fn try_recv_outbound_within(&mut self, timeout: Duration) -> Option<JsonRpcMessage> {
        tokio::time::timeout(timeout, self.outbound_rx.recv()).await.ok().flatten()
    }

    /// Push a message onto the endpoint's inbound stream, as if the server
    /// had just written it.
    pub async fn send_inbound(&self, message: JsonRpcMessage) {
        self.inbound_tx
            .send(Ok(message))
            .await
            .expect("endpoint is not listening for inbound messages");
    }

    /// Sever the link, as the transport would on child exit or socket loss.
    pub async fn fail_inbound(&self, err: mcp_endpoint_rt::transport::TransportError) {
        let _ = self.inbound_tx.send(Err(err)).await;
    }
}
