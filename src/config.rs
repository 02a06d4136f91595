//! Configuration surface (component I): endpoint, retry, and health-check
//! knobs aggregated into a single [`ClientConfig`], per §6's option table.

use std::time::Duration;

use crate::jsonrpc::DEFAULT_MAX_MESSAGE_SIZE;
use crate::mcp::{ClientCapabilities, ClientInfo};
use crate::transport::RetryPolicy;

/// Default cap on transport establishment (`connectTimeout`).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default per-request deadline (`sendTimeout`).
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);
/// Default health-check period.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
/// Default bound on a subscriber's lag before it is dropped with `lagged`.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Aggregates every knob an [`crate::endpoint::Endpoint`] or
/// [`crate::host::Host`] needs: identity sent during `initialize`, timeouts,
/// the message-size guard, the transport retry policy, and health-check
/// behavior.
///
/// Builder methods follow a fluent `.method(value) -> Self` style rather
/// than a separate builder type, since there are no required fields beyond
/// the defaults.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identity advertised in `initialize.clientInfo`.
    pub client_info: ClientInfo,
    /// Capabilities advertised in `initialize.capabilities`.
    pub capabilities: ClientCapabilities,
    /// Cap on `transport.start()`.
    pub connect_timeout: Duration,
    /// Per-request deadline for `Endpoint::send`.
    pub send_timeout: Duration,
    /// Pre-send size guard, per message.
    pub max_message_size: usize,
    /// Transport retry/backoff policy.
    pub retry: RetryPolicy,
    /// Whether the endpoint runs a background health-check ping.
    pub health_check_enabled: bool,
    /// Health-check ping period.
    pub health_check_interval: Duration,
    /// Consecutive health-check failures tolerated before the endpoint
    /// transitions to `Failed`.
    pub max_reconnect_attempts: u32,
    /// Bound on a subscriber's channel before it is dropped with
    /// `lagged` (§5, "Shared resources").
    pub subscriber_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_info: ClientInfo {
                name: "mcp-endpoint-rt".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ClientCapabilities::minimal(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            retry: RetryPolicy::default(),
            health_check_enabled: true,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            max_reconnect_attempts: 5,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_info = ClientInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn health_check(mut self, enabled: bool, interval: Duration, max_reconnect_attempts: u32) -> Self {
        self.health_check_enabled = enabled;
        self.health_check_interval = interval;
        self.max_reconnect_attempts = max_reconnect_attempts;
        self
    }

    pub fn subscriber_buffer(mut self, size: usize) -> Self {
        self.subscriber_buffer = size;
        self
    }
}
