//! Progress manager (component G): a `progressToken -> handler` map whose
//! lifetime is tied to the request that registered it (§4.7).
//!
//! Registered at `send` (step 4 of the send contract), unregistered on any
//! terminal outcome — response, error, cancellation, or timeout — of the
//! associated request. Unknown tokens on an inbound
//! `notifications/progress` are silently ignored, per §4.6.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::jsonrpc::RequestId;

/// One progress update delivered to a registered handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: f64,
    pub total: Option<f64>,
    pub message: Option<String>,
}

/// Callback invoked for each progress update addressed to a given token.
/// `Send + Sync` so it can be stored in the shared map and invoked from the
/// message pump task.
pub type ProgressHandler = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Keyed by `progressToken`. Concurrent callbacks for the same token are
/// delivered in arrival order because the message pump processes inbound
/// messages sequentially (§5, "Ordering guarantees").
#[derive(Clone, Default)]
pub struct ProgressManager {
    handlers: Arc<DashMap<RequestId, ProgressHandler>>,
}

impl fmt::Debug for ProgressManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressManager")
            .field("registered", &self.handlers.len())
            .finish()
    }
}

impl ProgressManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: RequestId, handler: ProgressHandler) {
        self.handlers.insert(token, handler);
    }

    /// Remove the handler for `token`, if any. Safe to call more than once
    /// (every terminal outcome calls this).
    pub fn unregister(&self, token: &RequestId) {
        self.handlers.remove(token);
    }

    /// Dispatch `update` to the handler registered for `token`. Unknown
    /// tokens are silently ignored per §4.6. Returns whether a handler was
    /// found.
    pub fn dispatch(&self, token: &RequestId, update: ProgressUpdate) -> bool {
        if let Some(handler) = self.handlers.get(token) {
            handler(update);
            true
        } else {
            false
        }
    }

    pub fn is_registered(&self, token: &RequestId) -> bool {
        self.handlers.contains_key(token)
    }
}
