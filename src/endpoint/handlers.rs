//! Server-initiated request handlers (§4.6, "Default server-handlers").
//!
//! The endpoint resolves an inbound `Request` by method name against a
//! registry of these; an absent entry replies `methodNotFound`. `roots/list`
//! is always registered (it only needs the client's current root set);
//! `sampling/createMessage` is registered only when the application supplies
//! a [`SamplingHandler`], matching the capability it advertised at
//! `initialize` time.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::jsonrpc::JsonRpcError;
use crate::mcp::methods::{CreateMessageParams, CreateMessageResult, ListRootsResult};
use crate::mcp::types::Root;

/// A single server→client method handler. Errors from a handler are caught
/// by the endpoint and wrapped as `internalError` unless the handler itself
/// returns a structured [`JsonRpcError`] (§4.6, §7).
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>) -> Result<Value, JsonRpcError>;
}

pub type SharedRequestHandler = Arc<dyn RequestHandler>;

/// Application-supplied callback backing `sampling/createMessage`. Sampling
/// itself (choosing a model, running inference) is explicitly out of scope
/// for this crate; the endpoint only plumbs the request through.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<CreateMessageResult, JsonRpcError>;
}

/// Replies with the client's current root list.
pub struct RootsListHandler {
    pub(crate) roots: Arc<RwLock<Vec<Root>>>,
}

#[async_trait]
impl RequestHandler for RootsListHandler {
    async fn handle(&self, _params: Option<Value>) -> Result<Value, JsonRpcError> {
        let roots = self.roots.read().await.clone();
        let result = ListRootsResult { roots };
        serde_json::to_value(result)
            .map_err(|e| JsonRpcError::internal_error(format!("failed to encode roots: {e}")))
    }
}

/// Adapts an application's [`SamplingHandler`] to the generic
/// [`RequestHandler`] registry, decoding `params` and encoding the result.
pub struct SamplingRequestHandler {
    pub(crate) inner: Arc<dyn SamplingHandler>,
}

#[async_trait]
impl RequestHandler for SamplingRequestHandler {
    async fn handle(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
        let params: CreateMessageParams = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(format!("invalid params: {e}")))?;
        let result = self.inner.create_message(params).await?;
        serde_json::to_value(result)
            .map_err(|e| JsonRpcError::internal_error(format!("failed to encode result: {e}")))
    }
}
