//! Caller-facing JSON-RPC client for the doser.
//!
//! `DoserClient` composes the request builder, the one-shot transport and
//! the resolver. It is cheap to clone and every clone shares the same id
//! allocator, so calls can be issued concurrently from many tasks.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::rpc::builder::RequestBuilder;
use crate::rpc::error::RpcError;
use crate::rpc::ids::IdAllocator;
use crate::rpc::message::{RemoteError, Request};
use crate::rpc::resolver::{resolve_batch, resolve_single, BatchResults};
use crate::rpc::transport::Transport;

/// JSON-RPC client for one device.
///
/// # Example
///
/// ```ignore
/// use doser_rpc::{ClientConfig, DoserClient};
/// use serde_json::json;
///
/// let client = DoserClient::new(ClientConfig::new("192.168.1.20", 1022));
/// let info = client.call("sys.hello", vec![]).await?;
/// client.call("doser.pump_until", vec![json!(0), json!(3000)]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DoserClient {
    config: ClientConfig,
    builder: RequestBuilder,
    transport: Transport,
}

impl DoserClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_ids(config, Arc::new(IdAllocator::new()))
    }

    /// Build a client around an existing id allocator, e.g. one seeded by a
    /// test or shared with another client.
    pub fn with_ids(config: ClientConfig, ids: Arc<IdAllocator>) -> Self {
        let transport = Transport::from_config(&config);
        Self {
            config,
            builder: RequestBuilder::new(ids),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn ids(&self) -> &Arc<IdAllocator> {
        self.builder.ids()
    }

    /// Call one remote method and return its `result`.
    ///
    /// # Errors
    ///
    /// - Connection and framing failures from the transport
    /// - [`RpcError::Remote`] when the device answers with an `error`
    /// - [`RpcError::Protocol`] when the reply does not correlate
    pub async fn call(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let (request, frame) = self.builder.build_single(method, params)?;
        debug!(id = request.id, method = %request.method, "calling device");

        let decoded = self.send(&frame).await?;
        resolve_single(&request, decoded)
    }

    /// Call several methods in one round trip.
    ///
    /// Results come back in call order. A device error for one call does not
    /// fail the others; transport or correlation failures fail the batch.
    pub async fn call_batch<I, M>(
        &self,
        calls: I,
    ) -> Result<Vec<Result<Value, RemoteError>>, RpcError>
    where
        I: IntoIterator<Item = (M, Vec<Value>)>,
        M: Into<String>,
    {
        let (requests, mut results) = self.execute_batch(calls).await?;
        requests
            .iter()
            .map(|request| {
                results.remove(&request.id).ok_or_else(|| {
                    RpcError::Protocol(format!("no result for request {}", request.id))
                })
            })
            .collect()
    }

    /// Like [`call_batch`](Self::call_batch), keyed by request id.
    pub async fn call_batch_by_id<I, M>(&self, calls: I) -> Result<BatchResults, RpcError>
    where
        I: IntoIterator<Item = (M, Vec<Value>)>,
        M: Into<String>,
    {
        let (_, results) = self.execute_batch(calls).await?;
        Ok(results)
    }

    async fn execute_batch<I, M>(&self, calls: I) -> Result<(Vec<Request>, BatchResults), RpcError>
    where
        I: IntoIterator<Item = (M, Vec<Value>)>,
        M: Into<String>,
    {
        let (requests, frame) = self.builder.build_batch(calls)?;
        debug!(
            first_id = requests[0].id,
            calls = requests.len(),
            "calling device with batch"
        );

        let decoded = self.send(&frame).await?;
        let results = resolve_batch(&requests, decoded)?;
        Ok((requests, results))
    }

    async fn send(&self, frame: &[u8]) -> Result<Value, RpcError> {
        self.transport
            .call(frame, &self.config.host, self.config.port)
            .await
    }
}
