//! Response correlation and error translation.
//!
//! Pure functions over an already-decoded response: no I/O and no retries.
//! Batch responses are matched by `id`, never by position.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::rpc::error::RpcError;
use crate::rpc::message::{json_kind, RemoteError, Request, Response};

/// Per-request outcome of a batch, keyed by request id.
pub type BatchResults = BTreeMap<u64, Result<Value, RemoteError>>;

/// Resolve the response to a single request.
///
/// A device `error` is surfaced as [`RpcError::Remote`] with the payload
/// untouched. A success whose id does not match `request.id` is a
/// [`RpcError::Protocol`] error.
pub fn resolve_single(request: &Request, decoded: Value) -> Result<Value, RpcError> {
    let response = Response::from_value(decoded).map_err(RpcError::Protocol)?;

    let result = response.outcome?;

    match response.id {
        Some(id) if id == request.id => Ok(result),
        Some(id) => Err(RpcError::Protocol(format!(
            "response id {} does not match request id {}",
            id, request.id
        ))),
        None => Err(RpcError::Protocol(format!(
            "response to request {} has no usable id",
            request.id
        ))),
    }
}

/// Resolve a batch response against the requests that produced it.
///
/// Every request id must be answered exactly once and no unknown id may
/// appear; otherwise the whole batch is rejected rather than returned
/// partially. Individual device errors stay per-entry in the map.
///
/// A bare error object in place of the array means the device rejected the
/// batch as a whole; it is surfaced as [`RpcError::Remote`].
pub fn resolve_batch(requests: &[Request], decoded: Value) -> Result<BatchResults, RpcError> {
    let entries = match decoded {
        Value::Array(entries) => entries,
        Value::Object(object) if object.contains_key("error") => {
            let response =
                Response::from_value(Value::Object(object)).map_err(RpcError::Protocol)?;
            return match response.outcome {
                Err(remote) => Err(RpcError::Remote(remote)),
                Ok(_) => Err(RpcError::Protocol(
                    "expected a batch response array".to_string(),
                )),
            };
        }
        other => {
            return Err(RpcError::Protocol(format!(
                "expected a batch response array, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut pending: BTreeMap<u64, &Request> = requests.iter().map(|r| (r.id, r)).collect();
    let mut results = BatchResults::new();

    for entry in entries {
        let response = Response::from_value(entry).map_err(RpcError::Protocol)?;
        let id = response.id.ok_or_else(|| {
            RpcError::Protocol("batch response entry has no usable id".to_string())
        })?;

        if pending.remove(&id).is_none() {
            let reason = if results.contains_key(&id) {
                format!("batch response answers id {} more than once", id)
            } else {
                format!("batch response contains unknown id {}", id)
            };
            return Err(RpcError::Protocol(reason));
        }
        results.insert(id, response.outcome);
    }

    if !pending.is_empty() {
        let missing: Vec<String> = pending.keys().map(u64::to_string).collect();
        return Err(RpcError::Protocol(format!(
            "batch response is missing ids {}",
            missing.join(", ")
        )));
    }

    Ok(results)
}
