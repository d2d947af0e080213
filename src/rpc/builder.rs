//! Request construction with correlated ids.

use std::sync::Arc;

use serde_json::Value;

use crate::rpc::error::RpcError;
use crate::rpc::framing::encode_frame;
use crate::rpc::ids::IdAllocator;
use crate::rpc::message::Request;

/// Builds requests and their wire frames, drawing ids from a shared
/// [`IdAllocator`].
///
/// Clones share the allocator, so ids stay unique across every clone.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    ids: Arc<IdAllocator>,
}

impl RequestBuilder {
    pub fn new(ids: Arc<IdAllocator>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    /// Build one request and its NUL-terminated frame.
    pub fn build_single(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<(Request, Vec<u8>), RpcError> {
        let request = Request::new(method, params, self.ids.next_id());
        let frame = encode_frame(&request)?;
        Ok((request, frame))
    }

    /// Build a batch: one id per call in call order, encoded as a single JSON
    /// array with one trailing delimiter.
    pub fn build_batch<I, M>(&self, calls: I) -> Result<(Vec<Request>, Vec<u8>), RpcError>
    where
        I: IntoIterator<Item = (M, Vec<Value>)>,
        M: Into<String>,
    {
        let calls: Vec<(M, Vec<Value>)> = calls.into_iter().collect();
        if calls.is_empty() {
            return Err(RpcError::EmptyBatch);
        }

        let ids = self.ids.next_block(calls.len() as u64);
        let requests: Vec<Request> = calls
            .into_iter()
            .zip(ids)
            .map(|((method, params), id)| Request::new(method, params, id))
            .collect();

        let frame = encode_frame(&requests)?;
        Ok((requests, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::framing::{decode_frame, FRAME_DELIMITER};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn payload(frame: &[u8]) -> Value {
        assert_eq!(frame.last(), Some(&FRAME_DELIMITER));
        decode_frame(frame[..frame.len() - 1].to_vec()).unwrap()
    }

    #[test]
    fn test_build_single() {
        let builder = RequestBuilder::default();
        let (request, frame) = builder.build_single("sys.hello", vec![]).unwrap();

        assert_eq!(request.id, 1);
        assert_eq!(request.method, "sys.hello");
        assert_eq!(
            frame,
            b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"sys.hello\",\"params\":[]}\0".to_vec()
        );
    }

    #[test]
    fn test_build_batch_assigns_ids_in_call_order() {
        let builder = RequestBuilder::new(Arc::new(IdAllocator::starting_at(5)));
        let (requests, frame) = builder
            .build_batch(vec![("sys.hello", vec![]), ("doser.status", vec![])])
            .unwrap();

        assert_eq!(requests.iter().map(|r| r.id).collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(
            payload(&frame),
            json!([
                {"jsonrpc": "2.0", "id": 5, "method": "sys.hello", "params": []},
                {"jsonrpc": "2.0", "id": 6, "method": "doser.status", "params": []}
            ])
        );
    }

    #[test]
    fn test_single_and_batch_share_the_counter() {
        let builder = RequestBuilder::default();
        let (first, _) = builder.build_single("sys.hello", vec![]).unwrap();
        let (batch, _) = builder
            .build_batch(vec![
                ("doser.pump", vec![json!(0), json!(1.5)]),
                ("doser.pump", vec![json!(1), json!(0.5)]),
            ])
            .unwrap();
        let (last, _) = builder.clone().build_single("doser.status", vec![]).unwrap();

        let ids: Vec<u64> = std::iter::once(first.id)
            .chain(batch.iter().map(|r| r.id))
            .chain(std::iter::once(last.id))
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_batch_is_rejected_without_consuming_ids() {
        let builder = RequestBuilder::default();
        let calls: Vec<(&str, Vec<Value>)> = Vec::new();
        assert!(matches!(
            builder.build_batch(calls),
            Err(RpcError::EmptyBatch)
        ));
        assert_eq!(builder.ids().peek(), 1);
    }

    #[test]
    fn test_arbitrary_params_are_passed_through() {
        let builder = RequestBuilder::default();
        let job = json!({
            "name": "添加Mg",
            "when": {"dow": [1, 2, 3, 4, 5, 6, 7], "hours": [0, 1, 2], "minute": 45},
            "payloads": [0.8, 0.2, 0, 0]
        });
        let (request, frame) = builder
            .build_single("doser.schedule_set", vec![job.clone()])
            .unwrap();

        assert_eq!(request.params, vec![job.clone()]);
        assert_eq!(payload(&frame)["params"], json!([job]));
    }
}
