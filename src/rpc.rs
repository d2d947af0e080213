//! JSON-RPC client for the Borneo doser firmware.
//!
//! This module drives the device's RPC server over plain TCP using
//! JSON-RPC 2.0 with NUL-byte framing.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   build_single/batch   ┌───────────┐  TCP, one per call  ┌──────────┐
//! │  DoserClient   │ ─────────────────────► │ Transport │ ◄─────────────────► │  Doser   │
//! │ (call, batch)  │ ◄───────────────────── │           │  JSON + \0 framing  │ firmware │
//! └────────────────┘   resolve_single/batch └───────────┘                     └──────────┘
//! ```
//!
//! # Protocol
//!
//! Each request and each response is compact JSON followed by one `0x00`:
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"sys.hello","params":[]}\0
//! ```
//!
//! Batches are a JSON array of requests under a single delimiter. Batch
//! replies may come back in any order and are matched by `id`.
//!
//! # Usage
//!
//! ```ignore
//! use doser_rpc::rpc::DoserClient;
//! use doser_rpc::ClientConfig;
//!
//! let client = DoserClient::new(ClientConfig::from_env()?);
//! let info = client.call("sys.hello", vec![]).await?;
//! ```

mod builder;
mod client;
mod error;
mod framing;
mod ids;
mod message;
mod resolver;
mod transport;

pub use builder::RequestBuilder;
pub use client::DoserClient;
pub use error::RpcError;
pub use framing::{
    decode_frame, encode_frame, read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE, FRAME_DELIMITER,
};
pub use ids::IdAllocator;
pub use message::{response_id, ErrorCode, RemoteError, Request, Response, JSONRPC_VERSION};
pub use resolver::{resolve_batch, resolve_single, BatchResults};
pub use transport::Transport;
