//! Doser RPC Library
//!
//! Client-side transport and correlation layer for Borneo dosing pumps:
//!
//! - `rpc` - JSON-RPC 2.0 over NUL-delimited TCP (builder, transport, resolver)
//! - `config` - Device address and timeouts, with environment overrides
//! - `device` - Typed wrappers for the firmware's `sys.*` and `doser.*` methods
//!
//! # Example
//!
//! ```ignore
//! use doser_rpc::{ClientConfig, DoserClient};
//!
//! let client = DoserClient::new(ClientConfig::from_env()?);
//! let results = client
//!     .call_batch(vec![("sys.hello", vec![]), ("doser.status", vec![])])
//!     .await?;
//! ```

pub mod config;
pub mod device;
pub mod rpc;

pub use config::{ClientConfig, ConfigError};
pub use device::Doser;
pub use rpc::{DoserClient, RemoteError, RpcError};
