//! JSON-RPC 2.0 message types as spoken by the doser firmware.
//!
//! Requests are always positional (`params` is a JSON array). Responses are
//! parsed from an already-decoded [`serde_json::Value`] rather than through a
//! derived `Deserialize`, because the resolver has to tell "field absent"
//! apart from "field is `null`" and must keep the `error` payload verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Protocol version string carried by every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// A single JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A response entry after shape validation.
///
/// Exactly one of `result`/`error` survives into `outcome`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: Option<u64>,
    pub outcome: Result<Value, RemoteError>,
}

impl Response {
    /// Validate the shape of one response object.
    ///
    /// Returns `Err(reason)` when the value is not an object or carries
    /// neither `result` nor `error`. When both are present the error wins,
    /// so a failing call is never reported as a success.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(format!(
                    "expected a response object, got {}",
                    json_kind(&other)
                ))
            }
        };

        let id = object.get("id").and_then(response_id);

        if let Some(error) = object.remove("error") {
            return Ok(Self {
                id,
                outcome: Err(RemoteError::new(error)),
            });
        }

        match object.remove("result") {
            Some(result) => Ok(Self {
                id,
                outcome: Ok(result),
            }),
            None => Err(format!(
                "response carries neither 'result' nor 'error' (keys: {})",
                key_list(&object)
            )),
        }
    }
}

/// Interpret a response `id` as a request id.
///
/// The firmware stores ids in a C double and prints them back, so `5.0` is
/// accepted for `5`. Negative, fractional and non-numeric ids yield `None`.
pub fn response_id(value: &Value) -> Option<u64> {
    if let Some(id) = value.as_u64() {
        return Some(id);
    }
    let float = value.as_f64()?;
    if float >= 0.0 && float.fract() == 0.0 && float <= u64::MAX as f64 {
        Some(float as u64)
    } else {
        None
    }
}

/// An application-level error reported by the device.
///
/// The payload is the response's `error` member exactly as received.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Device error: {payload}")]
pub struct RemoteError {
    payload: Value,
}

impl RemoteError {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// The verbatim `error` payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// The numeric `code` member, if the payload is a standard error object.
    pub fn code(&self) -> Option<i64> {
        self.payload.get("code").and_then(Value::as_i64)
    }

    /// The `message` member, if present.
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }

    /// Classify the error code.
    pub fn kind(&self) -> Option<ErrorCode> {
        self.code().map(ErrorCode::from_code)
    }
}

/// Error codes used by the firmware.
///
/// The reserved range follows JSON-RPC 2.0; device handlers also return
/// their own small positive codes (e.g. `100` when a pump is busy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Implementation-defined server error in `-32099..=-32000`.
    ServerError(i64),
    /// Anything outside the reserved range.
    Application(i64),
}

impl ErrorCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            -32099..=-32000 => ErrorCode::ServerError(code),
            other => ErrorCode::Application(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ServerError(code) | ErrorCode::Application(code) => *code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::ParseError => write!(f, "parse error"),
            ErrorCode::InvalidRequest => write!(f, "invalid request"),
            ErrorCode::MethodNotFound => write!(f, "method not found"),
            ErrorCode::InvalidParams => write!(f, "invalid params"),
            ErrorCode::InternalError => write!(f, "internal error"),
            ErrorCode::ServerError(code) => write!(f, "server error {}", code),
            ErrorCode::Application(code) => write!(f, "application error {}", code),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn key_list(object: &Map<String, Value>) -> String {
    if object.is_empty() {
        return "none".to_string();
    }
    object.keys().cloned().collect::<Vec<_>>().join(", ")
}
