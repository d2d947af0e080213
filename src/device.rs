//! Typed wrappers over the doser firmware's method table.
//!
//! These are conveniences on top of [`DoserClient::call`]: each one is a
//! plain positional call, and the client itself knows nothing about them.
//! Field names match the firmware's camelCase JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::rpc::{DoserClient, RpcError};

pub const METHOD_SYS_HELLO: &str = "sys.hello";
pub const METHOD_STATUS: &str = "doser.status";
pub const METHOD_PUMP_UNTIL: &str = "doser.pump_until";
pub const METHOD_PUMP: &str = "doser.pump";
pub const METHOD_SPEED_SET: &str = "doser.speed_set";
pub const METHOD_SCHEDULE_GET: &str = "doser.schedule_get";
pub const METHOD_SCHEDULE_SET: &str = "doser.schedule_set";

/// Identity reported by `sys.hello`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: String,
    #[serde(default)]
    pub manufacturer_name: String,
    #[serde(rename = "manufacturerID", default)]
    pub manufacturer_id: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(rename = "modelID", default)]
    pub model_id: String,
    #[serde(default)]
    pub compatible: String,
    #[serde(default)]
    pub hardware_version: String,
    #[serde(default)]
    pub firmware_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub serial_number: String,
}

/// Snapshot returned by `doser.status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoserStatus {
    pub powered: bool,
    /// Current firmware builds report the mode under `scheduled`.
    #[serde(default, alias = "scheduled")]
    pub mode: Option<String>,
    /// Device RTC, local time as Unix seconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Milliseconds since boot.
    #[serde(default)]
    pub cpu_time: u64,
    #[serde(default)]
    pub channels: Vec<ChannelStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub name: String,
    /// mL/min
    pub speed: f64,
    pub is_busy: bool,
}

/// When a scheduled job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSpec {
    pub minute: u8,
    pub hours: Vec<u8>,
    /// Days of week, 0-6 with 0 = Sunday (`tm_wday`).
    pub dow: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub name: String,
    pub can_parallel: bool,
    pub when: CronSpec,
    /// Volume per channel in mL.
    pub payloads: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execute_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub jobs: Vec<ScheduledJob>,
}

/// Typed facade over one doser.
#[derive(Debug, Clone)]
pub struct Doser {
    client: DoserClient,
}

impl Doser {
    pub fn new(client: DoserClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DoserClient {
        &self.client
    }

    pub async fn hello(&self) -> Result<DeviceInfo, RpcError> {
        self.call_typed(METHOD_SYS_HELLO, vec![]).await
    }

    pub async fn status(&self) -> Result<DoserStatus, RpcError> {
        self.call_typed(METHOD_STATUS, vec![]).await
    }

    /// Run `channel` for `duration_ms` milliseconds.
    pub async fn pump_until(&self, channel: u8, duration_ms: u32) -> Result<(), RpcError> {
        self.client
            .call(METHOD_PUMP_UNTIL, vec![json!(channel), json!(duration_ms)])
            .await?;
        Ok(())
    }

    /// Dispense `volume_ml` from `channel`.
    pub async fn pump(&self, channel: u8, volume_ml: f64) -> Result<(), RpcError> {
        self.client
            .call(METHOD_PUMP, vec![json!(channel), json!(volume_ml)])
            .await?;
        Ok(())
    }

    /// Calibrate `channel` to `ml_per_min`.
    pub async fn set_speed(&self, channel: u8, ml_per_min: f64) -> Result<(), RpcError> {
        self.client
            .call(METHOD_SPEED_SET, vec![json!(channel), json!(ml_per_min)])
            .await?;
        Ok(())
    }

    pub async fn schedule(&self) -> Result<Schedule, RpcError> {
        self.call_typed(METHOD_SCHEDULE_GET, vec![]).await
    }

    /// Replace the whole schedule. Each job is one positional parameter.
    pub async fn set_schedule(&self, jobs: &[ScheduledJob]) -> Result<(), RpcError> {
        let params = jobs
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()
            .map_err(RpcError::Encode)?;
        self.client.call(METHOD_SCHEDULE_SET, params).await?;
        Ok(())
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let result = self.client.call(method, params).await?;
        serde_json::from_value(result).map_err(|e| {
            RpcError::Protocol(format!("unexpected result shape for {}: {}", method, e))
        })
    }
}
