pub mod dispatch;
pub mod error;
pub mod mav;
pub mod safety;
pub mod sim;
pub mod state;
pub mod telemetry;
pub mod vehicle;

pub use dispatch::{ActionDispatcher, Dispatch};
pub use error::{TelemetryError, VehicleError};
pub use telemetry::{CancelToken, Delivery, SamplingPolicy, StreamFailure, Subscription, TelemetryHub};
pub use vehicle::{SampleSource, Vehicle};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    /// MAVLink connection string, e.g. "udpin:0.0.0.0:14540" for SITL or
    /// "serial:/dev/ttyUSB0:57600" for a telemetry radio.
    pub address: String,

    /// MAVLink ids we use (companion side)
    #[serde(default = "default_sys_id")]
    pub sys_id: u8,
    #[serde(default = "default_comp_id")]
    pub comp_id: u8,

    /// target system/component (autopilot side). 1/1 is common for PX4 and ArduPilot.
    #[serde(default = "default_target")]
    pub target_sys: u8,
    #[serde(default = "default_target")]
    pub target_comp: u8,

    /// Companion heartbeat send rate. Default 1 Hz.
    pub heartbeat_hz: Option<f32>,

    /// How long to wait for COMMAND_ACK and mission handshake replies.
    pub command_timeout_ms: Option<u64>,

    /// Autopilot heartbeat silence after which the link is reported down.
    pub link_timeout_ms: Option<u64>,
}

fn default_sys_id() -> u8 { 245 }
fn default_comp_id() -> u8 { 191 }
fn default_target() -> u8 { 1 }

impl VehicleConfig {
    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.command_timeout_ms.unwrap_or(3000))
    }

    pub fn link_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.link_timeout_ms.unwrap_or(3000))
    }
}
