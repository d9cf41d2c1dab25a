use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    ConnectionState,
    Health,
    GpsInfo,
    Battery,
    Imu,
    Position,
    MissionProgress,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamKind::ConnectionState => "connection_state",
            StreamKind::Health => "health",
            StreamKind::GpsInfo => "gps_info",
            StreamKind::Battery => "battery",
            StreamKind::Imu => "imu",
            StreamKind::Position => "position",
            StreamKind::MissionProgress => "mission_progress",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthState {
    pub global_position_ok: bool,
    pub home_position_ok: bool,
    pub gyrometer_calibration_ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsInfo {
    pub satellites: u8,
    /// 0 = no GPS, 1 = no fix, 2 = 2D, 3 = 3D, higher = DGPS/RTK.
    pub fix_type: u8,
    pub hdop: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub relative_altitude_m: f32,
    pub absolute_altitude_m: f32,
}

/// One reading from a vehicle telemetry stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetrySample {
    ConnectionState { connected: bool },
    Health(HealthState),
    GpsInfo(GpsInfo),
    /// Remaining charge as a fraction in 0..=1.
    Battery { remaining: f32 },
    Imu { temperature_c: f32 },
    Position(Position),
    MissionProgress { current: u32, total: u32 },
}

impl TelemetrySample {
    pub fn kind(&self) -> StreamKind {
        match self {
            TelemetrySample::ConnectionState { .. } => StreamKind::ConnectionState,
            TelemetrySample::Health(_) => StreamKind::Health,
            TelemetrySample::GpsInfo(_) => StreamKind::GpsInfo,
            TelemetrySample::Battery { .. } => StreamKind::Battery,
            TelemetrySample::Imu { .. } => StreamKind::Imu,
            TelemetrySample::Position(_) => StreamKind::Position,
            TelemetrySample::MissionProgress { .. } => StreamKind::MissionProgress,
        }
    }
}
