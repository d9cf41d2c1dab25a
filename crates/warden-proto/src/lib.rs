pub mod action;
pub mod mission;
pub mod telemetry;

pub use action::ActionKind;
pub use mission::{CameraAction, MissionItem, MissionPlan, PlanError};
pub use telemetry::{GpsInfo, HealthState, Position, StreamKind, TelemetrySample};
