//! Safety policies: map one telemetry sample, plus the policy's own rolling
//! state, to a [`Decision`].

pub mod battery;
pub mod deadline;
pub mod doctor;
pub mod gnss;
pub mod mission;
pub mod thermal;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use warden_proto::{ActionKind, StreamKind, TelemetrySample};

pub use battery::BatteryPolicy;
pub use deadline::{BoundedDuration, Deadline};
pub use gnss::GpsQualityPolicy;
pub use mission::MissionProgressPolicy;
pub use thermal::{TemperatureCeilingPolicy, TemperatureStreakPolicy, THERMAL_ADVISORY_FALLBACK};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No intervention for this sample.
    Continue,
    Act(ActionKind),
    /// Same as `Act`, logged with higher severity.
    Escalate(ActionKind),
}

impl Decision {
    pub fn is_continue(&self) -> bool {
        matches!(self, Decision::Continue)
    }

    pub fn action(&self) -> Option<ActionKind> {
        match self {
            Decision::Continue => None,
            Decision::Act(kind) | Decision::Escalate(kind) => Some(*kind),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Continue => f.write_str("continue"),
            Decision::Act(kind) => write!(f, "act({})", kind),
            Decision::Escalate(kind) => write!(f, "escalate({})", kind),
        }
    }
}

/// A safety rule bound to one telemetry stream.
///
/// Each instance owns its rolling state; build one instance per watcher.
/// Samples of another stream kind must yield [`Decision::Continue`].
#[async_trait]
pub trait Policy: Send {
    fn name(&self) -> &'static str;

    fn stream(&self) -> StreamKind;

    /// True when a decision means the planned mission is finished rather
    /// than that something went wrong.
    fn completes_mission(&self) -> bool {
        false
    }

    async fn evaluate(&mut self, sample: &TelemetrySample) -> Decision;
}

/// Thresholds shared by all policies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub min_satellites: u8,
    /// 3 = 3D fix
    pub min_fix_type: u8,
    pub hdop_threshold: Option<f32>,
    /// Continuous good GPS needed before a later degradation counts as in-flight loss.
    pub gps_confirm_s: u64,
    pub gps_action_before_confirm: ActionKind,
    pub gps_action_after_confirm: ActionKind,
    /// Land below this remaining-charge fraction.
    pub battery_fraction: f32,
    pub temp_ceiling_c: f32,
    pub temp_low_c: f32,
    pub temp_streak_limit: u32,
    pub hover_deadline_s: Option<u64>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            min_satellites: 6,
            min_fix_type: 3,
            hdop_threshold: None,
            gps_confirm_s: 0,
            gps_action_before_confirm: ActionKind::Land,
            gps_action_after_confirm: ActionKind::Land,
            battery_fraction: 0.30,
            temp_ceiling_c: 60.0,
            temp_low_c: 0.0,
            temp_streak_limit: 5,
            hover_deadline_s: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_actions() {
        assert_eq!(Decision::Continue.action(), None);
        assert_eq!(Decision::Act(ActionKind::Land).action(), Some(ActionKind::Land));
        assert_eq!(Decision::Escalate(ActionKind::ReturnToLaunch).action(), Some(ActionKind::ReturnToLaunch));
        assert_eq!(Decision::Escalate(ActionKind::ReturnToLaunch).to_string(), "escalate(return_to_launch)");
    }

    #[test]
    fn partial_safety_section_keeps_defaults() {
        let cfg: SafetyConfig = toml::from_str(
            "min_satellites = 8\nhdop_threshold = 2.5\ngps_action_after_confirm = \"return_to_launch\"\n",
        )
        .unwrap();
        assert_eq!(cfg.min_satellites, 8);
        assert_eq!(cfg.hdop_threshold, Some(2.5));
        assert_eq!(cfg.gps_action_after_confirm, ActionKind::ReturnToLaunch);
        assert_eq!(cfg.min_fix_type, 3);
        assert_eq!(cfg.temp_streak_limit, 5);
        assert_eq!(cfg.battery_fraction, 0.30);
    }
}
