use anyhow::Result;
use warden_proto::ActionKind;

use crate::SafetyConfig;

pub fn check_safety(cfg: &SafetyConfig) -> Result<()> {
    anyhow::ensure!(cfg.min_satellites >= 4, "safety.min_satellites too low");
    anyhow::ensure!(cfg.min_fix_type <= 6, "safety.min_fix_type should be 0..6");
    if let Some(hdop) = cfg.hdop_threshold {
        anyhow::ensure!(hdop > 0.5 && hdop < 10.0, "safety.hdop_threshold out of range");
    }
    anyhow::ensure!(
        cfg.gps_action_before_confirm.is_terminal() && cfg.gps_action_after_confirm.is_terminal(),
        "safety.gps_action_* must be land or return_to_launch"
    );
    anyhow::ensure!(
        cfg.battery_fraction > 0.0 && cfg.battery_fraction < 1.0,
        "safety.battery_fraction should be between 0 and 1"
    );
    anyhow::ensure!(cfg.temp_low_c < cfg.temp_ceiling_c, "safety.temp_low_c must be below temp_ceiling_c");
    anyhow::ensure!(cfg.temp_streak_limit >= 1, "safety.temp_streak_limit must be >= 1");
    if let Some(secs) = cfg.hover_deadline_s {
        anyhow::ensure!(secs >= 1, "safety.hover_deadline_s must be >= 1");
    }
    Ok(())
}

/// Mission completion must end the flight, either by our command or by the
/// vehicle's own return-after-mission.
pub fn check_completion_action(action: ActionKind, return_to_launch_after: bool) -> Result<()> {
    anyhow::ensure!(
        action.is_terminal() || return_to_launch_after,
        "mission.on_complete = \"none\" needs mission.return_to_launch_after = true"
    );
    Ok(())
}
