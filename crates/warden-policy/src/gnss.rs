use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use warden_proto::{ActionKind, GpsInfo, StreamKind, TelemetrySample};

use crate::{Decision, Policy, SafetyConfig};

/// Trips on too few satellites, a weak fix, or (when configured) high HDOP.
///
/// GPS that degrades after it was confirmed good for `gps_confirm_s` is
/// escalated with `gps_action_after_confirm`; before that the plain
/// `gps_action_before_confirm` applies.
pub struct GpsQualityPolicy {
    min_satellites: u8,
    min_fix_type: u8,
    max_hdop: Option<f32>,
    confirm_after: Duration,
    before_confirm: ActionKind,
    after_confirm: ActionKind,

    good_since: Option<Instant>,
    confirmed: bool,
}

impl GpsQualityPolicy {
    pub fn new(cfg: &SafetyConfig) -> Self {
        Self {
            min_satellites: cfg.min_satellites,
            min_fix_type: cfg.min_fix_type,
            max_hdop: cfg.hdop_threshold,
            confirm_after: Duration::from_secs(cfg.gps_confirm_s),
            before_confirm: terminal_or_land("gps_action_before_confirm", cfg.gps_action_before_confirm),
            after_confirm: terminal_or_land("gps_action_after_confirm", cfg.gps_action_after_confirm),
            good_since: None,
            confirmed: false,
        }
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    fn fault(&self, gps: &GpsInfo) -> Option<String> {
        if gps.satellites < self.min_satellites {
            return Some(format!("satellites {} < {}", gps.satellites, self.min_satellites));
        }
        if gps.fix_type < self.min_fix_type {
            return Some(format!("fix type {} < {}", gps.fix_type, self.min_fix_type));
        }
        match self.max_hdop {
            Some(max) if gps.hdop > max => Some(format!("hdop {:.1} > {:.1}", gps.hdop, max)),
            _ => None,
        }
    }
}

/// A GPS fault always ends the flight.
fn terminal_or_land(key: &str, kind: ActionKind) -> ActionKind {
    if kind.is_terminal() {
        return kind;
    }
    warn!("gps: safety.{} = {} cannot end a flight, using land", key, kind);
    ActionKind::Land
}

#[async_trait]
impl Policy for GpsQualityPolicy {
    fn name(&self) -> &'static str {
        "gps_quality"
    }

    fn stream(&self) -> StreamKind {
        StreamKind::GpsInfo
    }

    async fn evaluate(&mut self, sample: &TelemetrySample) -> Decision {
        let TelemetrySample::GpsInfo(gps) = sample else { return Decision::Continue };

        if let Some(reason) = self.fault(gps) {
            self.good_since = None;
            return if self.confirmed {
                warn!(sats = gps.satellites, fix = gps.fix_type, hdop = gps.hdop,
                      "gps: degraded after confirmation ({})", reason);
                Decision::Escalate(self.after_confirm)
            } else {
                warn!(sats = gps.satellites, fix = gps.fix_type, hdop = gps.hdop, "gps: poor quality ({})", reason);
                Decision::Act(self.before_confirm)
            };
        }

        let now = Instant::now();
        let since = *self.good_since.get_or_insert(now);
        if !self.confirmed && now.duration_since(since) >= self.confirm_after {
            self.confirmed = true;
            info!(sats = gps.satellites, fix = gps.fix_type, "gps: good fix confirmed");
        }
        Decision::Continue
    }
}
