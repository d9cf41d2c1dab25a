use async_trait::async_trait;
use tracing::warn;
use warden_proto::{ActionKind, StreamKind, TelemetrySample};

use crate::{Decision, Policy, SafetyConfig};

pub struct BatteryPolicy {
    min_fraction: f32,
}

impl BatteryPolicy {
    pub fn new(cfg: &SafetyConfig) -> Self {
        Self { min_fraction: cfg.battery_fraction }
    }
}

#[async_trait]
impl Policy for BatteryPolicy {
    fn name(&self) -> &'static str {
        "battery"
    }

    fn stream(&self) -> StreamKind {
        StreamKind::Battery
    }

    async fn evaluate(&mut self, sample: &TelemetrySample) -> Decision {
        match sample {
            TelemetrySample::Battery { remaining } if *remaining < self.min_fraction => {
                warn!("battery: {:.0}% remaining, below {:.0}%", remaining * 100.0, self.min_fraction * 100.0);
                Decision::Act(ActionKind::Land)
            }
            _ => Decision::Continue,
        }
    }
}
