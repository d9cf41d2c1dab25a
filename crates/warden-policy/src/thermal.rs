use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use warden_advisory::Advisor;
use warden_proto::{ActionKind, StreamKind, TelemetrySample};

use crate::{Decision, Policy, SafetyConfig};

/// Reply used when the oracle gives no usable answer. Keeps hovering rather
/// than landing on a network hiccup; the low streak still forces a landing.
pub const THERMAL_ADVISORY_FALLBACK: &str = "hover";

/// Lands as soon as the IMU reports a temperature above the ceiling.
pub struct TemperatureCeilingPolicy {
    ceiling_c: f32,
}

impl TemperatureCeilingPolicy {
    pub fn new(cfg: &SafetyConfig) -> Self {
        Self { ceiling_c: cfg.temp_ceiling_c }
    }
}

#[async_trait]
impl Policy for TemperatureCeilingPolicy {
    fn name(&self) -> &'static str {
        "temperature_ceiling"
    }

    fn stream(&self) -> StreamKind {
        StreamKind::Imu
    }

    async fn evaluate(&mut self, sample: &TelemetrySample) -> Decision {
        match sample {
            TelemetrySample::Imu { temperature_c } if *temperature_c > self.ceiling_c => {
                warn!("thermal: {:.2}°C above ceiling {:.1}°C", temperature_c, self.ceiling_c);
                Decision::Act(ActionKind::Land)
            }
            _ => Decision::Continue,
        }
    }
}

pub fn advisory_prompt(temperature_c: f32) -> String {
    format!(
        "The drone's temperature is {:.2}°C. Should it land or continue hovering? \
         Reply with only 'land' or 'hover'.",
        temperature_c
    )
}

/// Counts consecutive samples at or below `temp_low_c`; the streak limit
/// forces a landing without asking anyone. Any warmer sample resets the
/// count and asks the advisor, landing iff the reply mentions "land".
pub struct TemperatureStreakPolicy {
    low_c: f32,
    limit: u32,
    advisor: Arc<dyn Advisor>,
    consecutive_low: u32,
}

impl TemperatureStreakPolicy {
    pub fn new(cfg: &SafetyConfig, advisor: Arc<dyn Advisor>) -> Self {
        Self { low_c: cfg.temp_low_c, limit: cfg.temp_streak_limit, advisor, consecutive_low: 0 }
    }

    pub fn consecutive_low(&self) -> u32 {
        self.consecutive_low
    }
}

#[async_trait]
impl Policy for TemperatureStreakPolicy {
    fn name(&self) -> &'static str {
        "temperature_advisory"
    }

    fn stream(&self) -> StreamKind {
        StreamKind::Imu
    }

    async fn evaluate(&mut self, sample: &TelemetrySample) -> Decision {
        let TelemetrySample::Imu { temperature_c } = sample else { return Decision::Continue };
        let t = *temperature_c;

        if t <= self.low_c {
            self.consecutive_low += 1;
            debug!("thermal: low sample {}/{} ({:.2}°C)", self.consecutive_low, self.limit, t);
            if self.consecutive_low >= self.limit {
                warn!("thermal: {} consecutive samples at or below {:.1}°C, forcing land", self.consecutive_low, self.low_c);
                return Decision::Act(ActionKind::Land);
            }
            return Decision::Continue;
        }

        self.consecutive_low = 0;
        let reply = self.advisor.ask(&advisory_prompt(t), THERMAL_ADVISORY_FALLBACK).await;
        if reply.to_lowercase().contains("land") {
            info!(reply = reply.as_str(), "thermal: advisor recommends landing at {:.2}°C", t);
            Decision::Act(ActionKind::Land)
        } else {
            debug!(reply = reply.as_str(), "thermal: advisor says keep hovering");
            Decision::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned answers and records every prompt.
    struct CannedAdvisor {
        replies: Mutex<Vec<&'static str>>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedAdvisor {
        fn new(replies: &[&'static str]) -> Arc<Self> {
            let mut replies = replies.to_vec();
            replies.reverse();
            Arc::new(Self { replies: Mutex::new(replies), prompts: Mutex::new(Vec::new()) })
        }

        fn asked(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Advisor for CannedAdvisor {
        async fn ask(&self, prompt: &str, fallback: &str) -> String {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies.lock().unwrap().pop().unwrap_or(fallback).to_string()
        }
    }

    fn imu(t: f32) -> TelemetrySample {
        TelemetrySample::Imu { temperature_c: t }
    }

    fn streak_cfg() -> SafetyConfig {
        SafetyConfig { temp_low_c: 0.0, temp_streak_limit: 5, ..Default::default() }
    }

    #[tokio::test]
    async fn ceiling_is_exclusive() {
        let mut p = TemperatureCeilingPolicy::new(&SafetyConfig::default());
        assert_eq!(p.evaluate(&imu(60.0)).await, Decision::Continue);
        assert_eq!(p.evaluate(&imu(60.5)).await, Decision::Act(ActionKind::Land));

        let mut hover = TemperatureCeilingPolicy::new(&SafetyConfig { temp_ceiling_c: 16.0, ..Default::default() });
        assert_eq!(hover.evaluate(&imu(16.2)).await, Decision::Act(ActionKind::Land));
    }

    #[tokio::test]
    async fn five_lows_land_whatever_the_advisor_thinks() {
        let advisor = CannedAdvisor::new(&["hover", "hover", "hover", "hover", "hover"]);
        let mut p = TemperatureStreakPolicy::new(&streak_cfg(), advisor.clone());

        for _ in 0..4 {
            assert_eq!(p.evaluate(&imu(-1.0)).await, Decision::Continue);
        }
        assert_eq!(p.evaluate(&imu(0.0)).await, Decision::Act(ActionKind::Land));
        assert_eq!(advisor.asked(), 0);
    }

    #[tokio::test]
    async fn a_warm_sample_resets_the_streak() {
        let advisor = CannedAdvisor::new(&["hover"]);
        let mut p = TemperatureStreakPolicy::new(&streak_cfg(), advisor.clone());

        for _ in 0..4 {
            p.evaluate(&imu(-2.0)).await;
        }
        assert_eq!(p.evaluate(&imu(3.0)).await, Decision::Continue);
        assert_eq!(p.consecutive_low(), 0);
        assert_eq!(p.evaluate(&imu(-2.0)).await, Decision::Continue);
        assert_eq!(advisor.asked(), 1);
    }

    #[tokio::test]
    async fn advisor_reply_is_matched_on_the_land_token() {
        let advisor = CannedAdvisor::new(&["Land now.", "hover", "I would not land yet"]);
        let mut p = TemperatureStreakPolicy::new(&streak_cfg(), advisor.clone());

        assert_eq!(p.evaluate(&imu(12.0)).await, Decision::Act(ActionKind::Land));
        assert_eq!(p.evaluate(&imu(12.0)).await, Decision::Continue);
        // substring match, negation included
        assert_eq!(p.evaluate(&imu(12.0)).await, Decision::Act(ActionKind::Land));

        let prompts = advisor.prompts.lock().unwrap();
        assert!(prompts[0].starts_with("The drone's temperature is 12.00°C."));
    }

    #[tokio::test]
    async fn exhausted_advisor_falls_back_to_hover() {
        let advisor = CannedAdvisor::new(&[]);
        let mut p = TemperatureStreakPolicy::new(&streak_cfg(), advisor);
        assert_eq!(p.evaluate(&imu(20.0)).await, Decision::Continue);
    }
}
