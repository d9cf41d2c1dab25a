use async_trait::async_trait;
use tracing::info;
use warden_proto::{ActionKind, StreamKind, TelemetrySample};

use crate::{Decision, Policy};

/// Finishes the session once the vehicle reports the last waypoint as current.
pub struct MissionProgressPolicy {
    on_complete: ActionKind,
}

impl MissionProgressPolicy {
    pub fn new(on_complete: ActionKind) -> Self {
        Self { on_complete }
    }
}

#[async_trait]
impl Policy for MissionProgressPolicy {
    fn name(&self) -> &'static str {
        "mission_progress"
    }

    fn stream(&self) -> StreamKind {
        StreamKind::MissionProgress
    }

    fn completes_mission(&self) -> bool {
        true
    }

    async fn evaluate(&mut self, sample: &TelemetrySample) -> Decision {
        match sample {
            TelemetrySample::MissionProgress { current, total } if *total > 0 && *current >= *total - 1 => {
                info!("mission: reached waypoint {}/{}", current.saturating_add(1), total);
                Decision::Act(self.on_complete)
            }
            _ => Decision::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_on_the_last_index() {
        let mut p = MissionProgressPolicy::new(ActionKind::Land);
        for current in 0..4 {
            let d = p.evaluate(&TelemetrySample::MissionProgress { current, total: 5 }).await;
            assert_eq!(d, Decision::Continue, "current={}", current);
        }
        let d = p.evaluate(&TelemetrySample::MissionProgress { current: 4, total: 5 }).await;
        assert_eq!(d, Decision::Act(ActionKind::Land));
    }

    #[tokio::test]
    async fn index_at_the_top_of_the_range_completes() {
        let mut p = MissionProgressPolicy::new(ActionKind::Land);
        let d = p.evaluate(&TelemetrySample::MissionProgress { current: u32::MAX, total: u32::MAX }).await;
        assert_eq!(d, Decision::Act(ActionKind::Land));
        let d = p.evaluate(&TelemetrySample::MissionProgress { current: u32::MAX - 2, total: u32::MAX }).await;
        assert_eq!(d, Decision::Continue);
        assert!(p.completes_mission());
    }

    #[tokio::test]
    async fn empty_progress_never_completes() {
        let mut p = MissionProgressPolicy::new(ActionKind::ReturnToLaunch);
        let d = p.evaluate(&TelemetrySample::MissionProgress { current: 0, total: 0 }).await;
        assert_eq!(d, Decision::Continue);
    }
}
