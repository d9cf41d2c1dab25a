use std::time::{Duration, Instant};

/// What the MAVLink reader has learned about the autopilot so far.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    pub connected: bool,
    pub last_heartbeat: Option<Instant>,
    pub gps_fix_type: u8,
    pub home_seen: bool,
    /// AMSL altitude of the launch point, derived from GLOBAL_POSITION_INT.
    pub home_amsl_m: Option<f32>,
    /// Plan waypoint index for every uploaded MAVLink mission item.
    pub mission_index: Vec<u32>,
    pub mission_total: u32,
}

impl LinkStatus {
    pub fn hb_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    /// True when we had a link and the heartbeat has been silent past `timeout`.
    pub fn heartbeat_lost(&self, timeout: Duration) -> bool {
        self.connected && self.hb_age().map(|age| age > timeout).unwrap_or(true)
    }

    /// Map a MISSION_CURRENT sequence number back to the plan waypoint.
    pub fn plan_index(&self, seq: u16) -> u32 {
        self.mission_index
            .get(seq as usize)
            .copied()
            .unwrap_or_else(|| self.mission_total.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_loss_needs_a_prior_link() {
        let mut st = LinkStatus::default();
        assert!(!st.heartbeat_lost(Duration::from_secs(1)));
        st.connected = true;
        st.last_heartbeat = Some(Instant::now());
        assert!(!st.heartbeat_lost(Duration::from_secs(60)));
        st.last_heartbeat = None;
        assert!(st.heartbeat_lost(Duration::from_secs(60)));
    }

    #[test]
    fn plan_index_clamps_unknown_sequences() {
        let st = LinkStatus { mission_index: vec![0, 0, 1, 2, 2], mission_total: 3, ..Default::default() };
        assert_eq!(st.plan_index(1), 0);
        assert_eq!(st.plan_index(3), 2);
        assert_eq!(st.plan_index(40), 2);
    }
}
