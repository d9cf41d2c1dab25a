use std::time::Duration;
use tokio::time::Instant;
use warden_proto::ActionKind;

use crate::Decision;

/// Overall time limit that can wrap any watcher.
#[derive(Debug, Clone, Copy)]
pub struct BoundedDuration {
    limit: Duration,
}

impl BoundedDuration {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Starts the clock now.
    pub fn start(&self) -> Deadline {
        Deadline { at: Instant::now() + self.limit }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub async fn expired(&self) {
        tokio::time::sleep_until(self.at).await
    }

    /// What the watcher does when the deadline wins.
    pub fn decision(&self) -> Decision {
        Decision::Act(ActionKind::Land)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_at_the_limit_and_not_before() {
        let deadline = BoundedDuration::from_secs(15).start();

        tokio::time::advance(Duration::from_millis(14_999)).await;
        assert!(!deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::from_millis(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.decision(), Decision::Act(ActionKind::Land));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_future_resolves_at_the_deadline() {
        let start = Instant::now();
        let deadline = BoundedDuration::from_secs(15).start();
        deadline.expired().await;
        assert!(start.elapsed() >= Duration::from_secs(15));
    }
}
