//! One watcher = one telemetry subscription + one policy instance, running
//! as its own task until it decides, fails, or is cancelled.

use futures::FutureExt;
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use warden_advisory::Advisor;
use warden_fc::{CancelToken, Delivery, SamplingPolicy, Subscription, TelemetryHub};
use warden_policy::{
    BatteryPolicy, BoundedDuration, Deadline, Decision, GpsQualityPolicy, MissionProgressPolicy, Policy,
    SafetyConfig, TemperatureCeilingPolicy, TemperatureStreakPolicy,
};
use warden_proto::ActionKind;

/// Why a watcher stopped with a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Policy,
    /// The mission-progress policy saw the last waypoint.
    MissionComplete,
    Deadline,
    /// The subscription broke; fail-safe landing.
    StreamFailure,
    /// The watcher task panicked; fail-safe landing.
    Panic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatcherOutcome {
    pub watcher: String,
    pub policy: &'static str,
    pub decision: Decision,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatcherExit {
    Decided(WatcherOutcome),
    Cancelled { watcher: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Running,
    Completed(Decision),
    Cancelled,
}

pub struct WatcherSpec {
    pub name: String,
    pub policy: Box<dyn Policy>,
    pub sampling: SamplingPolicy,
    pub deadline: Option<BoundedDuration>,
}

impl WatcherSpec {
    pub fn new(policy: Box<dyn Policy>) -> Self {
        Self {
            name: policy.name().to_string(),
            policy,
            sampling: SamplingPolicy::EverySample,
            deadline: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn sampling(mut self, sampling: SamplingPolicy) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn deadline(mut self, deadline: BoundedDuration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Owner-side view of a spawned watcher.
pub struct WatcherHandle {
    name: String,
    cancel: CancelToken,
    state: watch::Receiver<WatcherState>,
}

impl WatcherHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the watcher to stop at its next suspension point. Idempotent, and
    /// a no-op once the watcher has completed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// Wait until the watcher has left `Running`.
    pub async fn finished(&mut self) -> WatcherState {
        // A dropped sender means the task is gone; its last state stands.
        let _ = self.state.wait_for(|s| *s != WatcherState::Running).await;
        self.state()
    }
}

/// Start `spec` on `tasks`. The deadline clock, if any, starts now.
pub fn spawn(spec: WatcherSpec, hub: &TelemetryHub, tasks: &mut JoinSet<WatcherExit>) -> WatcherHandle {
    let WatcherSpec { name, policy, sampling, deadline } = spec;
    let cancel = CancelToken::new();
    let (state_tx, state_rx) = watch::channel(WatcherState::Running);
    let sub = hub.subscribe(policy.stream(), sampling, cancel.clone());
    let deadline = deadline.map(|d| d.start());

    let token = cancel.clone();
    let watcher = name.clone();
    tasks.spawn(async move {
        let policy_name = policy.name();
        let run = run_watcher(&watcher, policy, sub, deadline, &token);
        let exit = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(exit) => exit,
            Err(_) => {
                error!(watcher = %watcher, "watcher: panicked, treating as land");
                WatcherExit::Decided(WatcherOutcome {
                    watcher: watcher.clone(),
                    policy: policy_name,
                    decision: Decision::Act(ActionKind::Land),
                    trigger: Trigger::Panic,
                })
            }
        };
        state_tx.send_replace(match &exit {
            WatcherExit::Decided(o) => WatcherState::Completed(o.decision),
            WatcherExit::Cancelled { .. } => WatcherState::Cancelled,
        });
        exit
    });

    WatcherHandle { name, cancel, state: state_rx }
}

async fn expiry(deadline: Option<Deadline>) -> Decision {
    match deadline {
        Some(d) => {
            d.expired().await;
            d.decision()
        }
        None => std::future::pending().await,
    }
}

async fn run_watcher(
    name: &str,
    mut policy: Box<dyn Policy>,
    mut sub: Subscription,
    deadline: Option<Deadline>,
    cancel: &CancelToken,
) -> WatcherExit {
    let policy_name = policy.name();
    let on_decision = if policy.completes_mission() { Trigger::MissionComplete } else { Trigger::Policy };
    let decided = move |decision: Decision, trigger: Trigger| {
        WatcherExit::Decided(WatcherOutcome { watcher: name.to_string(), policy: policy_name, decision, trigger })
    };
    info!(watcher = name, policy = policy_name, stream = %sub.kind(), "watcher: started");

    loop {
        let delivery = tokio::select! {
            biased;
            _ = cancel.cancelled() => Delivery::Cancelled,
            decision = expiry(deadline) => {
                warn!(watcher = name, "watcher: deadline reached without a decision");
                return decided(decision, Trigger::Deadline);
            }
            delivery = sub.next() => delivery,
        };

        let sample = match delivery {
            Delivery::Sample(sample) => sample,
            Delivery::Cancelled => {
                debug!(watcher = name, dropped = sub.dropped(), "watcher: cancelled");
                return WatcherExit::Cancelled { watcher: name.to_string() };
            }
            Delivery::Failed(failure) => {
                error!(watcher = name, "watcher: {}, treating as land", failure);
                return decided(Decision::Act(ActionKind::Land), Trigger::StreamFailure);
            }
        };

        let decision = policy.evaluate(&sample).await;
        // A sibling may have won while the policy was busy (advisory call).
        if cancel.is_cancelled() {
            debug!(watcher = name, %decision, "watcher: cancelled during evaluation, decision discarded");
            return WatcherExit::Cancelled { watcher: name.to_string() };
        }
        match decision {
            Decision::Continue => continue,
            Decision::Act(kind) => info!(watcher = name, action = %kind, "watcher: act"),
            Decision::Escalate(kind) => warn!(watcher = name, action = %kind, "watcher: escalate"),
        }
        return decided(decision, on_decision);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Gps,
    Battery,
    /// Temperature ceiling.
    Temperature,
    /// Low-temperature streak with oracle advice.
    TemperatureAdvisory,
    Mission,
}

/// One `[[watchers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    pub policy: PolicyKind,
    pub name: Option<String>,
    /// Throttle: evaluate at most one sample per interval.
    pub interval_ms: Option<u64>,
    pub deadline_s: Option<u64>,
}

/// Shared inputs for building policies from config.
#[derive(Clone)]
pub struct PolicyContext {
    pub safety: SafetyConfig,
    pub advisor: Arc<dyn Advisor>,
    pub on_mission_complete: ActionKind,
}

impl WatcherConfig {
    pub fn build(&self, ctx: &PolicyContext) -> WatcherSpec {
        let policy: Box<dyn Policy> = match self.policy {
            PolicyKind::Gps => Box::new(GpsQualityPolicy::new(&ctx.safety)),
            PolicyKind::Battery => Box::new(BatteryPolicy::new(&ctx.safety)),
            PolicyKind::Temperature => Box::new(TemperatureCeilingPolicy::new(&ctx.safety)),
            PolicyKind::TemperatureAdvisory => {
                Box::new(TemperatureStreakPolicy::new(&ctx.safety, ctx.advisor.clone()))
            }
            PolicyKind::Mission => Box::new(MissionProgressPolicy::new(ctx.on_mission_complete)),
        };

        // Thermal watchers cover the hover window unless they set their own limit.
        let deadline_s = self.deadline_s.or(match self.policy {
            PolicyKind::Temperature | PolicyKind::TemperatureAdvisory => ctx.safety.hover_deadline_s,
            _ => None,
        });

        let mut spec = WatcherSpec::new(policy).sampling(SamplingPolicy::from_interval_ms(self.interval_ms));
        if let Some(name) = &self.name {
            spec = spec.named(name.clone());
        }
        if let Some(secs) = deadline_s {
            spec = spec.deadline(BoundedDuration::from_secs(secs));
        }
        spec
    }
}
