use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use warden_fc::{ActionDispatcher, CancelToken, Delivery, Dispatch, SamplingPolicy, VehicleError};
use warden_policy::{doctor, Decision};
use warden_proto::{ActionKind, HealthState, MissionItem, MissionPlan, PlanError, StreamKind, TelemetrySample};

use crate::journal::Journal;
use crate::watcher::{self, Trigger, WatcherExit, WatcherHandle, WatcherOutcome, WatcherSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    AwaitingReadiness,
    Airborne,
    Terminating,
    Done,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::AwaitingReadiness => "awaiting_readiness",
            SessionPhase::Airborne => "airborne",
            SessionPhase::Terminating => "terminating",
            SessionPhase::Done => "done",
        })
    }
}

/// Health bits that must all be set before arming.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub global_position: bool,
    pub home_position: bool,
    pub gyrometer_calibration: bool,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self { global_position: true, home_position: true, gyrometer_calibration: false }
    }
}

impl ReadinessConfig {
    pub fn is_satisfied(&self, h: &HealthState) -> bool {
        (!self.global_position || h.global_position_ok)
            && (!self.home_position || h.home_position_ok)
            && (!self.gyrometer_calibration || h.gyrometer_calibration_ok)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub takeoff_alt_m: f32,
    /// Hover time after takeoff before the mission starts and watchers run.
    pub settle_s: u64,
    pub connect_timeout_s: u64,
    pub ready_timeout_s: u64,
    pub readiness: ReadinessConfig,
    pub journal_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            takeoff_alt_m: 2.5,
            settle_s: 5,
            connect_timeout_s: 30,
            ready_timeout_s: 60,
            readiness: ReadinessConfig::default(),
            journal_path: None,
        }
    }
}

/// Square survey anchored at the launch position.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SquarePattern {
    pub size_m: f64,
    #[serde(default = "default_pattern_alt")]
    pub altitude_m: f32,
    #[serde(default = "default_pattern_speed")]
    pub speed_m_s: f32,
}

fn default_pattern_alt() -> f32 { 10.0 }
fn default_pattern_speed() -> f32 { 3.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct MissionConfig {
    /// Let the vehicle fly home on its own after the last item.
    #[serde(default)]
    pub return_to_launch_after: bool,
    #[serde(default = "default_on_complete")]
    pub on_complete: ActionKind,
    #[serde(default)]
    pub items: Vec<MissionItem>,
    /// Used when `items` is empty.
    pub square: Option<SquarePattern>,
}

fn default_on_complete() -> ActionKind { ActionKind::Land }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    LandedByPolicy,
    LandedByDeadline,
    LandedByMissionCompletion,
    ReturnedToLaunchByPolicy,
}

impl SessionOutcome {
    fn from_winner(winner: &WatcherOutcome) -> Self {
        if winner.trigger == Trigger::Deadline {
            return SessionOutcome::LandedByDeadline;
        }
        if winner.trigger == Trigger::MissionComplete {
            return SessionOutcome::LandedByMissionCompletion;
        }
        match winner.decision.action() {
            Some(ActionKind::ReturnToLaunch) => SessionOutcome::ReturnedToLaunchByPolicy,
            _ => SessionOutcome::LandedByPolicy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub watcher: String,
    pub decision: Decision,
    pub trigger: Trigger,
    pub dispatch: Dispatch,
    /// Sibling watchers stopped after the winner decided.
    pub cancelled: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("{what} not reached within {after:?}")]
    ReadinessTimeout { what: &'static str, after: Duration },

    #[error(transparent)]
    Vehicle(#[from] VehicleError),

    #[error("no watchers configured")]
    NoWatchers,

    #[error("invalid config: {0}")]
    Config(String),
}

impl From<PlanError> for SupervisorError {
    fn from(e: PlanError) -> Self {
        SupervisorError::Vehicle(VehicleError::InvalidMission(e))
    }
}

fn startup_error(e: VehicleError, after: Duration) -> SupervisorError {
    match e {
        VehicleError::Timeout(what) => SupervisorError::ReadinessTimeout { what, after },
        other => SupervisorError::Vehicle(other),
    }
}

/// Drives one supervised flight: readiness, takeoff, watchers, and the
/// single terminal action.
pub struct Supervisor {
    dispatcher: Arc<ActionDispatcher>,
    session: SessionConfig,
    mission: Option<MissionConfig>,
    journal: Journal,
    phase: watch::Sender<SessionPhase>,
}

impl Supervisor {
    pub fn new(dispatcher: Arc<ActionDispatcher>, session: SessionConfig) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Connecting);
        Self { dispatcher, session, mission: None, journal: Journal::disabled(), phase }
    }

    pub fn with_mission(mut self, mission: MissionConfig) -> Self {
        self.mission = Some(mission);
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn phases(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    async fn enter(&self, phase: SessionPhase) {
        self.phase.send_replace(phase);
        self.journal.record(&format!("session: {}", phase)).await;
    }

    /// Full session. Fails before takeoff if the vehicle never becomes ready.
    pub async fn run(&self, watchers: Vec<WatcherSpec>) -> Result<SessionReport, SupervisorError> {
        if watchers.is_empty() {
            return Err(SupervisorError::NoWatchers);
        }
        if let Some(m) = &self.mission {
            doctor::check_completion_action(m.on_complete, m.return_to_launch_after)
                .map_err(|e| SupervisorError::Config(e.to_string()))?;
        }

        self.enter(SessionPhase::Connecting).await;
        let connect_timeout = Duration::from_secs(self.session.connect_timeout_s);
        if let Err(e) = self.dispatcher.wait_until_connected(connect_timeout).await {
            self.journal.alert(&format!("session: {}", e)).await;
            return Err(startup_error(e, connect_timeout));
        }

        self.enter(SessionPhase::AwaitingReadiness).await;
        let ready_timeout = Duration::from_secs(self.session.ready_timeout_s);
        let readiness = self.session.readiness;
        if let Err(e) = self.dispatcher.wait_until_healthy(move |h| readiness.is_satisfied(h), ready_timeout).await {
            self.journal.alert(&format!("session: {}", e)).await;
            return Err(startup_error(e, ready_timeout));
        }

        // Anchor a pattern mission before we leave the ground.
        let plan = match &self.mission {
            Some(m) => Some(self.plan_for(m, ready_timeout).await?),
            None => None,
        };

        self.dispatcher.arm_and_takeoff(self.session.takeoff_alt_m).await?;
        self.journal.record(&format!("session: takeoff to {:.1} m", self.session.takeoff_alt_m)).await;
        tokio::time::sleep(Duration::from_secs(self.session.settle_s)).await;

        if let (Some(m), Some(plan)) = (&self.mission, plan) {
            self.dispatcher.set_return_to_launch_after_mission(m.return_to_launch_after).await?;
            let items = plan.len();
            self.dispatcher.upload_mission(plan).await?;
            self.dispatcher.start_mission().await?;
            self.journal.record(&format!("session: mission of {} items started", items)).await;
        }

        self.supervise(watchers).await
    }

    async fn plan_for(&self, m: &MissionConfig, timeout: Duration) -> Result<MissionPlan, SupervisorError> {
        if !m.items.is_empty() {
            return Ok(MissionPlan::new(m.items.clone())?);
        }
        let Some(square) = m.square else {
            return Err(PlanError::Empty.into());
        };

        let cancel = CancelToken::new();
        let mut sub = self.dispatcher.telemetry().subscribe(StreamKind::Position, SamplingPolicy::EverySample, cancel);
        let launch = match tokio::time::timeout(timeout, sub.next()).await {
            Ok(Delivery::Sample(TelemetrySample::Position(p))) => p,
            Ok(Delivery::Failed(f)) => {
                return Err(VehicleError::Telemetry(warden_fc::TelemetryError::Transport(f.reason)).into())
            }
            _ => return Err(SupervisorError::ReadinessTimeout { what: "launch position", after: timeout }),
        };
        info!(lat = launch.latitude_deg, lon = launch.longitude_deg, "session: launch point");
        Ok(MissionPlan::square(
            launch.latitude_deg,
            launch.longitude_deg,
            square.size_m,
            square.altitude_m,
            square.speed_m_s,
        )?)
    }

    /// A winner must put the vehicle on its way down. The only exception is
    /// mission completion when the vehicle flies home by itself.
    fn ends_flight(&self, outcome: &WatcherOutcome) -> bool {
        match outcome.decision.action() {
            Some(kind) if kind.is_terminal() => true,
            _ => {
                outcome.trigger == Trigger::MissionComplete
                    && self.mission.as_ref().map_or(false, |m| m.return_to_launch_after)
            }
        }
    }

    /// Airborne part only: race the watchers, act on the first decision,
    /// stop the rest.
    pub async fn supervise(&self, watchers: Vec<WatcherSpec>) -> Result<SessionReport, SupervisorError> {
        if watchers.is_empty() {
            return Err(SupervisorError::NoWatchers);
        }
        self.enter(SessionPhase::Airborne).await;

        let hub = self.dispatcher.telemetry();
        let mut tasks = JoinSet::new();
        let handles: Vec<WatcherHandle> = watchers.into_iter().map(|spec| watcher::spawn(spec, &hub, &mut tasks)).collect();
        self.journal
            .record(&format!(
                "session: watching with {}",
                handles.iter().map(|h| h.name()).collect::<Vec<_>>().join(", ")
            ))
            .await;

        let winner = loop {
            match tasks.join_next().await {
                Some(Ok(WatcherExit::Decided(outcome))) if self.ends_flight(&outcome) => break outcome,
                Some(Ok(WatcherExit::Decided(outcome))) => {
                    warn!(
                        watcher = %outcome.watcher,
                        decision = %outcome.decision,
                        "session: decision cannot end the flight, still watching"
                    );
                    self.journal
                        .alert(&format!("session: {} decided {}, ignored", outcome.watcher, outcome.decision))
                        .await;
                }
                Some(Ok(WatcherExit::Cancelled { watcher })) => debug!(watcher = %watcher, "session: watcher left early"),
                Some(Err(e)) => {
                    error!("session: watcher task failed: {}", e);
                    break WatcherOutcome {
                        watcher: "<unknown>".into(),
                        policy: "<unknown>",
                        decision: Decision::Act(ActionKind::Land),
                        trigger: Trigger::Panic,
                    };
                }
                None => {
                    error!("session: every watcher stopped without deciding");
                    break WatcherOutcome {
                        watcher: "<none>".into(),
                        policy: "<none>",
                        decision: Decision::Act(ActionKind::Land),
                        trigger: Trigger::StreamFailure,
                    };
                }
            }
        };

        self.enter(SessionPhase::Terminating).await;
        for h in &handles {
            h.cancel();
        }
        self.journal
            .alert(&format!("session: {} decided {} ({:?})", winner.watcher, winner.decision, winner.trigger))
            .await;

        let action = winner.decision.action().unwrap_or(ActionKind::None);
        let dispatched = self.dispatcher.issue(action).await;

        let mut cancelled = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(WatcherExit::Cancelled { .. }) => cancelled += 1,
                Ok(WatcherExit::Decided(late)) => {
                    debug!(watcher = %late.watcher, decision = %late.decision, "session: late decision discarded");
                    cancelled += 1;
                }
                Err(e) => error!("session: watcher task failed during shutdown: {}", e),
            }
        }

        let dispatch = match dispatched {
            Ok(d) => d,
            Err(e) => {
                self.journal.alert(&format!("session: {} command failed: {}", action, e)).await;
                self.enter(SessionPhase::Done).await;
                return Err(e.into());
            }
        };

        let outcome = SessionOutcome::from_winner(&winner);
        self.journal.record(&format!("session: {:?}, {:?}, {} watchers stopped", outcome, dispatch, cancelled)).await;
        self.enter(SessionPhase::Done).await;

        Ok(SessionReport {
            outcome,
            watcher: winner.watcher,
            decision: winner.decision,
            trigger: winner.trigger,
            dispatch,
            cancelled,
        })
    }
}
