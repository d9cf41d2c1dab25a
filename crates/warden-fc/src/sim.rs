//! In-process vehicle driven by scripted telemetry. Used for dry runs and
//! tests; records every command it receives.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use warden_proto::{MissionPlan, StreamKind, TelemetrySample};

use crate::error::{TelemetryError, VehicleError};
use crate::vehicle::{SampleSource, Vehicle};

#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    Arm,
    Takeoff(f32),
    Land,
    ReturnToLaunch,
    UploadMission(usize),
    StartMission,
    ReturnToLaunchAfterMission(bool),
}

impl VehicleCommand {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VehicleCommand::Land | VehicleCommand::ReturnToLaunch)
    }
}

#[derive(Debug, Clone)]
enum Script {
    /// Play once, then stay silent.
    Once(Vec<Result<TelemetrySample, TelemetryError>>),
    Forever(TelemetrySample),
}

#[derive(Debug, Clone)]
struct Feed {
    period: Duration,
    script: Script,
}

#[derive(Debug, Default)]
pub struct ScriptedVehicle {
    feeds: HashMap<StreamKind, Feed>,
    rejected: HashSet<&'static str>,
    commands: Mutex<Vec<VehicleCommand>>,
}

impl ScriptedVehicle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each subscription replays `items`, one every `period`, then goes quiet.
    pub fn script(
        mut self,
        kind: StreamKind,
        period: Duration,
        items: Vec<Result<TelemetrySample, TelemetryError>>,
    ) -> Self {
        self.feeds.insert(kind, Feed { period, script: Script::Once(items) });
        self
    }

    /// Repeat one sample every `period` for as long as the subscription lives.
    pub fn repeat(mut self, sample: TelemetrySample, period: Duration) -> Self {
        assert!(!period.is_zero(), "repeating feed needs a period");
        self.feeds.insert(sample.kind(), Feed { period, script: Script::Forever(sample) });
        self
    }

    /// Make the named command ("arm", "takeoff", "land", ...) fail.
    pub fn reject(mut self, command: &'static str) -> Self {
        self.rejected.insert(command);
        self
    }

    pub fn commands(&self) -> Vec<VehicleCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn terminal_commands(&self) -> Vec<VehicleCommand> {
        self.commands().into_iter().filter(VehicleCommand::is_terminal).collect()
    }

    fn record(&self, name: &'static str, cmd: VehicleCommand) -> Result<(), VehicleError> {
        if self.rejected.contains(name) {
            return Err(VehicleError::CommandRejected { command: name, reason: "scripted rejection".into() });
        }
        self.commands.lock().unwrap().push(cmd);
        Ok(())
    }
}

#[async_trait]
impl Vehicle for ScriptedVehicle {
    fn samples(&self, kind: StreamKind) -> SampleSource {
        let Some(feed) = self.feeds.get(&kind).cloned() else {
            return stream::pending().boxed();
        };
        let period = feed.period;
        match feed.script {
            Script::Once(items) => stream::iter(items)
                .then(move |item| async move {
                    if !period.is_zero() {
                        tokio::time::sleep(period).await;
                    }
                    item
                })
                .chain(stream::pending())
                .boxed(),
            Script::Forever(sample) => stream::repeat(sample)
                .then(move |s| async move {
                    tokio::time::sleep(period).await;
                    Ok(s)
                })
                .boxed(),
        }
    }

    async fn arm(&self) -> Result<(), VehicleError> {
        self.record("arm", VehicleCommand::Arm)
    }

    async fn takeoff(&self, altitude_m: f32) -> Result<(), VehicleError> {
        self.record("takeoff", VehicleCommand::Takeoff(altitude_m))
    }

    async fn land(&self) -> Result<(), VehicleError> {
        self.record("land", VehicleCommand::Land)
    }

    async fn return_to_launch(&self) -> Result<(), VehicleError> {
        self.record("return_to_launch", VehicleCommand::ReturnToLaunch)
    }

    async fn upload_mission(&self, plan: &MissionPlan) -> Result<(), VehicleError> {
        self.record("upload_mission", VehicleCommand::UploadMission(plan.len()))
    }

    async fn start_mission(&self) -> Result<(), VehicleError> {
        self.record("start_mission", VehicleCommand::StartMission)
    }

    async fn set_return_to_launch_after_mission(&self, enable: bool) -> Result<(), VehicleError> {
        self.record("set_return_to_launch_after_mission", VehicleCommand::ReturnToLaunchAfterMission(enable))
    }
}
