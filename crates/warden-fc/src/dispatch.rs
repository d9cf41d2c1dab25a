use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use warden_proto::{ActionKind, HealthState, MissionPlan, StreamKind, TelemetrySample};

use crate::error::{TelemetryError, VehicleError};
use crate::mav::MavVehicle;
use crate::safety::TerminalLatch;
use crate::telemetry::TelemetryHub;
use crate::vehicle::Vehicle;
use crate::VehicleConfig;

/// What happened to a terminal action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Issued(ActionKind),
    /// Another terminal action got there first; nothing was sent.
    AlreadyActed(ActionKind),
    /// `ActionKind::None`: nothing to send.
    Skipped,
}

/// Sends commands to the vehicle. At most one terminal action (land or
/// return-to-launch) is ever forwarded per dispatcher.
pub struct ActionDispatcher {
    vehicle: Arc<dyn Vehicle>,
    latch: TerminalLatch,
    plan: Mutex<Option<MissionPlan>>,
}

impl ActionDispatcher {
    pub fn new(vehicle: Arc<dyn Vehicle>) -> Self {
        Self { vehicle, latch: TerminalLatch::new(), plan: Mutex::new(None) }
    }

    /// Open the MAVLink link described by `cfg`.
    pub async fn connect(cfg: &VehicleConfig) -> Result<Self, VehicleError> {
        let vehicle = MavVehicle::connect(cfg).await?;
        Ok(Self::new(Arc::new(vehicle)))
    }

    pub fn telemetry(&self) -> TelemetryHub {
        TelemetryHub::new(self.vehicle.clone())
    }

    pub async fn wait_until_connected(&self, timeout: Duration) -> Result<(), VehicleError> {
        self.wait_for(StreamKind::ConnectionState, "vehicle connection", timeout, |s| {
            matches!(s, TelemetrySample::ConnectionState { connected: true })
        })
        .await?;
        info!("dispatch: vehicle connected");
        Ok(())
    }

    pub async fn wait_until_healthy<F>(&self, ready: F, timeout: Duration) -> Result<HealthState, VehicleError>
    where
        F: Fn(&HealthState) -> bool + Send + Sync,
    {
        let sample = self
            .wait_for(StreamKind::Health, "vehicle readiness", timeout, |s| match s {
                TelemetrySample::Health(h) => ready(h),
                _ => false,
            })
            .await?;
        match sample {
            TelemetrySample::Health(h) => {
                info!(?h, "dispatch: vehicle ready");
                Ok(h)
            }
            _ => Err(VehicleError::Telemetry(TelemetryError::Decode("health sample expected".into()))),
        }
    }

    async fn wait_for<F>(
        &self,
        kind: StreamKind,
        what: &'static str,
        timeout: Duration,
        done: F,
    ) -> Result<TelemetrySample, VehicleError>
    where
        F: Fn(&TelemetrySample) -> bool + Send + Sync,
    {
        let mut source = self.vehicle.samples(kind);
        let search = async {
            while let Some(item) = source.next().await {
                match item {
                    Ok(sample) if done(&sample) => return Ok(sample),
                    Ok(_) => {}
                    Err(e) if e.is_recoverable() => warn!("dispatch: {} while waiting for {}", e, what),
                    Err(e) => return Err(VehicleError::from(e)),
                }
            }
            Err(VehicleError::Telemetry(TelemetryError::Closed))
        };
        tokio::time::timeout(timeout, search).await.map_err(|_| VehicleError::Timeout(what))?
    }

    pub async fn arm_and_takeoff(&self, altitude_m: f32) -> Result<(), VehicleError> {
        info!(altitude_m, "dispatch: arming");
        self.vehicle.arm().await?;
        info!(altitude_m, "dispatch: taking off");
        self.vehicle.takeoff(altitude_m).await
    }

    pub async fn set_return_to_launch_after_mission(&self, enable: bool) -> Result<(), VehicleError> {
        self.vehicle.set_return_to_launch_after_mission(enable).await
    }

    /// Upload and keep the plan for the rest of the session.
    pub async fn upload_mission(&self, plan: MissionPlan) -> Result<(), VehicleError> {
        info!(items = plan.len(), "dispatch: uploading mission");
        self.vehicle.upload_mission(&plan).await?;
        *self.plan.lock().unwrap() = Some(plan);
        Ok(())
    }

    pub fn mission(&self) -> Option<MissionPlan> {
        self.plan.lock().unwrap().clone()
    }

    pub async fn start_mission(&self) -> Result<(), VehicleError> {
        info!("dispatch: starting mission");
        self.vehicle.start_mission().await
    }

    pub async fn land(&self) -> Result<Dispatch, VehicleError> {
        self.issue(ActionKind::Land).await
    }

    pub async fn return_to_launch(&self) -> Result<Dispatch, VehicleError> {
        self.issue(ActionKind::ReturnToLaunch).await
    }

    /// Forward a terminal action unless one was already issued. The latch is
    /// claimed before the vehicle is contacted, so a failed send still counts.
    pub async fn issue(&self, kind: ActionKind) -> Result<Dispatch, VehicleError> {
        if !kind.is_terminal() {
            return Ok(Dispatch::Skipped);
        }
        if let Err(first) = self.latch.claim(kind) {
            info!(requested = %kind, %first, "dispatch: terminal action already issued, ignoring");
            return Ok(Dispatch::AlreadyActed(first));
        }

        warn!(action = %kind, "dispatch: issuing terminal action");
        match kind {
            ActionKind::ReturnToLaunch => self.vehicle.return_to_launch().await?,
            _ => self.vehicle.land().await?,
        }
        Ok(Dispatch::Issued(kind))
    }

    pub fn terminal_action(&self) -> Option<ActionKind> {
        self.latch.claimed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ScriptedVehicle, VehicleCommand};
    use warden_proto::MissionItem;

    fn dispatcher(v: ScriptedVehicle) -> (Arc<ScriptedVehicle>, ActionDispatcher) {
        let v = Arc::new(v);
        (v.clone(), ActionDispatcher::new(v))
    }

    #[tokio::test]
    async fn second_terminal_call_is_a_noop() {
        let (v, d) = dispatcher(ScriptedVehicle::new());
        assert_eq!(d.land().await.unwrap(), Dispatch::Issued(ActionKind::Land));
        assert_eq!(d.land().await.unwrap(), Dispatch::AlreadyActed(ActionKind::Land));
        assert_eq!(d.return_to_launch().await.unwrap(), Dispatch::AlreadyActed(ActionKind::Land));
        assert_eq!(d.issue(ActionKind::None).await.unwrap(), Dispatch::Skipped);
        assert_eq!(v.commands(), vec![VehicleCommand::Land]);
        assert_eq!(d.terminal_action(), Some(ActionKind::Land));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_reach_the_vehicle_once() {
        let (v, d) = dispatcher(ScriptedVehicle::new());
        let d = Arc::new(d);
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let d = d.clone();
                tokio::spawn(async move {
                    let kind = if i % 3 == 0 { ActionKind::ReturnToLaunch } else { ActionKind::Land };
                    d.issue(kind).await.unwrap()
                })
            })
            .collect();
        let mut issued = 0;
        for t in tasks {
            if matches!(t.await.unwrap(), Dispatch::Issued(_)) {
                issued += 1;
            }
        }
        assert_eq!(issued, 1);
        assert_eq!(v.terminal_commands().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_still_holds_the_latch() {
        let (v, d) = dispatcher(ScriptedVehicle::new().reject("land"));
        assert!(matches!(d.land().await, Err(VehicleError::CommandRejected { command: "land", .. })));
        assert_eq!(d.return_to_launch().await.unwrap(), Dispatch::AlreadyActed(ActionKind::Land));
        assert!(v.terminal_commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_waits_time_out() {
        let (_v, d) = dispatcher(ScriptedVehicle::new().repeat(
            TelemetrySample::ConnectionState { connected: false },
            Duration::from_millis(100),
        ));
        let err = d.wait_until_connected(Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, VehicleError::Timeout("vehicle connection")));
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_waits_for_predicate() {
        let not_ready = HealthState { global_position_ok: true, ..Default::default() };
        let ready = HealthState { global_position_ok: true, gyrometer_calibration_ok: true, ..Default::default() };
        let (_v, d) = dispatcher(ScriptedVehicle::new().script(
            StreamKind::Health,
            Duration::from_millis(100),
            vec![Ok(TelemetrySample::Health(not_ready)), Ok(TelemetrySample::Health(ready))],
        ));
        let h = d
            .wait_until_healthy(|h| h.global_position_ok && h.gyrometer_calibration_ok, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(h, ready);
    }

    #[tokio::test]
    async fn mission_setup_is_forwarded_and_plan_kept() {
        let (v, d) = dispatcher(ScriptedVehicle::new());
        let plan = MissionPlan::new(vec![
            MissionItem::waypoint(47.3977, 8.5456, 10.0, 3.0),
            MissionItem::waypoint(47.3978, 8.5456, 10.0, 3.0),
        ])
        .unwrap();
        d.arm_and_takeoff(10.0).await.unwrap();
        d.set_return_to_launch_after_mission(true).await.unwrap();
        d.upload_mission(plan.clone()).await.unwrap();
        d.start_mission().await.unwrap();

        assert_eq!(d.mission().map(|p| p.len()), Some(plan.len()));
        assert_eq!(
            v.commands(),
            vec![
                VehicleCommand::Arm,
                VehicleCommand::Takeoff(10.0),
                VehicleCommand::ReturnToLaunchAfterMission(true),
                VehicleCommand::UploadMission(2),
                VehicleCommand::StartMission,
            ]
        );
    }
}
