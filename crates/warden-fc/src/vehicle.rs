use async_trait::async_trait;
use futures::stream::BoxStream;
use warden_proto::{MissionPlan, StreamKind, TelemetrySample};

use crate::error::{TelemetryError, VehicleError};

/// Raw per-kind sample feed from a vehicle. Every call to
/// [`Vehicle::samples`] starts a fresh one.
pub type SampleSource = BoxStream<'static, Result<TelemetrySample, TelemetryError>>;

/// Command and telemetry interface of a connected vehicle.
///
/// Commands are requests: they return once the vehicle accepted them, not once
/// the manoeuvre finished. Completion shows up in telemetry.
#[async_trait]
pub trait Vehicle: Send + Sync {
    /// Open an independent feed of samples of one kind.
    fn samples(&self, kind: StreamKind) -> SampleSource;

    async fn arm(&self) -> Result<(), VehicleError>;

    async fn takeoff(&self, altitude_m: f32) -> Result<(), VehicleError>;

    async fn land(&self) -> Result<(), VehicleError>;

    async fn return_to_launch(&self) -> Result<(), VehicleError>;

    async fn upload_mission(&self, plan: &MissionPlan) -> Result<(), VehicleError>;

    async fn start_mission(&self) -> Result<(), VehicleError>;

    /// Must be set before `upload_mission` to take effect.
    async fn set_return_to_launch_after_mission(&self, enable: bool) -> Result<(), VehicleError>;
}
