/// Failure while reading a telemetry source.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TelemetryError {
    /// The link cannot deliver any more samples.
    #[error("telemetry transport failed: {0}")]
    Transport(String),

    /// One sample could not be decoded. The source keeps going.
    #[error("telemetry decode failed: {0}")]
    Decode(String),

    #[error("telemetry source closed")]
    Closed,
}

impl TelemetryError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TelemetryError::Decode(_))
    }
}

/// Errors from the vehicle command interface.
#[derive(Debug, thiserror::Error)]
pub enum VehicleError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{command} rejected by vehicle: {reason}")]
    CommandRejected { command: &'static str, reason: String },

    #[error("mission upload rejected: {0}")]
    MissionRejected(String),

    #[error("Timeout waiting for {0}")]
    Timeout(&'static str),

    #[error("telemetry unavailable: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("invalid mission: {0}")]
    InvalidMission(#[from] warden_proto::PlanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
