//! Session coordinator: runs the watchers for one flight and turns the first
//! decision into exactly one terminal action.

pub mod journal;
pub mod supervisor;
pub mod watcher;

pub use journal::Journal;
pub use supervisor::{
    MissionConfig, ReadinessConfig, SessionConfig, SessionOutcome, SessionPhase, SessionReport, SquarePattern,
    Supervisor, SupervisorError,
};
pub use watcher::{
    PolicyContext, PolicyKind, Trigger, WatcherConfig, WatcherExit, WatcherHandle, WatcherOutcome, WatcherSpec,
    WatcherState,
};
