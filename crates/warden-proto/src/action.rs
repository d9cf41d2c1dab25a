use serde::{Deserialize, Serialize};
use std::fmt;

/// Corrective command a policy can ask for. `Land` and `ReturnToLaunch` are
/// terminal: they end the supervised session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Land,
    ReturnToLaunch,
    None,
}

impl ActionKind {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ActionKind::None)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Land => "land",
            ActionKind::ReturnToLaunch => "return_to_launch",
            ActionKind::None => "none",
        })
    }
}
