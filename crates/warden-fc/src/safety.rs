use std::sync::atomic::{AtomicU8, Ordering};
use warden_proto::ActionKind;

const OPEN: u8 = 0;
const LAND: u8 = 1;
const RTL: u8 = 2;

/// One-shot claim on the single terminal action of a session.
#[derive(Debug, Default)]
pub struct TerminalLatch {
    state: AtomicU8,
}

impl TerminalLatch {
    pub fn new() -> Self {
        Self { state: AtomicU8::new(OPEN) }
    }

    /// Claim the latch for `kind`. Returns `Err(first)` with the action that
    /// already holds it. `ActionKind::None` never claims.
    pub fn claim(&self, kind: ActionKind) -> Result<(), ActionKind> {
        let code = match kind {
            ActionKind::Land => LAND,
            ActionKind::ReturnToLaunch => RTL,
            ActionKind::None => return Ok(()),
        };
        self.state
            .compare_exchange(OPEN, code, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(decode)
    }

    pub fn claimed(&self) -> Option<ActionKind> {
        match self.state.load(Ordering::Acquire) {
            OPEN => None,
            code => Some(decode(code)),
        }
    }
}

fn decode(code: u8) -> ActionKind {
    match code {
        LAND => ActionKind::Land,
        RTL => ActionKind::ReturnToLaunch,
        _ => ActionKind::None,
    }
}
