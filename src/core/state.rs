use serde::Serialize;

/// Lifecycle of a single camera worker.
///
/// `Stopped` is reached only through an explicit stop request; `Died` marks a
/// worker whose task terminated without one, so the scheduler can tell the
/// two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Stopping,
    Stopped,
    Died,
}

impl WorkerState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Running => 1,
            WorkerState::Stopping => 2,
            WorkerState::Stopped => 3,
            WorkerState::Died => 4,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            3 => WorkerState::Stopped,
            _ => WorkerState::Died,
        }
    }

    pub fn is_alive(self) -> bool {
        matches!(
            self,
            WorkerState::Idle | WorkerState::Running | WorkerState::Stopping
        )
    }
}

/// Point-in-time view of one worker, sampled by the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub slug: String,
    pub downloads: u64,
    pub state: WorkerState,
    pub alive: bool,
}
