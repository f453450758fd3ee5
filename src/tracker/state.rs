use serde::Serialize;

/// Backend still reports `processing` below this many elapsed seconds →
/// the searching phase; below the next bound → processing; past it →
/// caching.
pub const SEARCHING_UNTIL_SECS: u64 = 15;
pub const PROCESSING_UNTIL_SECS: u64 = 30;

/// Past this the elapsed counter freezes. Not an error; slow search
/// backends keep polling until they report a terminal status.
pub const SOFT_LIMIT_SECS: u64 = 90;

pub const DEFAULT_ERROR_MESSAGE: &str = "search failed for an unknown reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initiating,
    Searching,
    Processing,
    Caching,
    Completed,
    Error,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Error)
    }

    /// Progress target for the phase; `Error` keeps whatever progress was
    /// already reached.
    fn progress_target(&self) -> Option<u8> {
        match self {
            Phase::Initiating => Some(5),
            Phase::Searching => Some(25),
            Phase::Processing => Some(55),
            Phase::Caching => Some(85),
            Phase::Completed => Some(100),
            Phase::Error => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Initiating => "initiating",
            Phase::Searching => "searching",
            Phase::Processing => "processing",
            Phase::Caching => "caching",
            Phase::Completed => "completed",
            Phase::Error => "error",
        }
    }
}

/// What the backend reported on a successful poll.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendStatus {
    Processing,
    Completed { result_count: i64 },
    Failed { message: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// One second of wall clock passed.
    Tick,
    /// The soft limit fired; elapsed stops counting.
    SoftLimit,
    /// A poll round-trip finished with a backend status.
    Backend(BackendStatus),
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackerState {
    pub phase: Phase,
    pub progress: u8,
    pub elapsed_secs: u64,
    pub polls: u32,
    pub result_count: Option<i64>,
    pub error: Option<String>,
    pub soft_limited: bool,
}

impl TrackerState {
    pub fn new() -> Self {
        TrackerState {
            phase: Phase::Initiating,
            progress: 5,
            elapsed_secs: 0,
            polls: 0,
            result_count: None,
            error: None,
            soft_limited: false,
        }
    }
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new()
    }
}

fn active_phase_for(elapsed_secs: u64) -> Phase {
    if elapsed_secs < SEARCHING_UNTIL_SECS {
        Phase::Searching
    } else if elapsed_secs < PROCESSING_UNTIL_SECS {
        Phase::Processing
    } else {
        Phase::Caching
    }
}

/// Pure transition. Terminal phases absorb every event; progress is clamped
/// monotonic non-decreasing outside of error.
pub fn step(mut state: TrackerState, event: Event) -> TrackerState {
    if state.phase.is_terminal() {
        return state;
    }

    match event {
        Event::Tick => {
            if !state.soft_limited {
                state.elapsed_secs += 1;
            }
            // Initiating holds until the backend has been seen once.
            if state.phase != Phase::Initiating {
                state.phase = active_phase_for(state.elapsed_secs);
            }
        }
        Event::SoftLimit => {
            state.soft_limited = true;
        }
        Event::Backend(status) => {
            state.polls += 1;
            match status {
                BackendStatus::Processing => {
                    state.phase = active_phase_for(state.elapsed_secs);
                }
                BackendStatus::Completed { result_count } => {
                    state.phase = Phase::Completed;
                    state.result_count = Some(result_count);
                }
                BackendStatus::Failed { message } => {
                    state.phase = Phase::Error;
                    state.error =
                        Some(message.unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()));
                }
            }
        }
    }

    if let Some(target) = state.phase.progress_target() {
        state.progress = state.progress.max(target);
    }
    state
}
