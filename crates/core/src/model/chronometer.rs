use serde::Serialize;

/// Run state of the reading chronometer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
}

/// Elapsed-time stopwatch shown while a course is being read.
///
/// Pure state machine: the tick source lives outside and calls `tick` once per
/// second. Ticks received while not running are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Chronometer {
    seconds: u64,
    state: RunState,
}

impl Chronometer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the chronometer transitioned to running, in which
    /// case the caller must start a tick source. Starting while running is a
    /// no-op and returns `false`.
    pub fn start(&mut self) -> bool {
        if self.state == RunState::Running {
            return false;
        }
        self.state = RunState::Running;
        true
    }

    /// Returns `true` if a running chronometer was paused.
    pub fn pause(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        self.state = RunState::Paused;
        true
    }

    pub fn reset(&mut self) {
        self.seconds = 0;
        self.state = RunState::Idle;
    }

    /// Advance by one second if running.
    pub fn tick(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        self.seconds = self.seconds.saturating_add(1);
        true
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.seconds
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    #[must_use]
    pub fn display(&self) -> String {
        format_hms(self.seconds)
    }
}

/// Formats seconds as `HH:MM:SS`. Hours keep growing past 99.
#[must_use]
pub fn format_hms(total_secs: u64) -> String {
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}
