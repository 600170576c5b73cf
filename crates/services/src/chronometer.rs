use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use course_core::model::{Chronometer, RunState};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Drives a `Chronometer` from a single tokio interval task.
///
/// The task only exists while the chronometer runs; pausing, resetting or
/// dropping the driver aborts it. Must be used inside a tokio runtime.
pub struct ChronometerDriver {
    chrono: Arc<Mutex<Chronometer>>,
    ticker: Option<JoinHandle<()>>,
    period: Duration,
}

impl Default for ChronometerDriver {
    fn default() -> Self {
        Self::with_period(TICK_PERIOD)
    }
}

impl ChronometerDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_period(period: Duration) -> Self {
        Self {
            chrono: Arc::new(Mutex::new(Chronometer::new())),
            ticker: None,
            period,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Chronometer> {
        self.chrono.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start or resume. No-op while already running.
    pub fn start(&mut self) -> bool {
        if !self.lock().start() {
            return false;
        }
        self.stop_ticker();

        let chrono = Arc::clone(&self.chrono);
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        self.ticker = Some(tokio::spawn(async move {
            loop {
                interval.tick().await;
                let ticked = chrono
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .tick();
                if !ticked {
                    break;
                }
            }
        }));
        tracing::trace!("chronometer started");
        true
    }

    pub fn pause(&mut self) -> bool {
        let paused = self.lock().pause();
        self.stop_ticker();
        paused
    }

    pub fn reset(&mut self) {
        self.lock().reset();
        self.stop_ticker();
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.lock().elapsed_secs()
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.lock().state()
    }

    /// Elapsed time as `HH:MM:SS`.
    #[must_use]
    pub fn display(&self) -> String {
        self.lock().display()
    }

    #[must_use]
    pub fn has_ticker(&self) -> bool {
        self.ticker.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ChronometerDriver {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_keep_elapsed_time() {
        let mut driver = ChronometerDriver::new();
        assert!(driver.start());
        sleep(Duration::from_millis(3_500)).await;
        assert!(driver.pause());
        sleep(Duration::from_secs(2)).await;
        assert_eq!(driver.display(), "00:00:03");

        assert!(driver.start());
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(driver.display(), "00:00:04");
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_does_not_double_tick() {
        let mut driver = ChronometerDriver::new();
        assert!(driver.start());
        assert!(!driver.start());
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(driver.elapsed_secs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stops_ticking_and_zeroes() {
        let mut driver = ChronometerDriver::new();
        driver.start();
        sleep(Duration::from_millis(1_500)).await;
        driver.reset();
        assert!(!driver.has_ticker());
        sleep(Duration::from_secs(5)).await;
        assert_eq!(driver.display(), "00:00:00");
        assert_eq!(driver.state(), RunState::Idle);
    }
}
