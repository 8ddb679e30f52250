//! Recurring sampling trigger

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Fires `on_tick` every `period` until cancelled
///
/// The first tick lands one full period after `start`. A slow tick delays the
/// schedule instead of producing a burst of catch-up ticks.
pub struct SamplingTimer {
    handle: JoinHandle<()>,
}

impl SamplingTimer {
    /// Start the timer on the current tokio runtime
    ///
    /// `on_tick` returning `ControlFlow::Break` ends the timer.
    pub fn start<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let handle = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                if on_tick().is_break() {
                    debug!("Sampling timer finished");
                    break;
                }
            }
        });
        Self { handle }
    }

    /// Stop the timer
    ///
    /// `on_tick` never runs across an await point, so after this returns no
    /// further tick can start.
    pub fn cancel(self) {
        self.handle.abort();
    }

    #[allow(dead_code)]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SamplingTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
