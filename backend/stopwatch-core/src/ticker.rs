// src/ticker.rs
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::error::TrackerError;

pub const DEFAULT_TICK_MS: u64 = 100;
pub const MAX_TICK_MS: u64 = 1000;

/// Validated period for a [`TickSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPeriod(Duration);

impl TickPeriod {
    pub fn new(period: Duration) -> Result<Self, TrackerError> {
        if period.is_zero() || period > Duration::from_millis(MAX_TICK_MS) {
            return Err(TrackerError::InvalidTickPeriod {
                requested_ms: period.as_millis(),
                max_ms: MAX_TICK_MS,
            });
        }
        Ok(Self(period))
    }

    pub fn from_millis(millis: u64) -> Result<Self, TrackerError> {
        Self::new(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for TickPeriod {
    fn default() -> Self {
        Self(Duration::from_millis(DEFAULT_TICK_MS))
    }
}

/// A periodic callback running on its own tokio task.
///
/// The task lives exactly as long as this value: dropping or cancelling it
/// aborts the task, so no callback can fire after its owner is gone.
#[derive(Debug)]
pub struct TickSource {
    handle: JoinHandle<()>,
}

impl TickSource {
    pub fn spawn_on<F>(runtime: &Handle, period: TickPeriod, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let handle = runtime.spawn(async move {
            let mut ticks = interval(period.as_duration());
            // A stalled executor should not replay a burst of stale frames.
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                on_tick();
            }
        });
        debug!("Tick source started ({:?})", period.as_duration());
        Self { handle }
    }

    pub fn cancel(self) {
        debug!("Tick source cancelled");
    }
}

impl Drop for TickSource {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
