// src/session.rs
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::display::{DisplaySink, ElapsedDisplay};
use crate::error::TrackerError;
use crate::ticker::{TickPeriod, TickSource};
use crate::tracker::{ElapsedTimeTracker, TrackerSnapshot};

/// One mounted stopwatch: a tracker, the sink it renders to, and the tick
/// source that exists only while the interval is being live-timed.
pub struct StopwatchSession {
    tracker: Arc<Mutex<ElapsedTimeTracker>>,
    sink: Arc<dyn DisplaySink>,
    period: TickPeriod,
    runtime: Handle,
    ticker: Option<TickSource>,
}

impl StopwatchSession {
    pub fn new(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn DisplaySink>,
        period: TickPeriod,
    ) -> Result<Self, TrackerError> {
        let runtime = Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;
        let session = Self {
            tracker: Arc::new(Mutex::new(ElapsedTimeTracker::new(clock))),
            sink,
            period,
            runtime,
            ticker: None,
        };
        lock(&session.tracker).tick(session.sink.as_ref());
        info!("Stopwatch session mounted ({:?} ticks)", period.as_duration());
        Ok(session)
    }

    /// Applies a clock-in/clock-out pair. With no hint the current running
    /// flag is used. Malformed input is logged and absorbed.
    pub fn boundary_changed(
        &mut self,
        start: Option<&str>,
        end: Option<&str>,
        running_hint: Option<bool>,
    ) -> TrackerSnapshot {
        let outcome = {
            let mut tracker = lock(&self.tracker);
            let hint = running_hint.unwrap_or_else(|| tracker.is_running());
            tracker.on_boundary_changed(start, end, hint)
        };
        match outcome {
            Ok(reconciliation) => debug!("Boundary reconciled: {:?}", reconciliation),
            Err(err) => warn!("Boundary update rejected: {}", err),
        }
        self.settle()
    }

    /// `Some` sets the external signal, `None` withdraws it.
    pub fn external_control_changed(&mut self, running: Option<bool>) -> TrackerSnapshot {
        {
            let mut tracker = lock(&self.tracker);
            match running {
                Some(running) => tracker.on_external_control_changed(running),
                None => tracker.clear_external_control(),
            }
        }
        self.settle()
    }

    pub fn start(&mut self) -> bool {
        let changed = lock(&self.tracker).start();
        self.settle();
        changed
    }

    pub fn stop(&mut self) -> bool {
        let changed = lock(&self.tracker).stop();
        self.settle();
        changed
    }

    pub fn reset(&mut self) -> TrackerSnapshot {
        lock(&self.tracker).reset();
        self.settle()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        lock(&self.tracker).snapshot()
    }

    pub fn display(&self) -> ElapsedDisplay {
        lock(&self.tracker).display()
    }

    pub fn external_control(&self) -> Option<bool> {
        lock(&self.tracker).external_control()
    }

    pub fn has_tick_source(&self) -> bool {
        self.ticker.is_some()
    }

    /// Cancels the tick source. Called on drop as well; repeat calls are
    /// no-ops.
    pub fn dispose(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
            info!("Stopwatch session disposed; tick source released");
        }
    }

    // Pushes the current frame and brings the tick source in line with the
    // tracker: present exactly while an anchor is set.
    fn settle(&mut self) -> TrackerSnapshot {
        let (ticking, snapshot) = {
            let tracker = lock(&self.tracker);
            tracker.tick(self.sink.as_ref());
            (tracker.is_ticking(), tracker.snapshot())
        };

        match (ticking, self.ticker.is_some()) {
            (true, false) => {
                self.ticker = Some(self.spawn_ticker());
                info!("Interval opened at {}; tick source acquired", snapshot.formatted);
            }
            (false, true) => {
                if let Some(ticker) = self.ticker.take() {
                    ticker.cancel();
                }
                info!("Interval settled at {}; tick source released", snapshot.formatted);
            }
            _ => {}
        }
        snapshot
    }

    fn spawn_ticker(&self) -> TickSource {
        let tracker = Arc::clone(&self.tracker);
        let sink = Arc::clone(&self.sink);
        TickSource::spawn_on(&self.runtime, self.period, move || {
            lock(&tracker).tick(sink.as_ref());
        })
    }
}

impl Drop for StopwatchSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

// Tracker state is plain scalars, so a poisoned lock is still usable.
fn lock(tracker: &Mutex<ElapsedTimeTracker>) -> MutexGuard<'_, ElapsedTimeTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}
