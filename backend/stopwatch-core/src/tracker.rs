// src/tracker.rs
//! Elapsed-duration reconciliation for the attendance stopwatch.
//!
//! Three inputs move the tracker: the clock-in/clock-out pair from the
//! attendance backend, an optional external start/stop signal, and the
//! internal start/stop toggle. Each transition is a single function whose
//! guards are checked in precedence order. A valid clock-out always closes
//! the interval; control signals can only open or continue one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::boundary::BoundaryMark;
use crate::clock::Clock;
use crate::display::{DisplaySink, ElapsedDisplay};
use crate::error::TrackerError;

/// Who currently decides whether the stopwatch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningFlag {
    External(bool),
    Internal(bool),
}

impl RunningFlag {
    pub fn is_running(self) -> bool {
        match self {
            RunningFlag::External(running) | RunningFlag::Internal(running) => running,
        }
    }
}

/// What a boundary update did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Reset,
    Closed { seconds: u64, anomalous: bool },
    Live { seconds: u64 },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerSnapshot {
    #[serde(flatten)]
    pub display: ElapsedDisplay,
    pub formatted: String,
    pub displayed_seconds: u64,
    pub accumulated_seconds: u64,
    pub running: bool,
    pub ticking: bool,
    pub closed: bool,
    pub external_control: Option<bool>,
    pub anomalies: u64,
}

#[derive(Debug)]
pub struct ElapsedTimeTracker {
    clock: Arc<dyn Clock>,
    accumulated_secs: u64,
    anchor: Option<DateTime<Utc>>,
    internal_running: bool,
    external_running: Option<bool>,
    // Set while a valid clock-out pins the value; blocks every reopen path.
    closed_bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
    anomalies: u64,
}

impl ElapsedTimeTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            accumulated_secs: 0,
            anchor: None,
            internal_running: false,
            external_running: None,
            closed_bounds: None,
            anomalies: 0,
        }
    }

    /// Re-derives the banked duration from the backend's clock-in/clock-out
    /// pair. Safe to call on every poll: identical inputs give the same
    /// displayed value apart from the passage of time.
    pub fn on_boundary_changed(
        &mut self,
        start: Option<&str>,
        end: Option<&str>,
        running_hint: bool,
    ) -> Result<Reconciliation, TrackerError> {
        let start_mark = BoundaryMark::parse(start).map_err(|err| {
            warn!("Ignoring boundary update, keeping last known state: {}", err);
            err
        })?;

        let Some(started_at) = start_mark.instant() else {
            self.clear_interval();
            debug!("No clock-in boundary; tracker reset to zero");
            return Ok(Reconciliation::Reset);
        };

        let end_mark = BoundaryMark::parse(end).unwrap_or_else(|err| {
            warn!("Treating malformed clock-out as open interval: {}", err);
            BoundaryMark::Absent
        });

        if let Some(ended_at) = end_mark.instant() {
            return Ok(self.close_interval(started_at, ended_at));
        }

        self.closed_bounds = None;
        if !running_hint {
            return Ok(Reconciliation::Unchanged);
        }

        let now = self.clock.now();
        let elapsed = whole_seconds_between(started_at, now);
        if elapsed <= 0 {
            debug!(
                "Clock-in {} is not in the past yet; nothing to bank",
                started_at
            );
            return Ok(Reconciliation::Unchanged);
        }

        // Re-anchor at now so the seconds already banked are not counted twice.
        let seconds = elapsed as u64;
        self.accumulated_secs = seconds;
        self.anchor = Some(now);
        Ok(Reconciliation::Live { seconds })
    }

    pub fn on_external_control_changed(&mut self, external_running: bool) {
        self.external_running = Some(external_running);

        if external_running {
            if self.is_closed() {
                debug!("External start ignored; interval closed by clock-out");
            } else if self.anchor.is_none() && self.accumulated_secs == 0 {
                self.anchor = Some(self.clock.now());
            } else {
                debug!("External start ignored; interval already seeded");
            }
        } else if self.anchor.is_some() {
            self.fold_live_portion();
        }
    }

    /// Withdraws the external signal. The internal toggle takes over again:
    /// a stopped toggle banks any live portion, a running one resumes
    /// ticking unless the interval is closed.
    pub fn clear_external_control(&mut self) {
        if self.external_running.take().is_none() {
            return;
        }
        if !self.internal_running {
            self.fold_live_portion();
        } else if self.anchor.is_none() && !self.is_closed() {
            self.anchor = Some(self.clock.now());
        }
    }

    pub fn start(&mut self) -> bool {
        if self.external_running.is_some() {
            debug!("Internal start refused; external control signal present");
            return false;
        }
        if self.is_closed() {
            debug!("Internal start refused; interval closed by clock-out");
            return false;
        }
        if self.internal_running {
            return false;
        }
        self.internal_running = true;
        if self.anchor.is_none() {
            self.anchor = Some(self.clock.now());
        }
        true
    }

    pub fn stop(&mut self) -> bool {
        if self.external_running.is_some() {
            debug!("Internal stop refused; external control signal present");
            return false;
        }
        if !self.internal_running && self.anchor.is_none() {
            return false;
        }
        self.fold_live_portion();
        self.internal_running = false;
        true
    }

    pub fn reset(&mut self) {
        self.clear_interval();
        self.internal_running = false;
    }

    /// Computes the current frame and hands it to the sink.
    pub fn tick(&self, sink: &dyn DisplaySink) -> ElapsedDisplay {
        let frame = self.display();
        sink.render(frame);
        frame
    }

    pub fn displayed_seconds(&self) -> u64 {
        self.accumulated_secs
            .saturating_add(self.live_seconds(self.clock.now()))
    }

    pub fn display(&self) -> ElapsedDisplay {
        ElapsedDisplay::from_seconds(self.displayed_seconds())
    }

    pub fn accumulated_seconds(&self) -> u64 {
        self.accumulated_secs
    }

    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        self.anchor
    }

    pub fn running_flag(&self) -> RunningFlag {
        match self.external_running {
            Some(running) => RunningFlag::External(running),
            None => RunningFlag::Internal(self.internal_running),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_flag().is_running()
    }

    pub fn external_control(&self) -> Option<bool> {
        self.external_running
    }

    pub fn is_ticking(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed_bounds.is_some()
    }

    pub fn anomaly_count(&self) -> u64 {
        self.anomalies
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let displayed_seconds = self.displayed_seconds();
        let display = ElapsedDisplay::from_seconds(displayed_seconds);
        TrackerSnapshot {
            display,
            formatted: display.to_string(),
            displayed_seconds,
            accumulated_seconds: self.accumulated_secs,
            running: self.is_running(),
            ticking: self.is_ticking(),
            closed: self.is_closed(),
            external_control: self.external_running,
            anomalies: self.anomalies,
        }
    }

    fn close_interval(
        &mut self,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Reconciliation {
        let raw = whole_seconds_between(started_at, ended_at);
        let anomalous = raw < 0;
        let bounds = (started_at, ended_at);

        // Count each bad pair once, not on every poll that repeats it.
        if anomalous && self.closed_bounds != Some(bounds) {
            self.anomalies += 1;
            warn!(
                "Clock-out {} precedes clock-in {}; clamping duration to zero (anomaly #{})",
                ended_at, started_at, self.anomalies
            );
        }

        let seconds = raw.max(0) as u64;
        self.accumulated_secs = seconds;
        self.anchor = None;
        self.closed_bounds = Some(bounds);
        Reconciliation::Closed { seconds, anomalous }
    }

    fn clear_interval(&mut self) {
        self.accumulated_secs = 0;
        self.anchor = None;
        self.closed_bounds = None;
    }

    fn fold_live_portion(&mut self) {
        if let Some(anchor) = self.anchor.take() {
            let now = self.clock.now();
            self.accumulated_secs = self
                .accumulated_secs
                .saturating_add(clamped_seconds(anchor, now));
        }
    }

    fn live_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.anchor
            .map(|anchor| clamped_seconds(anchor, now))
            .unwrap_or(0)
    }
}

// floor((to - from) / 1000) in milliseconds; negative when `to` is earlier.
fn whole_seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds().div_euclid(1000)
}

// A wall clock stepping backwards must not produce a negative live portion.
fn clamped_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    whole_seconds_between(from, to).max(0) as u64
}
