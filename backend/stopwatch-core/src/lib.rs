// src/lib.rs
//! Attendance stopwatch backend.
//!
//! The core is [`tracker::ElapsedTimeTracker`], which reconciles the
//! backend's clock-in/clock-out pair, an optional external start/stop
//! signal, and its own toggle into one elapsed value.
//! [`session::StopwatchSession`] adds the display sink and owns the tick
//! source, and [`server`] exposes a session over HTTP.

pub mod boundary;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod server;
pub mod session;
pub mod ticker;
pub mod tracker;

mod tracker_tests;

pub use boundary::BoundaryMark;
pub use clock::{Clock, SystemClock, TestClock};
pub use config::Config;
pub use display::{DisplaySink, ElapsedDisplay, LogSink, WatchSink};
pub use error::{AppError, TrackerError};
pub use session::StopwatchSession;
pub use ticker::{TickPeriod, TickSource};
pub use tracker::{ElapsedTimeTracker, Reconciliation, RunningFlag, TrackerSnapshot};
