// src/clock.rs
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Source of wall-clock instants for the tracker.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same instant, so a test can keep
/// one handle and hand another to the tracker.
#[derive(Debug, Clone)]
pub struct TestClock {
    current_time: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(instant)),
        }
    }

    pub fn set_time(&self, instant: DateTime<Utc>) {
        *self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn advance(&self, duration: Duration) {
        *self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += duration;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
