// src/display.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tracing::info;

const SECS_PER_HOUR: u64 = 3600;
const SECS_PER_MINUTE: u64 = 60;

/// Largest hour value the two-digit display can show.
pub const MAX_DISPLAY_HOURS: u8 = 99;

/// Hours/minutes/seconds triple handed to the display once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElapsedDisplay {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl ElapsedDisplay {
    /// Splits whole seconds into the display triple. Anything at or past
    /// 100 hours saturates at `99:59:59`.
    pub fn from_seconds(total: u64) -> Self {
        let hours = total / SECS_PER_HOUR;
        if hours > u64::from(MAX_DISPLAY_HOURS) {
            return Self {
                hours: MAX_DISPLAY_HOURS,
                minutes: 59,
                seconds: 59,
            };
        }
        Self {
            hours: hours as u8,
            minutes: ((total % SECS_PER_HOUR) / SECS_PER_MINUTE) as u8,
            seconds: (total % SECS_PER_MINUTE) as u8,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hours) * SECS_PER_HOUR
            + u64::from(self.minutes) * SECS_PER_MINUTE
            + u64::from(self.seconds)
    }
}

impl fmt::Display for ElapsedDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Receiver of rendered frames.
pub trait DisplaySink: Send + Sync {
    fn render(&self, frame: ElapsedDisplay);
}

/// Logs a frame whenever the visible value changes.
#[derive(Debug)]
pub struct LogSink {
    label: String,
    last_frame: Mutex<Option<ElapsedDisplay>>,
}

impl LogSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            last_frame: Mutex::new(None),
        }
    }
}

impl DisplaySink for LogSink {
    fn render(&self, frame: ElapsedDisplay) {
        let mut last = self.last_frame.lock().unwrap_or_else(PoisonError::into_inner);
        if last.replace(frame) != Some(frame) {
            info!("{} {}", self.label, frame);
        }
    }
}

/// Keeps the latest frame in a `watch` channel for readers on other tasks.
#[derive(Debug)]
pub struct WatchSink {
    sender: watch::Sender<ElapsedDisplay>,
}

impl WatchSink {
    pub fn new() -> (Self, watch::Receiver<ElapsedDisplay>) {
        let (sender, receiver) = watch::channel(ElapsedDisplay::default());
        (Self { sender }, receiver)
    }
}

impl DisplaySink for WatchSink {
    fn render(&self, frame: ElapsedDisplay) {
        self.sender.send_if_modified(|current| {
            if *current == frame {
                false
            } else {
                *current = frame;
                true
            }
        });
    }
}
