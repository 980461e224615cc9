// src/boundary.rs
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::TrackerError;

/// Values the attendance backend sends when a clock-in or clock-out has not
/// happened yet.
pub const UNSET_SENTINELS: [&str; 2] = ["-", "00:00"];

// Offset without the colon, e.g. `+0200`.
const COMPACT_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

// Local wall-clock forms, tried in order after the offset forms.
const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// One side of a clock-in/clock-out pair as supplied by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryMark {
    Absent,
    Unset,
    At(DateTime<Utc>),
}

impl BoundaryMark {
    pub fn parse(raw: Option<&str>) -> Result<Self, TrackerError> {
        let Some(raw) = raw else {
            return Ok(Self::Absent);
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() || UNSET_SENTINELS.contains(&trimmed) {
            return Ok(Self::Unset);
        }
        parse_timestamp(trimmed).map(Self::At)
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::At(instant) => Some(*instant),
            Self::Absent | Self::Unset => None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TrackerError> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }
    if let Ok(with_offset) = DateTime::parse_from_str(raw, COMPACT_OFFSET_FORMAT) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    else {
        // A bare date is midnight UTC, not local midnight.
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| TrackerError::MalformedTimestamp {
                raw: raw.to_string(),
                reason: "unrecognised timestamp format".to_string(),
            });
    };

    // Ambiguous local times (DST fold) resolve to the earlier instant.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| TrackerError::MalformedTimestamp {
            raw: raw.to_string(),
            reason: "local time does not exist in this time zone".to_string(),
        })
}
