//! Clock and timestamp utilities.
//!
//! A capture session is anchored to a monotonic epoch recorded at start;
//! individual artifacts are stamped with wall-clock time. The two never mix:
//! deadlines and elapsed durations come from the monotonic side, artifact
//! names from the wall side.

use std::time::Instant;

use chrono::{SecondsFormat, Utc};

/// Monotonic clock anchored to the moment a session became active.
#[derive(Debug, Clone)]
pub struct RecordingClock {
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339).
    epoch_wall: String,
}

impl RecordingClock {
    /// Anchor a new clock to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: wall_timestamp(),
        }
    }

    /// Seconds elapsed since the session became active.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at session start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

/// Current wall-clock time as an RFC 3339 UTC string with millisecond
/// precision, e.g. `2026-08-07T09:15:00.123Z`. Artifact names embed this.
pub fn wall_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
