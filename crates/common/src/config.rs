//! Capture defaults and logging configuration.
//!
//! These are in-memory values composed into a session configuration by the
//! caller; camlog does not load or persist configuration files.

use serde::{Deserialize, Serialize};

/// What a segment recorder does after its recording primitive fails
/// mid-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The failed stream stays down; the sibling stream and the location
    /// sampler are unaffected.
    #[default]
    HaltOnFailure,
    /// Log the failure and immediately open a fresh cycle on the same
    /// source.
    RestartOnFailure,
}

/// Default capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureDefaults {
    /// Segment duration per recording cycle, in seconds.
    pub segment_secs: u64,

    /// Location sampling period, in seconds.
    pub location_period_secs: u64,

    /// Recorder failure policy.
    pub failure_policy: FailurePolicy,

    /// Depth of the bounded artifact queue.
    pub sink_queue_depth: usize,
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            segment_secs: 60,
            location_period_secs: 60,
            failure_policy: FailurePolicy::default(),
            sink_queue_depth: 64,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "camlog=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
