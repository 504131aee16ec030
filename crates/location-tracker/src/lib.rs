//! Camlog Location Tracker
//!
//! Samples device location on a fixed period and emits each reading as its
//! own JSON artifact. Readings come from a pluggable [`LocationProvider`]
//! backend so the tracker itself never touches a positioning stack.
//!
//! Cadence rules:
//! - the first reading is taken immediately on activation
//! - the period is measured from activation, not from the completion of the
//!   previous reading
//! - a slow reading may overlap the next tick; overlapping reads are not
//!   serialized
//! - a failed reading skips that tick's artifact and nothing else

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use camlog_common::artifact::{Artifact, ArtifactSink};
use camlog_common::clock::wall_timestamp;
use camlog_common::error::CamlogResult;

/// A point-in-time position fix from the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    /// Position accuracy in meters.
    pub accuracy: f64,
}

/// The artifact payload: a reading stamped with wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

impl LocationSample {
    fn stamped(timestamp: String, reading: LocationReading) -> Self {
        Self {
            timestamp,
            latitude: reading.latitude,
            longitude: reading.longitude,
            accuracy: reading.accuracy,
        }
    }
}

/// Trait for location backends.
///
/// A single call is a single-shot asynchronous fix; the tracker never holds
/// a continuous position subscription.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    /// Take one position reading.
    async fn current_reading(&self) -> CamlogResult<LocationReading>;

    /// Backend name for logging.
    fn name(&self) -> &str {
        "location"
    }
}

/// Emits one `location_{timestamp}.json` artifact per period.
pub struct LocationSampler {
    provider: Arc<dyn LocationProvider>,
    sink: Arc<dyn ArtifactSink>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl LocationSampler {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        sink: Arc<dyn ArtifactSink>,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            provider,
            sink,
            period,
            shutdown,
        }
    }

    /// Run the sampling loop until the shutdown signal fires.
    ///
    /// Returns the number of ticks issued. Each tick's read-and-emit runs
    /// in its own task, so the count can be ahead of the artifacts that
    /// actually landed in the sink.
    pub async fn run(mut self) -> CamlogResult<u64> {
        tracing::info!(
            backend = %self.provider.name(),
            period_secs = self.period.as_secs(),
            "Location sampler started"
        );

        let mut ticks = tokio::time::interval(self.period);
        let mut issued: u64 = 0;

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    issued += 1;
                    let provider = Arc::clone(&self.provider);
                    let sink = Arc::clone(&self.sink);
                    tokio::spawn(sample_once(provider, sink));
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(ticks = issued, "Location sampler stopped");
        Ok(issued)
    }
}

/// One tick: read, stamp, encode, submit. Every failure is local to this
/// tick.
async fn sample_once(provider: Arc<dyn LocationProvider>, sink: Arc<dyn ArtifactSink>) {
    let reading = match provider.current_reading().await {
        Ok(reading) => reading,
        Err(e) => {
            tracing::warn!(error = %e, "Location reading failed; skipping this tick");
            return;
        }
    };

    let timestamp = wall_timestamp();
    let sample = LocationSample::stamped(timestamp.clone(), reading);

    let payload = match serde_json::to_vec_pretty(&sample) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode location sample");
            return;
        }
    };

    let name = format!("location_{timestamp}.json");
    match sink.submit(Artifact::new(name, payload)).await {
        Ok(()) => tracing::debug!(%timestamp, "Location sample emitted"),
        Err(e) => tracing::warn!(error = %e, "Failed to submit location sample"),
    }
}
