//! Capture session orchestration.
//!
//! A session acquires the two media sources up front (all-or-nothing),
//! then launches three independent long-running loops: one segment
//! recorder per source and the location sampler. The loops never
//! coordinate with each other; the session only fans out a shutdown
//! signal and joins them at stop.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use camlog_common::artifact::ArtifactSink;
use camlog_common::clock::RecordingClock;
use camlog_common::config::{CaptureDefaults, FailurePolicy};
use camlog_common::error::{CamlogError, CamlogResult};
use camlog_location_tracker::{LocationProvider, LocationSampler};

use crate::recorder::{RecordingPrimitive, SegmentRecorder};
use crate::source::{
    AcquisitionBackend, AudioConstraints, PreviewSurface, StreamLabel, VideoConstraints,
};

/// State of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Not started; nothing acquired.
    Idle,
    /// All capture loops running.
    Active,
    /// Stopped; a session is never restarted.
    Stopped,
}

/// Configuration for one capture session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Screen feed constraints.
    pub screen_video: VideoConstraints,
    pub screen_audio: AudioConstraints,

    /// Camera feed constraints.
    pub camera_video: VideoConstraints,
    pub camera_audio: AudioConstraints,

    /// Fixed duration of each media segment.
    pub segment_duration: Duration,

    /// Location sampling period.
    pub location_period: Duration,

    /// Recorder failure policy.
    pub failure_policy: FailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let defaults = CaptureDefaults::default();
        Self {
            // screen at a low frame rate with unprocessed audio; camera at
            // a modest fixed resolution with default audio processing
            screen_video: VideoConstraints::at_frame_rate(1),
            screen_audio: AudioConstraints::raw(44_100),
            camera_video: VideoConstraints::sized(640, 480),
            camera_audio: AudioConstraints::default(),
            segment_duration: Duration::from_secs(defaults.segment_secs),
            location_period: Duration::from_secs(defaults.location_period_secs),
            failure_policy: defaults.failure_policy,
        }
    }
}

/// Orchestrates the two segment recorders and the location sampler.
pub struct CaptureSession {
    config: SessionConfig,
    state: SessionState,
    acquisition: Arc<dyn AcquisitionBackend>,
    primitive: Arc<dyn RecordingPrimitive>,
    sink: Arc<dyn ArtifactSink>,
    location: Option<Arc<dyn LocationProvider>>,
    preview: Option<Arc<dyn PreviewSurface>>,
    clock: Option<RecordingClock>,
    shutdown_tx: watch::Sender<bool>,
    recorder_tasks: Vec<(StreamLabel, JoinHandle<CamlogResult<u64>>)>,
    sampler_task: Option<JoinHandle<CamlogResult<u64>>>,
}

impl CaptureSession {
    pub fn new(
        config: SessionConfig,
        acquisition: Arc<dyn AcquisitionBackend>,
        primitive: Arc<dyn RecordingPrimitive>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            state: SessionState::Idle,
            acquisition,
            primitive,
            sink,
            location: None,
            preview: None,
            clock: None,
            shutdown_tx,
            recorder_tasks: Vec::new(),
            sampler_task: None,
        }
    }

    /// Use a location provider. Without one the sampler never starts,
    /// which is not an error.
    pub fn with_location(mut self, provider: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(provider);
        self
    }

    /// Use a preview surface. Attachment is best-effort.
    pub fn with_preview(mut self, preview: Arc<dyn PreviewSurface>) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Seconds since the session became active.
    pub fn elapsed_secs(&self) -> f64 {
        self.clock.as_ref().map(|c| c.elapsed_secs()).unwrap_or(0.0)
    }

    /// Start capturing.
    ///
    /// Acquisition is all-or-nothing: if either grant fails, whatever was
    /// acquired is released, nothing is previewed or recorded, and the
    /// session stays `Idle`.
    pub async fn start(&mut self) -> CamlogResult<()> {
        if self.state != SessionState::Idle {
            return Err(CamlogError::session("capture session already started"));
        }

        tracing::info!("Starting capture session");

        let screen = match self
            .acquisition
            .acquire_display(&self.config.screen_video, &self.config.screen_audio)
            .await
        {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(error = %e, "Screen acquisition failed; session not started");
                return Err(e);
            }
        };

        let camera = match self
            .acquisition
            .acquire_camera(&self.config.camera_video, &self.config.camera_audio)
            .await
        {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(error = %e, "Camera acquisition failed; session not started");
                self.acquisition.release(screen).await;
                return Err(e);
            }
        };

        if let Some(preview) = &self.preview {
            preview.attach(&screen);
            preview.attach(&camera);
        }

        let clock = RecordingClock::start();
        tracing::info!(epoch_wall = %clock.epoch_wall(), "Recording clock started");
        self.clock = Some(clock);
        self.state = SessionState::Active;

        for source in [screen, camera] {
            let label = source.label();
            let recorder = SegmentRecorder::new(
                source,
                Arc::clone(&self.primitive),
                Arc::clone(&self.sink),
                self.config.segment_duration,
                self.config.failure_policy,
                self.shutdown_tx.subscribe(),
            );
            self.recorder_tasks
                .push((label, tokio::spawn(recorder.run())));
            tracing::info!(%label, "Segment recorder task started");
        }

        match &self.location {
            Some(provider) => {
                let sampler = LocationSampler::new(
                    Arc::clone(provider),
                    Arc::clone(&self.sink),
                    self.config.location_period,
                    self.shutdown_tx.subscribe(),
                );
                self.sampler_task = Some(tokio::spawn(sampler.run()));
                tracing::info!("Location sampler task started");
            }
            None => tracing::info!("Location capability absent; sampler disabled"),
        }

        tracing::info!("Capture session started");
        Ok(())
    }

    /// Stop all capture loops.
    ///
    /// In-flight cycles are stopped early and their segments emitted
    /// before the recorders exit; a recorder that already halted on a
    /// failure just reports its error here.
    pub async fn stop(&mut self) -> CamlogResult<()> {
        if self.state != SessionState::Active {
            return Err(CamlogError::session("capture session not active"));
        }

        tracing::info!("Stopping capture session");
        self.shutdown_tx.send_replace(true);

        for (label, task) in self.recorder_tasks.drain(..) {
            match task.await {
                Ok(Ok(segments)) => {
                    tracing::info!(%label, segments, "Segment recorder flushed")
                }
                Ok(Err(e)) => {
                    tracing::warn!(%label, error = %e, "Segment recorder exited with error")
                }
                Err(e) => tracing::warn!(%label, error = %e, "Segment recorder join failed"),
            }
        }

        if let Some(task) = self.sampler_task.take() {
            match task.await {
                Ok(Ok(ticks)) => tracing::info!(ticks, "Location sampler flushed"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Location sampler exited with error"),
                Err(e) => tracing::warn!(error = %e, "Location sampler join failed"),
            }
        }

        let duration_secs = self.elapsed_secs();
        self.state = SessionState::Stopped;
        tracing::info!(duration_secs, "Capture session stopped");
        Ok(())
    }
}
