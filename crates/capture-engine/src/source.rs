//! Stream identity, source handles, and the acquisition/preview seams.

use serde::{Deserialize, Serialize};

use camlog_common::error::CamlogResult;

/// Identity of a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamLabel {
    Screen,
    Camera,
}

impl StreamLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Camera => "camera",
        }
    }
}

impl std::fmt::Display for StreamLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle to one live, continuous audio+video feed.
///
/// Minted by an [`AcquisitionBackend`]; the id is meaningful only to the
/// backend that minted it. A source stays live until released and is fed to
/// exactly one segment recorder for its entire lifetime. Not `Clone`, so
/// exclusive use holds at compile time.
#[derive(Debug, PartialEq, Eq)]
pub struct MediaSource {
    label: StreamLabel,
    id: u64,
}

impl MediaSource {
    pub fn new(label: StreamLabel, id: u64) -> Self {
        Self { label, id }
    }

    pub fn label(&self) -> StreamLabel {
        self.label
    }

    /// Backend-private identifier.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Requested video capture parameters. `None` leaves the choice to the
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VideoConstraints {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
}

impl VideoConstraints {
    /// Request a specific resolution.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            frame_rate: None,
        }
    }

    /// Request only a frame rate.
    pub fn at_frame_rate(frame_rate: u32) -> Self {
        Self {
            frame_rate: Some(frame_rate),
            ..Self::default()
        }
    }
}

/// Requested audio capture parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: Option<u32>,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: None,
        }
    }
}

impl AudioConstraints {
    /// Unprocessed capture at a fixed sample rate.
    pub fn raw(sample_rate: u32) -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            sample_rate: Some(sample_rate),
        }
    }
}

/// Abstract interface to the platform's media acquisition capability.
///
/// Acquisition awaits an external grant (a permission prompt), which makes
/// these the only logically blocking operations in the engine.
#[async_trait::async_trait]
pub trait AcquisitionBackend: Send + Sync {
    /// Acquire the live display feed.
    async fn acquire_display(
        &self,
        video: &VideoConstraints,
        audio: &AudioConstraints,
    ) -> CamlogResult<MediaSource>;

    /// Acquire the live camera feed.
    async fn acquire_camera(
        &self,
        video: &VideoConstraints,
        audio: &AudioConstraints,
    ) -> CamlogResult<MediaSource>;

    /// Release a source that will not be recorded (session start aborted
    /// partway through acquisition).
    async fn release(&self, source: MediaSource) {
        tracing::debug!(label = %source.label(), "Releasing unused media source");
    }
}

/// Optional live preview of an acquired source.
///
/// Attachment is best-effort; an implementation must never fail the
/// session.
pub trait PreviewSurface: Send + Sync {
    fn attach(&self, source: &MediaSource);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_render_their_filename_prefix() {
        assert_eq!(StreamLabel::Screen.to_string(), "screen");
        assert_eq!(StreamLabel::Camera.as_str(), "camera");
    }

    #[test]
    fn label_serializes_lowercase() {
        let json = serde_json::to_string(&StreamLabel::Camera).unwrap();
        assert_eq!(json, "\"camera\"");
    }

    #[test]
    fn constraint_constructors() {
        let video = VideoConstraints::sized(640, 480);
        assert_eq!(video.width, Some(640));
        assert_eq!(video.height, Some(480));
        assert_eq!(video.frame_rate, None);

        let slow = VideoConstraints::at_frame_rate(1);
        assert_eq!(slow.frame_rate, Some(1));
        assert_eq!(slow.width, None);

        let raw = AudioConstraints::raw(44_100);
        assert!(!raw.echo_cancellation);
        assert!(!raw.noise_suppression);
        assert_eq!(raw.sample_rate, Some(44_100));

        let processed = AudioConstraints::default();
        assert!(processed.echo_cancellation);
        assert!(processed.noise_suppression);
    }
}
