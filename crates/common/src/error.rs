//! Error types shared across camlog crates.

/// Top-level error type for camlog operations.
#[derive(Debug, thiserror::Error)]
pub enum CamlogError {
    #[error("Acquisition error: {message}")]
    Acquisition { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Unsupported capability: {message}")]
    Unsupported { message: String },

    #[error("Recording error: {message}")]
    Recording { message: String },

    #[error("Location error: {message}")]
    Location { message: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CamlogError.
pub type CamlogResult<T> = Result<T, CamlogError>;

impl CamlogError {
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition {
            message: msg.into(),
        }
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    pub fn recording(msg: impl Into<String>) -> Self {
        Self::Recording {
            message: msg.into(),
        }
    }

    pub fn location(msg: impl Into<String>) -> Self {
        Self::Location {
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink {
            message: msg.into(),
        }
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }

    /// Whether this error came from a denied or missing capability grant,
    /// as opposed to a runtime fault.
    pub fn is_denied(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::Unsupported { .. }
        )
    }
}
