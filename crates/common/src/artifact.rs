//! The artifact contract.
//!
//! Every unit of camlog output, whether a media segment or a location
//! sample, is an [`Artifact`]: a named byte payload handed to an
//! [`ArtifactSink`] for durable storage. Submission is async and fallible
//! so producers can tell whether an artifact was actually accepted.

use std::sync::Mutex;

use crate::error::CamlogResult;

/// One persisted output unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Destination name, e.g. `screen_2026-08-07T09:15:00.123Z.webm`.
    pub name: String,

    /// Payload bytes. May be empty: a silent recording cycle still emits.
    pub payload: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Destination for finished artifacts.
#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Queue an artifact for durable storage.
    ///
    /// Returns an error if the sink can no longer accept artifacts (e.g.
    /// its worker has shut down). Producers treat submission failures as
    /// local to the artifact at hand.
    async fn submit(&self, artifact: Artifact) -> CamlogResult<()>;
}

/// Sink that records artifacts in memory, in submission order.
///
/// Used by tests to observe exactly which artifacts a producer emitted.
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<Vec<Artifact>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything submitted so far.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.lock().unwrap().clone()
    }

    /// Names of everything submitted so far, in order.
    pub fn names(&self) -> Vec<String> {
        self.artifacts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ArtifactSink for MemorySink {
    async fn submit(&self, artifact: Artifact) -> CamlogResult<()> {
        self.artifacts.lock().unwrap().push(artifact);
        Ok(())
    }
}
