//! Artifact persistence: a bounded queue in front of a blocking store.
//!
//! Producers never assume emission succeeds. [`QueuedSink::submit`] applies
//! backpressure while the queue is full and returns an error once the
//! worker is gone, so a failed handoff is visible at the call site instead
//! of silently dropped.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use camlog_common::artifact::{Artifact, ArtifactSink};
use camlog_common::error::{CamlogError, CamlogResult};

/// Durable destination the queue worker drains into.
pub trait ArtifactStore: Send + 'static {
    /// Persist one artifact. Called from the worker task only.
    fn persist(&mut self, artifact: &Artifact) -> CamlogResult<()>;
}

/// Store writing each artifact as one file in a flat directory.
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open the store, creating `root` if needed.
    pub fn create(root: impl Into<PathBuf>) -> CamlogResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for DirectoryStore {
    fn persist(&mut self, artifact: &Artifact) -> CamlogResult<()> {
        let path = self.root.join(&artifact.name);
        std::fs::write(&path, &artifact.payload)?;
        tracing::debug!(
            path = %path.display(),
            bytes = artifact.payload.len(),
            "Artifact persisted"
        );
        Ok(())
    }
}

/// Sink backed by a bounded queue drained by a spawned worker task.
pub struct QueuedSink {
    tx: mpsc::Sender<Artifact>,
}

impl QueuedSink {
    /// Spawn the worker and return the sink plus the worker handle.
    ///
    /// The worker persists artifacts in submission order, logs (and skips)
    /// individual store failures, drains the queue completely once every
    /// sink handle has dropped, and resolves to the number of artifacts it
    /// persisted.
    pub fn spawn(mut store: impl ArtifactStore, depth: usize) -> (Self, JoinHandle<u64>) {
        let (tx, mut rx) = mpsc::channel::<Artifact>(depth.max(1));
        let worker = tokio::spawn(async move {
            let mut persisted: u64 = 0;
            while let Some(artifact) = rx.recv().await {
                match store.persist(&artifact) {
                    Ok(()) => persisted += 1,
                    Err(e) => {
                        tracing::error!(
                            artifact = %artifact.name,
                            error = %e,
                            "Failed to persist artifact"
                        );
                    }
                }
            }
            tracing::info!(persisted, "Artifact queue drained");
            persisted
        });
        (Self { tx }, worker)
    }
}

#[async_trait::async_trait]
impl ArtifactSink for QueuedSink {
    async fn submit(&self, artifact: Artifact) -> CamlogResult<()> {
        self.tx.send(artifact).await.map_err(|e| {
            CamlogError::sink(format!("artifact queue closed; dropping {}", e.0.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn directory_store_writes_one_file_per_artifact() {
        let dir = std::env::temp_dir().join("camlog_test_directory_store");
        let _ = std::fs::remove_dir_all(&dir);

        let store = DirectoryStore::create(&dir).unwrap();
        let (sink, worker) = QueuedSink::spawn(store, 8);

        sink.submit(Artifact::new("screen_a.webm", b"video".to_vec()))
            .await
            .unwrap();
        sink.submit(Artifact::new("location_a.json", b"{}".to_vec()))
            .await
            .unwrap();

        drop(sink);
        let persisted = worker.await.unwrap();
        assert_eq!(persisted, 2);

        assert_eq!(std::fs::read(dir.join("screen_a.webm")).unwrap(), b"video");
        assert_eq!(std::fs::read(dir.join("location_a.json")).unwrap(), b"{}");

        std::fs::remove_dir_all(&dir).ok();
    }

    /// Store recording persist order in memory.
    #[derive(Clone, Default)]
    struct RecordingStore {
        names: Arc<Mutex<Vec<String>>>,
        fail_on: Option<usize>,
        seen: Arc<Mutex<usize>>,
    }

    impl ArtifactStore for RecordingStore {
        fn persist(&mut self, artifact: &Artifact) -> CamlogResult<()> {
            let mut seen = self.seen.lock().unwrap();
            *seen += 1;
            if self.fail_on == Some(*seen) {
                return Err(CamlogError::sink("disk full"));
            }
            self.names.lock().unwrap().push(artifact.name.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn worker_preserves_submission_order() {
        let store = RecordingStore::default();
        let names = store.names.clone();
        let (sink, worker) = QueuedSink::spawn(store, 2);

        for name in ["a", "b", "c", "d"] {
            sink.submit(Artifact::new(name, vec![])).await.unwrap();
        }

        drop(sink);
        assert_eq!(worker.await.unwrap(), 4);
        assert_eq!(*names.lock().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn store_failure_skips_that_artifact_and_continues() {
        let store = RecordingStore {
            fail_on: Some(2),
            ..Default::default()
        };
        let names = store.names.clone();
        let (sink, worker) = QueuedSink::spawn(store, 8);

        for name in ["a", "b", "c"] {
            sink.submit(Artifact::new(name, vec![])).await.unwrap();
        }

        drop(sink);
        assert_eq!(worker.await.unwrap(), 2);
        assert_eq!(*names.lock().unwrap(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn submit_fails_once_the_worker_is_gone() {
        let (sink, worker) = QueuedSink::spawn(RecordingStore::default(), 8);
        worker.abort();
        let _ = worker.await;

        let result = sink.submit(Artifact::new("late.webm", vec![])).await;
        assert!(matches!(result, Err(CamlogError::Sink { .. })));
    }
}
