//! Segment recording cycles.
//!
//! A [`SegmentRecorder`] owns one live source and runs an unbounded
//! sequence of recording cycles over it. Each cycle is an explicit state
//! machine:
//!
//! ```text
//! Recording ──deadline──▶ Stopping ──Stopped event──▶ Finalizing ─┐
//!     ▲                                                           │
//!     └──────────────────── same source ─────────────────────────-┘
//! ```
//!
//! The deadline is armed from cycle start, not from the last chunk. Chunks
//! delivered between the stop request and the stop completion still belong
//! to the closing cycle; the buffer is assembled exactly once and the next
//! cycle opens immediately on the same source.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use camlog_common::artifact::{Artifact, ArtifactSink};
use camlog_common::clock::wall_timestamp;
use camlog_common::config::FailurePolicy;
use camlog_common::error::{CamlogError, CamlogResult};

use crate::source::MediaSource;

/// Events a recording primitive delivers during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEvent {
    /// Encoded data became available.
    Chunk(Vec<u8>),
    /// The cycle finished stopping. Fires exactly once, only after a stop
    /// request, and only after every chunk for the cycle was delivered.
    Stopped,
}

/// Handle to one in-flight recording cycle.
#[derive(Debug)]
pub struct CycleHandle {
    /// Event stream for this cycle.
    pub events: mpsc::Receiver<CycleEvent>,
    /// Stop request, consumed when the recorder asks the cycle to end.
    pub stop: oneshot::Sender<()>,
}

/// Abstract interface to the underlying recording machinery.
///
/// One call opens one cycle on a live source. The primitive keeps encoding
/// until the stop request fires, then flushes any remaining chunks and
/// sends [`CycleEvent::Stopped`].
pub trait RecordingPrimitive: Send + Sync {
    fn start_cycle(&self, source: &MediaSource) -> CamlogResult<CycleHandle>;
}

/// Phase of the per-cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Consuming chunks; the segment deadline is armed.
    Recording,
    /// Stop requested; still accepting chunks until stop completion.
    Stopping,
    /// Assembling and submitting the segment payload.
    Finalizing,
}

/// Append-only accumulator for one cycle's chunks. Owned by exactly one
/// cycle and discarded after finalization.
#[derive(Debug, Default)]
struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    bytes: usize,
}

impl ChunkBuffer {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, chunk: Vec<u8>) {
        self.bytes += chunk.len();
        self.chunks.push(chunk);
    }

    fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Concatenate all chunks in arrival order.
    fn into_payload(self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.bytes);
        for chunk in self.chunks {
            payload.extend_from_slice(&chunk);
        }
        payload
    }
}

enum CycleOutcome {
    /// The cycle ran its full window.
    Completed,
    /// The cycle was cut short by session shutdown; its segment was still
    /// emitted.
    Interrupted,
}

/// Slices one media source into fixed-duration segment artifacts.
pub struct SegmentRecorder {
    source: MediaSource,
    primitive: Arc<dyn RecordingPrimitive>,
    sink: Arc<dyn ArtifactSink>,
    segment_duration: Duration,
    policy: FailurePolicy,
    shutdown: watch::Receiver<bool>,
    segments_emitted: u64,
}

impl SegmentRecorder {
    pub fn new(
        source: MediaSource,
        primitive: Arc<dyn RecordingPrimitive>,
        sink: Arc<dyn ArtifactSink>,
        segment_duration: Duration,
        policy: FailurePolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            primitive,
            sink,
            segment_duration,
            policy,
            shutdown,
            segments_emitted: 0,
        }
    }

    /// Drive cycles until the shutdown signal fires. Returns the number of
    /// segments emitted.
    ///
    /// A cycle failure is fatal to this stream under
    /// [`FailurePolicy::HaltOnFailure`]; under
    /// [`FailurePolicy::RestartOnFailure`] a fresh cycle opens immediately
    /// on the same source, with no backoff. Either way nothing escapes to
    /// the sibling stream or the location sampler.
    pub async fn run(mut self) -> CamlogResult<u64> {
        tracing::info!(
            label = %self.source.label(),
            segment_secs = self.segment_duration.as_secs(),
            "Segment recorder started"
        );

        loop {
            if *self.shutdown.borrow() {
                break;
            }
            match self.run_cycle().await {
                Ok(CycleOutcome::Completed) => {}
                Ok(CycleOutcome::Interrupted) => break,
                Err(e) => match self.policy {
                    FailurePolicy::HaltOnFailure => {
                        tracing::error!(
                            label = %self.source.label(),
                            error = %e,
                            "Recording cycle failed; halting this stream"
                        );
                        return Err(e);
                    }
                    FailurePolicy::RestartOnFailure => {
                        tracing::warn!(
                            label = %self.source.label(),
                            error = %e,
                            "Recording cycle failed; restarting on the same source"
                        );
                        // no backoff, but stay cooperative if the primitive
                        // fails persistently
                        tokio::task::yield_now().await;
                    }
                },
            }
        }

        tracing::info!(
            label = %self.source.label(),
            segments = self.segments_emitted,
            "Segment recorder stopped"
        );
        Ok(self.segments_emitted)
    }

    async fn run_cycle(&mut self) -> CamlogResult<CycleOutcome> {
        let CycleHandle { mut events, stop } = self.primitive.start_cycle(&self.source)?;
        let mut stop = Some(stop);
        let mut buffer = ChunkBuffer::new();
        let deadline = Instant::now() + self.segment_duration;
        let mut phase = CyclePhase::Recording;
        let mut interrupted = false;

        tracing::debug!(label = %self.source.label(), "Recording cycle opened");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(CycleEvent::Chunk(data)) => {
                        if !data.is_empty() {
                            buffer.push(data);
                        }
                    }
                    Some(CycleEvent::Stopped) => break,
                    None => {
                        return Err(CamlogError::recording(
                            "cycle event stream closed before stop completion",
                        ));
                    }
                },
                _ = tokio::time::sleep_until(deadline), if phase == CyclePhase::Recording => {
                    phase = CyclePhase::Stopping;
                    request_stop(&mut stop, &self.source)?;
                }
                changed = self.shutdown.changed(), if phase == CyclePhase::Recording => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        interrupted = true;
                        phase = CyclePhase::Stopping;
                        request_stop(&mut stop, &self.source)?;
                    }
                }
            }
        }

        phase = CyclePhase::Finalizing;
        tracing::debug!(
            label = %self.source.label(),
            ?phase,
            chunks = buffer.chunk_count(),
            "Assembling segment"
        );

        let timestamp = wall_timestamp();
        let name = format!("{}_{}.webm", self.source.label(), timestamp);
        let payload = buffer.into_payload();
        let bytes = payload.len();
        self.sink.submit(Artifact::new(name.clone(), payload)).await?;
        self.segments_emitted += 1;

        tracing::info!(label = %self.source.label(), artifact = %name, bytes, "Segment emitted");

        Ok(if interrupted {
            CycleOutcome::Interrupted
        } else {
            CycleOutcome::Completed
        })
    }
}

fn request_stop(stop: &mut Option<oneshot::Sender<()>>, source: &MediaSource) -> CamlogResult<()> {
    let Some(tx) = stop.take() else {
        return Ok(());
    };
    tx.send(()).map_err(|_| {
        CamlogError::recording(format!(
            "recording primitive for {} dropped its stop channel",
            source.label()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU64, Ordering};

    use proptest::prelude::*;

    use camlog_common::artifact::MemorySink;
    use camlog_common::error::CamlogError;

    use crate::source::StreamLabel;

    /// Scripted primitive: sends its immediate chunks as soon as a cycle
    /// opens, waits for the stop request, then sends its late chunks and
    /// `Stopped`.
    struct ScriptedPrimitive {
        cycles: AtomicU64,
        immediate_chunks: Vec<Vec<u8>>,
        late_chunks: Vec<Vec<u8>>,
        fail_start_on_cycle: Option<u64>,
        die_without_stopped: bool,
        drop_stop_receiver: bool,
    }

    impl ScriptedPrimitive {
        fn new(immediate: &[&[u8]], late: &[&[u8]]) -> Self {
            Self {
                cycles: AtomicU64::new(0),
                immediate_chunks: immediate.iter().map(|c| c.to_vec()).collect(),
                late_chunks: late.iter().map(|c| c.to_vec()).collect(),
                fail_start_on_cycle: None,
                die_without_stopped: false,
                drop_stop_receiver: false,
            }
        }

        fn fail_start_on_cycle(mut self, cycle: u64) -> Self {
            self.fail_start_on_cycle = Some(cycle);
            self
        }

        fn die_without_stopped(mut self) -> Self {
            self.die_without_stopped = true;
            self
        }

        fn drop_stop_receiver(mut self) -> Self {
            self.drop_stop_receiver = true;
            self
        }
    }

    impl RecordingPrimitive for ScriptedPrimitive {
        fn start_cycle(&self, _source: &MediaSource) -> CamlogResult<CycleHandle> {
            let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_start_on_cycle == Some(cycle) {
                return Err(CamlogError::recording("primitive refused to start"));
            }

            let (event_tx, events) = mpsc::channel(32);
            let (stop, stop_rx) = oneshot::channel();
            let immediate = self.immediate_chunks.clone();
            let late = self.late_chunks.clone();
            let die = self.die_without_stopped;

            if self.drop_stop_receiver {
                drop(stop_rx);
                tokio::spawn(async move {
                    for chunk in immediate {
                        let _ = event_tx.send(CycleEvent::Chunk(chunk)).await;
                    }
                    // keep the event channel open so only the stop request
                    // can fail
                    std::future::pending::<()>().await;
                });
                return Ok(CycleHandle { events, stop });
            }

            tokio::spawn(async move {
                for chunk in immediate {
                    let _ = event_tx.send(CycleEvent::Chunk(chunk)).await;
                }
                if stop_rx.await.is_ok() {
                    if die {
                        return;
                    }
                    for chunk in late {
                        let _ = event_tx.send(CycleEvent::Chunk(chunk)).await;
                    }
                    let _ = event_tx.send(CycleEvent::Stopped).await;
                }
            });
            Ok(CycleHandle { events, stop })
        }
    }

    fn recorder(
        primitive: Arc<dyn RecordingPrimitive>,
        sink: Arc<MemorySink>,
        policy: FailurePolicy,
        shutdown: watch::Receiver<bool>,
    ) -> SegmentRecorder {
        SegmentRecorder::new(
            MediaSource::new(StreamLabel::Screen, 1),
            primitive,
            sink,
            Duration::from_secs(60),
            policy,
            shutdown,
        )
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_artifact_per_window() {
        let primitive = Arc::new(ScriptedPrimitive::new(&[b"frame"], &[]));
        let sink = Arc::new(MemorySink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(
            recorder(primitive, sink.clone(), FailurePolicy::HaltOnFailure, stop_rx).run(),
        );
        settle().await;

        // mid-window: nothing finalized yet
        tokio::time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(sink.len(), 0);

        // t = 60: exactly one segment
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(sink.len(), 1);

        // t = 120: exactly two
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(sink.len(), 2);

        let names = sink.names();
        assert!(names.iter().all(|n| n.starts_with("screen_")));
        assert!(names.iter().all(|n| n.ends_with(".webm")));

        // shutdown cuts the third cycle short but still flushes it
        stop_tx.send(true).unwrap();
        let segments = task.await.unwrap().unwrap();
        assert_eq!(segments, 3);
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_after_stop_request_belong_to_the_closing_segment() {
        let primitive = Arc::new(ScriptedPrimitive::new(&[b"one", b"two"], &[b"tail"]));
        let sink = Arc::new(MemorySink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(
            recorder(primitive, sink.clone(), FailurePolicy::HaltOnFailure, stop_rx).run(),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;

        let artifacts = sink.artifacts();
        assert_eq!(artifacts.len(), 2);
        // arrival order preserved, late chunk included, nothing leaks into
        // the next segment
        assert_eq!(artifacts[0].payload, b"onetwotail".to_vec());
        assert_eq!(artifacts[1].payload, b"onetwotail".to_vec());

        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_cycle_still_emits_an_artifact() {
        let primitive = Arc::new(ScriptedPrimitive::new(&[], &[]));
        let sink = Arc::new(MemorySink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(
            recorder(primitive, sink.clone(), FailurePolicy::HaltOnFailure, stop_rx).run(),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;

        let artifacts = sink.artifacts();
        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].payload.is_empty());

        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_mid_window_flushes_the_open_cycle() {
        let primitive = Arc::new(ScriptedPrimitive::new(&[b"partial"], &[]));
        let sink = Arc::new(MemorySink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(
            recorder(primitive, sink.clone(), FailurePolicy::HaltOnFailure, stop_rx).run(),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(sink.len(), 0);

        stop_tx.send(true).unwrap();
        let segments = task.await.unwrap().unwrap();
        assert_eq!(segments, 1);
        assert_eq!(sink.artifacts()[0].payload, b"partial".to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn halt_policy_ends_the_stream_on_primitive_failure() {
        let primitive = Arc::new(ScriptedPrimitive::new(&[b"x"], &[]).fail_start_on_cycle(2));
        let sink = Arc::new(MemorySink::new());
        let (_stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(
            recorder(primitive, sink.clone(), FailurePolicy::HaltOnFailure, stop_rx).run(),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(sink.len(), 1);

        // the second cycle refused to start; the stream halts with the error
        let result = task.await.unwrap();
        assert!(matches!(result, Err(CamlogError::Recording { .. })));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_policy_opens_a_fresh_cycle_after_failure() {
        let primitive = Arc::new(ScriptedPrimitive::new(&[b"x"], &[]).fail_start_on_cycle(2));
        let sink = Arc::new(MemorySink::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(
            recorder(
                primitive,
                sink.clone(),
                FailurePolicy::RestartOnFailure,
                stop_rx,
            )
            .run(),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(sink.len(), 1);

        // cycle 2 failed at start, cycle 3 replaced it and runs the next
        // full window
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(sink.len(), 2);

        stop_tx.send(true).unwrap();
        let segments = task.await.unwrap().unwrap();
        assert_eq!(segments, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn event_stream_closing_without_stopped_is_a_failure() {
        let primitive = Arc::new(ScriptedPrimitive::new(&[b"x"], &[]).die_without_stopped());
        let sink = Arc::new(MemorySink::new());
        let (_stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(
            recorder(primitive, sink.clone(), FailurePolicy::HaltOnFailure, stop_rx).run(),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;

        let result = task.await.unwrap();
        assert!(matches!(result, Err(CamlogError::Recording { .. })));
        // the aborted cycle emits nothing
        assert_eq!(sink.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_stop_request_is_a_failure() {
        let primitive = Arc::new(ScriptedPrimitive::new(&[b"x"], &[]).drop_stop_receiver());
        let sink = Arc::new(MemorySink::new());
        let (_stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(
            recorder(primitive, sink.clone(), FailurePolicy::HaltOnFailure, stop_rx).run(),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;

        let result = task.await.unwrap();
        assert!(matches!(result, Err(CamlogError::Recording { .. })));
    }

    proptest! {
        #[test]
        fn buffer_payload_is_exact_in_order_concatenation(
            chunks in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..64),
                0..32,
            )
        ) {
            let mut buffer = ChunkBuffer::new();
            let mut expected = Vec::new();
            for chunk in &chunks {
                expected.extend_from_slice(chunk);
                buffer.push(chunk.clone());
            }
            prop_assert_eq!(buffer.chunk_count(), chunks.len());
            prop_assert_eq!(buffer.into_payload(), expected);
        }
    }
}
