//! Worker engine — a single dedicated pipeline thread with at-most-one
//! frame in flight.
//!
//! The camera loop submits frames through [`EngineHandle::submit`]; a frame
//! arriving while the worker is still busy is dropped, never queued. Results
//! flow back over a channel to whatever renders them.

use mien_core::{FrameOutcome, PipelineContext, RawFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

const RESULT_CHANNEL_CAPACITY: usize = 16;

/// Clone-safe handle for submitting frames to the worker thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<RawFrame>,
    busy: Arc<AtomicBool>,
}

impl EngineHandle {
    /// Submit a frame for processing.
    ///
    /// Returns `false` when the worker is still processing the previous
    /// frame (the new frame is dropped) or the engine has stopped.
    pub fn submit(&self, frame: RawFrame) -> bool {
        if self.busy.swap(true, Ordering::AcqRel) {
            tracing::trace!("worker busy, dropping frame");
            return false;
        }
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                self.busy.store(false, Ordering::Release);
                tracing::warn!(error = %e, "engine unavailable, dropping frame");
                false
            }
        }
    }
}

/// Spawn the pipeline worker on a dedicated OS thread.
///
/// The worker owns the [`PipelineContext`] (and with it the lazily-loaded
/// classifier handle) for its whole life. The returned receiver yields one
/// outcome per admitted frame; dropping it stops the worker.
pub fn spawn_engine(mut ctx: PipelineContext) -> (EngineHandle, mpsc::Receiver<FrameOutcome>) {
    let (frame_tx, mut frame_rx) = mpsc::channel::<RawFrame>(1);
    let (result_tx, result_rx) = mpsc::channel::<FrameOutcome>(RESULT_CHANNEL_CAPACITY);
    let busy = Arc::new(AtomicBool::new(false));
    let worker_busy = Arc::clone(&busy);

    std::thread::Builder::new()
        .name("mien-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(frame) = frame_rx.blocking_recv() {
                let outcome = ctx.process_frame(&frame);
                worker_busy.store(false, Ordering::Release);
                if result_tx.blocking_send(outcome).is_err() {
                    break;
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    (EngineHandle { tx: frame_tx, busy }, result_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mien_core::classifier::{ClassifierError, EmotionModel, LazyClassifier};
    use mien_core::{PipelineConfig, Plane, Rotation};
    use ndarray::Array4;
    use std::time::Duration;

    fn gray_frame() -> RawFrame {
        RawFrame {
            width: 16,
            height: 16,
            y: Plane::packed(vec![128; 256], 16),
            u: Plane::packed(vec![128; 64], 8),
            v: Plane::packed(vec![128; 64], 8),
            rotation: Rotation::Deg0,
        }
    }

    struct SlowModel {
        delay: Duration,
    }

    impl EmotionModel for SlowModel {
        fn forward(&mut self, _input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
            std::thread::sleep(self.delay);
            Ok(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0])
        }
    }

    fn slow_context(delay: Duration) -> PipelineContext {
        let classifier = LazyClassifier::with_loader(Box::new(move || {
            Ok(Box::new(SlowModel { delay }) as Box<dyn EmotionModel>)
        }));
        PipelineContext::new(PipelineConfig::default(), None, classifier)
    }

    #[tokio::test]
    async fn test_engine_processes_admitted_frames() {
        let (handle, mut results) = spawn_engine(slow_context(Duration::ZERO));

        assert!(handle.submit(gray_frame()));
        let outcome = results.recv().await.expect("worker alive");
        let result = outcome.result().expect("recognized");
        assert_eq!(result.label, "HAPPY");
    }

    #[tokio::test]
    async fn test_second_frame_is_dropped_while_busy() {
        let (handle, mut results) = spawn_engine(slow_context(Duration::from_millis(200)));

        assert!(handle.submit(gray_frame()));
        // The worker is processing; admission must refuse, not queue.
        assert!(!handle.submit(gray_frame()));

        let first = results.recv().await.expect("worker alive");
        assert!(first.result().is_some());

        // Idle again: the next frame is admitted.
        assert!(handle.submit(gray_frame()));
        assert!(results.recv().await.is_some());

        // Exactly two outcomes ever arrive.
        assert!(results.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_model_failure_still_yields_outcome() {
        let classifier = LazyClassifier::with_loader(Box::new(|| {
            Err(ClassifierError::ModelNotFound("gone".to_string()))
        }));
        let ctx = PipelineContext::new(PipelineConfig::default(), None, classifier);
        let (handle, mut results) = spawn_engine(ctx);

        assert!(handle.submit(gray_frame()));
        let outcome = results.recv().await.expect("worker alive");
        assert_eq!(outcome, FrameOutcome::ModelUnavailable);
        assert!(outcome.result().is_none());
    }
}
