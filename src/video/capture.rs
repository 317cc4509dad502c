//! Capture worker
//!
//! Pulls raw frames out of the [`FrameSource`] and feeds them to the
//! transcoder's input pipe from a dedicated thread, so a stalled encoder
//! never blocks the async runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, watch};

use crate::error::VideoError;
use crate::supervisor::{LifecycleState, PipelineEvent};
use crate::transcode::Transcoder;
use crate::video::source::FrameSource;

/// Dedicated thread driving frames from the source into the transcoder.
pub struct CaptureWorker {
    handle: Option<JoinHandle<()>>,
    frames_captured: Arc<AtomicU64>,
}

impl CaptureWorker {
    /// Start capturing. The worker owns the source and closes it on exit.
    ///
    /// Once the lifecycle reaches `Stopping` the worker stops writing frames
    /// and exits without reporting pipe errors; during `Running`, a capture
    /// or write failure is reported as a pipeline event so the supervisor
    /// can shut the stream down.
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        sink: Arc<dyn Transcoder>,
        state: watch::Receiver<LifecycleState>,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Result<Self, VideoError> {
        let frames_captured = Arc::new(AtomicU64::new(0));
        let counter = frames_captured.clone();

        let handle = thread::Builder::new()
            .name("video-capture".to_string())
            .spawn(move || {
                let stopping = || *state.borrow() >= LifecycleState::Stopping;

                loop {
                    if stopping() {
                        break;
                    }
                    match source.next_frame() {
                        Ok(Some(frame)) => {
                            counter.fetch_add(1, Ordering::Relaxed);
                            if let Err(e) = sink.write_frame(&frame.data) {
                                if stopping() {
                                    break;
                                }
                                tracing::error!(error = %e, "encoder rejected frame");
                                let _ = events.send(PipelineEvent::CaptureFailed(e.into()));
                                break;
                            }
                        }
                        Ok(None) => {
                            if !stopping() {
                                tracing::info!("frame source ended");
                                let _ = events.send(PipelineEvent::CaptureEnded);
                            }
                            break;
                        }
                        Err(e) => {
                            if stopping() {
                                break;
                            }
                            tracing::error!(error = %e, "frame capture failed");
                            let _ = events.send(PipelineEvent::CaptureFailed(e.into()));
                            break;
                        }
                    }
                }

                source.close();
            })
            .map_err(|e| VideoError::StreamError(e.to_string()))?;

        Ok(Self {
            handle: Some(handle),
            frames_captured,
        })
    }

    /// Total frames handed to the transcoder
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    /// Wait for the worker thread to finish. Only returns promptly once the
    /// lifecycle has advanced to `Stopping` or the source has ended.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
