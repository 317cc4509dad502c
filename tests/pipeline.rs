//! End-to-end pipeline test with a fake frame source and an echo transcoder.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc;

use picam_streamer::broadcast::BroadcastHub;
use picam_streamer::error::{TranscodeError, VideoError};
use picam_streamer::protocol::StreamHeader;
use picam_streamer::supervisor::{Lifecycle, LifecycleState, Pipeline, PipelineEvent};
use picam_streamer::transcode::Transcoder;
use picam_streamer::video::{FrameSource, VideoFrame};

/// Frame source driven by the test through a channel; the stream ends when
/// the sending side is dropped.
struct FakeSource {
    frames: Receiver<Bytes>,
    sequence: u64,
}

impl FakeSource {
    fn new(frames: Receiver<Bytes>) -> Self {
        Self { frames, sequence: 0 }
    }
}

impl FrameSource for FakeSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, VideoError> {
        match self.frames.recv() {
            Ok(data) => {
                let frame = VideoFrame::new(data, self.sequence, self.sequence * 1_000);
                self.sequence += 1;
                Ok(Some(frame))
            }
            Err(_) => Ok(None),
        }
    }

    fn close(&mut self) {}
}

/// Transcoder that echoes every written frame back as one output chunk.
struct EchoTranscoder {
    state: Mutex<EchoState>,
    available: Condvar,
}

struct EchoState {
    queue: VecDeque<Vec<u8>>,
    closed: bool,
}

impl EchoTranscoder {
    fn new() -> Self {
        Self {
            state: Mutex::new(EchoState {
                queue: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }
}

impl Transcoder for EchoTranscoder {
    fn write_frame(&self, frame: &[u8]) -> Result<(), TranscodeError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TranscodeError::InputClosed);
        }
        state.queue.push_back(frame.to_vec());
        self.available.notify_one();
        Ok(())
    }

    fn read_chunk(&self, buf: &mut [u8]) -> Result<usize, TranscodeError> {
        let mut state = self.state.lock();
        loop {
            if let Some(chunk) = state.queue.pop_front() {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                return Ok(n);
            }
            if state.closed {
                return Ok(0);
            }
            self.available.wait(&mut state);
        }
    }

    fn stop(&self) -> Result<(), TranscodeError> {
        let mut state = self.state.lock();
        state.closed = true;
        self.available.notify_all();
        Ok(())
    }
}

fn payload(i: u8) -> Bytes {
    Bytes::from(vec![i; 16])
}

async fn recv(rx: &mut mpsc::Receiver<Bytes>) -> Bytes {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for chunk")
        .expect("channel closed unexpectedly")
}

#[tokio::test(flavor = "multi_thread")]
async fn viewers_see_the_stream_in_order_from_their_join_point() {
    let lifecycle = Lifecycle::new();
    let hub = Arc::new(BroadcastHub::new(StreamHeader::new(64, 48), 32));
    let transcoder: Arc<dyn Transcoder> = Arc::new(EchoTranscoder::new());
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded::<Bytes>();

    // Viewer 1 is connected before the stream starts.
    let (_v1, mut v1_rx) = hub.register().unwrap();

    let mut pipeline = Pipeline::start(
        Box::new(FakeSource::new(frame_rx)),
        transcoder.clone(),
        hub.clone(),
        &lifecycle,
        4096,
    )
    .unwrap();
    lifecycle.advance(LifecycleState::Running);

    let header = recv(&mut v1_rx).await;
    assert_eq!(&header[..4], b"jsmp");

    // First half of the stream, observed by viewer 1 only.
    for i in 1..=5u8 {
        frame_tx.send(payload(i)).unwrap();
    }
    for i in 1..=5u8 {
        assert_eq!(recv(&mut v1_rx).await, payload(i));
    }

    // Viewer 2 joins mid-stream, after chunk 5 was delivered.
    let (_v2, mut v2_rx) = hub.register().unwrap();
    let header = recv(&mut v2_rx).await;
    assert_eq!(&header[..4], b"jsmp");

    for i in 6..=10u8 {
        frame_tx.send(payload(i)).unwrap();
    }
    for i in 6..=10u8 {
        assert_eq!(recv(&mut v1_rx).await, payload(i));
        assert_eq!(recv(&mut v2_rx).await, payload(i));
    }

    // End of input: the source reports it and the supervisor-side event
    // fires before any shutdown was requested.
    drop(frame_tx);
    match pipeline.next_event().await {
        PipelineEvent::CaptureEnded => {}
        other => panic!("unexpected pipeline event: {other:?}"),
    }

    // Clean ordered shutdown joins every component without error.
    lifecycle.advance(LifecycleState::Stopping);
    tokio::task::spawn_blocking(move || pipeline.shutdown())
        .await
        .unwrap()
        .unwrap();

    // Both viewers were closed and received nothing past their last chunk.
    assert!(v1_rx.recv().await.is_none());
    assert!(v2_rx.recv().await.is_none());
    assert_eq!(hub.viewer_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_with_an_idle_stream_is_clean() {
    let lifecycle = Lifecycle::new();
    let hub = Arc::new(BroadcastHub::new(StreamHeader::new(64, 48), 8));
    let transcoder: Arc<dyn Transcoder> = Arc::new(EchoTranscoder::new());
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded::<Bytes>();

    let (_viewer, mut viewer_rx) = hub.register().unwrap();

    let pipeline = Pipeline::start(
        Box::new(FakeSource::new(frame_rx)),
        transcoder,
        hub.clone(),
        &lifecycle,
        4096,
    )
    .unwrap();
    lifecycle.advance(LifecycleState::Running);

    // No frames ever flow; an interrupt-style shutdown must still complete.
    lifecycle.advance(LifecycleState::Stopping);
    drop(frame_tx);
    tokio::task::spawn_blocking(move || pipeline.shutdown())
        .await
        .unwrap()
        .unwrap();

    // The viewer got the header and then a clean close.
    let header = recv(&mut viewer_rx).await;
    assert_eq!(&header[..4], b"jsmp");
    assert!(viewer_rx.recv().await.is_none());
    assert!(hub.register().is_none());
}
