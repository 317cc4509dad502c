//! Camera frame sources
//!
//! The production source captures from a V4L2 device. Capture runs on a
//! dedicated thread that owns the device handle and mmap stream, feeding a
//! small bounded channel; the consumer side only ever sees [`VideoFrame`]s.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver};
use v4l::buffer::Type;
use v4l::control::{Control, Value};
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use crate::config::VideoConfig;
use crate::error::VideoError;
use crate::video::frame::VideoFrame;

const V4L2_CID_HFLIP: u32 = 0x0098_0914;
const V4L2_CID_VFLIP: u32 = 0x0098_0915;

/// Number of mmap buffers queued with the driver
const STREAM_BUFFERS: u32 = 4;

/// Frames buffered between the camera thread and the consumer
const FRAME_CHANNEL_CAPACITY: usize = 4;

/// An unbounded, non-restartable sequence of raw frames.
pub trait FrameSource: Send {
    /// Block until the next frame is available. Returns `Ok(None)` once the
    /// source has been stopped.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, VideoError>;

    /// Stop producing frames and release the underlying device.
    fn close(&mut self);
}

/// V4L2 camera source.
pub struct CameraSource {
    frame_rx: Receiver<VideoFrame>,
    error_rx: Receiver<VideoError>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    frames_dropped: Arc<AtomicU64>,
}

impl CameraSource {
    /// Open and configure the camera, then start the capture thread.
    ///
    /// Fails synchronously if the device cannot be opened or does not accept
    /// the configured geometry, so startup aborts before anything else runs.
    pub fn open(config: &VideoConfig) -> Result<Self, VideoError> {
        let (frame_tx, frame_rx) = bounded::<VideoFrame>(FRAME_CHANNEL_CAPACITY);
        let (error_tx, error_rx) = bounded::<VideoError>(1);
        let (ready_tx, ready_rx) = bounded::<Result<(), VideoError>>(1);

        let stop = Arc::new(AtomicBool::new(false));
        let frames_dropped = Arc::new(AtomicU64::new(0));

        let config = config.clone();
        let stop_flag = stop.clone();
        let dropped = frames_dropped.clone();

        let handle = thread::Builder::new()
            .name("camera-io".to_string())
            .spawn(move || {
                // The device handle and mmap stream live on this thread for
                // their whole lifetime.
                let dev = match open_device(&config) {
                    Ok(dev) => dev,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let mut stream =
                    match MmapStream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(VideoError::OpenFailed(e.to_string())));
                            return;
                        }
                    };
                let _ = ready_tx.send(Ok(()));

                let start = Instant::now();
                let mut sequence: u64 = 0;

                while !stop_flag.load(Ordering::Relaxed) {
                    match stream.next() {
                        Ok((buf, meta)) => {
                            let len = match meta.bytesused as usize {
                                0 => buf.len(),
                                used => used.min(buf.len()),
                            };
                            let frame = VideoFrame::new(
                                Bytes::copy_from_slice(&buf[..len]),
                                sequence,
                                start.elapsed().as_micros() as u64,
                            );
                            sequence += 1;

                            // Consumer not keeping up: drop the frame rather
                            // than stalling the driver queue.
                            if frame_tx.try_send(frame).is_err() {
                                dropped.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Err(e) => {
                            let _ = error_tx.try_send(VideoError::StreamError(e.to_string()));
                            break;
                        }
                    }
                }
            })
            .map_err(|e| VideoError::OpenFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                frame_rx,
                error_rx,
                stop,
                handle: Some(handle),
                frames_dropped,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(VideoError::OpenFailed("camera thread exited during init".to_string()))
            }
        }
    }

    /// Frames discarded because the consumer fell behind
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, VideoError> {
        match self.frame_rx.recv() {
            Ok(frame) => Ok(Some(frame)),
            // Channel closed: the camera thread is gone, either stopped or
            // failed. Surface the failure if it left one behind.
            Err(_) => match self.error_rx.try_recv() {
                Ok(e) => Err(e),
                Err(_) => Ok(None),
            },
        }
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_device(config: &VideoConfig) -> Result<Device, VideoError> {
    let dev = Device::with_path(&config.device)
        .map_err(|e| VideoError::DeviceNotFound(format!("{}: {}", config.device, e)))?;

    let yuv420 = FourCC::new(b"YU12");
    let requested = Format::new(config.width, config.height, yuv420);
    let actual = dev
        .set_format(&requested)
        .map_err(|e| VideoError::OpenFailed(e.to_string()))?;

    if actual.fourcc != yuv420 {
        return Err(VideoError::UnsupportedFormat(format!(
            "device selected {} instead of YU12",
            actual.fourcc
        )));
    }
    if actual.width != config.width || actual.height != config.height {
        return Err(VideoError::UnsupportedFormat(format!(
            "device selected {}x{} instead of {}x{}",
            actual.width, actual.height, config.width, config.height
        )));
    }

    dev.set_params(&Parameters::with_fps(config.framerate))
        .map_err(|e| VideoError::OpenFailed(e.to_string()))?;

    if config.hflip {
        set_flip(&dev, V4L2_CID_HFLIP, "hflip");
    }
    if config.vflip {
        set_flip(&dev, V4L2_CID_VFLIP, "vflip");
    }

    Ok(dev)
}

// Orientation is cosmetic: a driver without flip controls should not keep
// the stream from starting.
fn set_flip(dev: &Device, id: u32, name: &str) {
    if let Err(e) = dev.set_control(Control {
        id,
        value: Value::Boolean(true),
    }) {
        tracing::warn!(control = name, error = %e, "flip control not applied");
    }
}
