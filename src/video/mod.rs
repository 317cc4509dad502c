//! Video subsystem module

pub mod capture;
pub mod frame;
pub mod source;

pub use capture::CaptureWorker;
pub use frame::VideoFrame;
pub use source::{CameraSource, FrameSource};
