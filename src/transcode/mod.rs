//! External encoder process wrapper
//!
//! The raw-to-elementary-stream conversion is delegated to a spawned
//! encoder process; this module owns its pipes and shutdown ordering.

pub mod ffmpeg;

pub use ffmpeg::{FfmpegTranscoder, Transcoder};
