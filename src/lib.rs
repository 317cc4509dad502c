//! # Camera Streamer
//!
//! Single-host live-video broadcast: raw frames from a V4L2 camera are piped
//! through an external encoder process and fanned out to every connected
//! WebSocket viewer, with a small authenticated control plane alongside.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────┐   frames    ┌────────────┐   encoded chunks   ┌───────────┐
//! │  Camera  │────────────▶│  Encoder   │───────────────────▶│   Relay   │
//! │ (V4L2)   │  capture    │  process   │     relay thread   │   loop    │
//! └──────────┘   thread    │ (ffmpeg)   │                    └─────┬─────┘
//!                          └────────────┘                          │
//!                                                                  ▼
//!                                                          ┌──────────────┐
//!                         per-viewer bounded queues        │ BroadcastHub │
//!                      ┌───────────┬───────────┐           └──────┬───────┘
//!                      ▼           ▼           ▼                  │
//!                 ┌─────────┐ ┌─────────┐ ┌─────────┐             │
//!                 │ Viewer  │ │ Viewer  │ │ Viewer  │ ◀───────────┘
//!                 │ (ws)    │ │ (ws)    │ │ (ws)    │
//!                 └─────────┘ └─────────┘ └─────────┘
//!
//! Control plane (HTTP, basic auth): viewer page, player script,
//! current temperature, temperature history. A periodic sampler keeps the
//! history store fed; the supervisor starts and stops everything in order.
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod protocol;
pub mod supervisor;
pub mod telemetry;
pub mod transcode;
pub mod video;
pub mod web;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default frame width in pixels
    pub const DEFAULT_WIDTH: u32 = 640;

    /// Default frame height in pixels
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Default capture frame rate
    pub const DEFAULT_FRAMERATE: u32 = 24;

    /// Default elementary-stream bitrate (ffmpeg notation)
    pub const DEFAULT_BITRATE: &str = "800k";

    /// Default HTTP control-plane port
    pub const DEFAULT_HTTP_PORT: u16 = 8082;

    /// Default viewer WebSocket port
    pub const DEFAULT_WS_PORT: u16 = 8084;

    /// Read size when draining the encoder's output pipe
    pub const READ_CHUNK_SIZE: usize = 32768;

    /// Maximum undelivered chunks queued per viewer
    pub const DEFAULT_VIEWER_BACKLOG: usize = 64;

    /// Seconds between temperature samples
    pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 30;
}
