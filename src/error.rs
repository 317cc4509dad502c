//! Error types for the camera streaming service

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video capture errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Capture device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open capture device: {0}")]
    OpenFailed(String),

    #[error("Unsupported capture format: {0}")]
    UnsupportedFormat(String),

    #[error("Capture stream error: {0}")]
    StreamError(String),
}

/// External encoder process errors
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to spawn encoder process: {0}")]
    Spawn(std::io::Error),

    #[error("Encoder input pipe is closed")]
    InputClosed,

    #[error("Encoder process has exited")]
    ProcessExited,

    #[error("Encoder pipe error: {0}")]
    Pipe(std::io::Error),
}

/// Telemetry subsystem errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Sensor read failed: {0}")]
    Sensor(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
