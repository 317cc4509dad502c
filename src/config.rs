//! Application configuration
//!
//! All settings are collected into a single immutable [`AppConfig`] that is
//! built once at startup and passed by reference into each component. There
//! is no process-wide mutable configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub video: VideoConfig,
    pub transcode: TranscodeConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub telemetry: TelemetryConfig,
    pub display: DisplayConfig,
}

/// Camera geometry and orientation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// V4L2 device path
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// Flip the image vertically
    pub vflip: bool,
    /// Flip the image horizontally
    pub hflip: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            framerate: DEFAULT_FRAMERATE,
            vflip: false,
            hflip: false,
        }
    }
}

/// External encoder process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Encoder executable to spawn
    pub ffmpeg_path: String,
    /// Target elementary-stream bitrate, in ffmpeg notation
    pub bitrate: String,
    /// Read size for draining the encoder's output pipe
    pub chunk_size: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            bitrate: DEFAULT_BITRATE.to_string(),
            chunk_size: READ_CHUNK_SIZE,
        }
    }
}

/// Network listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Control-plane HTTP port
    pub http_port: u16,
    /// Viewer WebSocket port
    pub ws_port: u16,
    /// Directory holding the viewer page templates and player script
    pub assets_dir: PathBuf,
    /// Maximum undelivered chunks queued per viewer before it is dropped
    pub viewer_backlog: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            ws_port: DEFAULT_WS_PORT,
            assets_dir: PathBuf::from("assets"),
            viewer_backlog: DEFAULT_VIEWER_BACKLOG,
        }
    }
}

/// Shared credential for every HTTP and WebSocket request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    /// Usually left out of the config file and supplied via `AUTH_PASS`
    pub password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: None,
        }
    }
}

/// Temperature sampling and history storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// 1-Wire slave file exposing the sensor reading
    pub sensor_path: PathBuf,
    /// SQLite database holding the history
    pub db_path: PathBuf,
    pub sample_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sensor_path: PathBuf::from("/sys/bus/w1/devices/28-011452c4fbaa/w1_slave"),
            db_path: PathBuf::from("tempfile.db"),
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
        }
    }
}

/// Viewer page colors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: String,
    pub bgcolor: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: "#444".to_string(),
            bgcolor: "#333".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults when no
    /// file is given or the default location does not exist. The `AUTH_PASS`
    /// environment variable overrides the configured password.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };

        if let Ok(pass) = std::env::var("AUTH_PASS") {
            config.auth.password = Some(pass);
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.video.width == 0 || self.video.height == 0 {
            return Err(Error::Config("frame dimensions must be non-zero".into()));
        }
        // Dimensions travel to viewers as 16-bit fields in the stream header.
        if self.video.width > u16::MAX as u32 || self.video.height > u16::MAX as u32 {
            return Err(Error::Config(format!(
                "frame dimensions {}x{} exceed the wire header range",
                self.video.width, self.video.height
            )));
        }
        if self.video.framerate == 0 {
            return Err(Error::Config("framerate must be non-zero".into()));
        }
        if self.transcode.chunk_size == 0 {
            return Err(Error::Config("transcode chunk size must be non-zero".into()));
        }
        if self.server.viewer_backlog == 0 {
            return Err(Error::Config("viewer backlog must be non-zero".into()));
        }
        if self.telemetry.sample_interval_secs == 0 {
            return Err(Error::Config("sample interval must be non-zero".into()));
        }
        if self.auth.password.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(
                "no credential configured (set auth.password or AUTH_PASS)".into(),
            ));
        }
        Ok(())
    }
}

/// Default config file location under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "picam-streamer")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_password() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.password = Some("secret".to_string());
        config
    }

    #[test]
    fn defaults_validate() {
        assert!(with_password().validate().is_ok());
    }

    #[test]
    fn missing_password_rejected() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn oversized_dimensions_rejected() {
        let mut config = with_password();
        config.video.width = 70_000;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn parses_partial_toml() {
        let raw = r#"
            [video]
            width = 1280
            height = 720

            [auth]
            username = "jon"
            password = "hunter2"
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.video.width, 1280);
        assert_eq!(config.video.framerate, DEFAULT_FRAMERATE);
        assert_eq!(config.auth.username, "jon");
        assert!(config.validate().is_ok());
    }
}
