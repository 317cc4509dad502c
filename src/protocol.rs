//! Wire and API types shared between subsystems
//!
//! The viewer stream protocol is deliberately minimal: a fixed 8-byte
//! header on connect, then raw elementary-stream bytes with no framing.
//! Consumers know the codec out of band.

use bytes::Bytes;

/// Magic constant identifying the stream format to the player.
pub const STREAM_MAGIC: &[u8; 4] = b"jsmp";

/// Fixed-size header sent to every viewer before any video data.
///
/// Layout: 4-byte magic, 2-byte big-endian width, 2-byte big-endian height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub width: u16,
    pub height: u16,
}

impl StreamHeader {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Pack the header into its wire representation.
    pub fn encode(&self) -> Bytes {
        let mut buf = [0u8; 8];
        buf[..4].copy_from_slice(STREAM_MAGIC);
        buf[4..6].copy_from_slice(&self.width.to_be_bytes());
        buf[6..8].copy_from_slice(&self.height.to_be_bytes());
        Bytes::copy_from_slice(&buf)
    }
}

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Current temperature reading as served by `/temparature`.
///
/// The field name keeps the endpoint's historical spelling so existing
/// clients continue to parse it.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct TemperatureReading {
    pub temparature: f32,
}
