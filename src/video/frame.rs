//! Raw video frame type

use bytes::Bytes;

/// One raw captured image in the stream's fixed pixel format.
///
/// Frames are immutable once handed to the transcoder; dimensions and pixel
/// format are fixed per stream by the video configuration, so the frame only
/// carries its payload and position in the sequence.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Planar YUV 4:2:0 pixel data
    pub data: Bytes,
    /// Frame sequence number
    pub sequence: u64,
    /// Capture timestamp in microseconds since the stream started
    pub timestamp_us: u64,
}

impl VideoFrame {
    pub fn new(data: Bytes, sequence: u64, timestamp_us: u64) -> Self {
        Self {
            data,
            sequence,
            timestamp_us,
        }
    }

    /// Expected payload length for YUV 4:2:0 at the given geometry.
    pub fn expected_len(width: u32, height: u32) -> usize {
        (width as usize * height as usize * 3) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuv420_length() {
        assert_eq!(VideoFrame::expected_len(640, 480), 460_800);
        assert_eq!(VideoFrame::expected_len(2, 2), 6);
    }
}
