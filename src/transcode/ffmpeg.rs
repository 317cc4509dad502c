//! ffmpeg subprocess transcoder
//!
//! Raw frames go into the encoder's stdin, the encoded elementary stream
//! comes back out of its stdout, stderr is discarded. The process is a pure
//! byte-stream filter; nothing else touches its handles.

use std::io::{ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use parking_lot::Mutex;

use crate::config::{TranscodeConfig, VideoConfig};
use crate::error::TranscodeError;

/// A running raw-frames-in, encoded-chunks-out transform.
///
/// Both sides block on pipe I/O. `read_chunk` returning `Ok(0)` is the
/// end-of-stream sentinel and is guaranteed to arrive once the process has
/// exited, so a reader never blocks forever on a dead encoder.
pub trait Transcoder: Send + Sync {
    /// Write one raw frame, blocking until the process accepts the bytes.
    fn write_frame(&self, frame: &[u8]) -> Result<(), TranscodeError>;

    /// Read the next run of encoded bytes into `buf`. `Ok(0)` means the
    /// stream has ended.
    fn read_chunk(&self, buf: &mut [u8]) -> Result<usize, TranscodeError>;

    /// Shut the transform down: close the input side, wait for the process
    /// to flush and exit, then close the output side — in that order.
    /// Idempotent, and correct whether or not the process already exited.
    fn stop(&self) -> Result<(), TranscodeError>;
}

/// Transcoder backed by a spawned ffmpeg process.
pub struct FfmpegTranscoder {
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<Option<ChildStdout>>,
}

impl FfmpegTranscoder {
    /// Spawn the encoder configured for the stream's raw input geometry and
    /// the target elementary-stream format.
    pub fn spawn(config: &TranscodeConfig, video: &VideoConfig) -> Result<Self, TranscodeError> {
        let mut cmd = Command::new(&config.ffmpeg_path);
        cmd.arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-s")
            .arg(format!("{}x{}", video.width, video.height))
            .arg("-r")
            .arg(video.framerate.to_string())
            .arg("-i")
            .arg("-")
            .arg("-f")
            .arg("mpeg1video")
            .arg("-b:v")
            .arg(&config.bitrate)
            .arg("-r")
            .arg(video.framerate.to_string())
            .arg("-");

        tracing::info!(encoder = %config.ffmpeg_path, bitrate = %config.bitrate, "spawning encoder process");
        Self::spawn_command(cmd)
    }

    fn spawn_command(mut cmd: Command) -> Result<Self, TranscodeError> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(TranscodeError::Spawn)?;
        let stdin = child.stdin.take().ok_or(TranscodeError::InputClosed)?;
        let stdout = child.stdout.take().ok_or(TranscodeError::ProcessExited)?;

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(Some(stdout)),
        })
    }
}

impl Transcoder for FfmpegTranscoder {
    fn write_frame(&self, frame: &[u8]) -> Result<(), TranscodeError> {
        let mut stdin = self.stdin.lock();
        let pipe = stdin.as_mut().ok_or(TranscodeError::InputClosed)?;
        pipe.write_all(frame).map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe => TranscodeError::ProcessExited,
            _ => TranscodeError::Pipe(e),
        })
    }

    fn read_chunk(&self, buf: &mut [u8]) -> Result<usize, TranscodeError> {
        let mut stdout = self.stdout.lock();
        match stdout.as_mut() {
            Some(pipe) => pipe.read(buf).map_err(TranscodeError::Pipe),
            None => Ok(0),
        }
    }

    fn stop(&self) -> Result<(), TranscodeError> {
        // Closing stdin first lets the process drain whatever frames it has
        // buffered and exit on its own.
        drop(self.stdin.lock().take());

        let wait_result = self.child.lock().wait();

        // The output side is closed only after the exit completed; an
        // in-flight read holds the lock until the pipe EOFs, so the reader
        // drains before the handle goes away.
        drop(self.stdout.lock().take());

        match wait_result {
            Ok(status) => {
                tracing::info!(%status, "encoder process exited");
                Ok(())
            }
            Err(e) => Err(TranscodeError::Pipe(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `cat` stands in for the encoder: stdin is echoed to stdout, EOF on
    // stdin ends the process.
    fn echo_process() -> FfmpegTranscoder {
        FfmpegTranscoder::spawn_command(Command::new("cat")).unwrap()
    }

    #[test]
    fn frames_flow_through_the_process() {
        let transcoder = echo_process();
        transcoder.write_frame(b"hello").unwrap();

        let mut buf = [0u8; 64];
        let n = transcoder.read_chunk(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn stop_closes_input_then_output() {
        let transcoder = echo_process();
        transcoder.write_frame(b"tail").unwrap();
        transcoder.stop().unwrap();

        // Input side is gone, output side reports end of stream.
        assert!(matches!(
            transcoder.write_frame(b"late"),
            Err(TranscodeError::InputClosed)
        ));
        let mut buf = [0u8; 16];
        assert_eq!(transcoder.read_chunk(&mut buf).unwrap(), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let transcoder = echo_process();
        transcoder.stop().unwrap();
        transcoder.stop().unwrap();
    }

    #[test]
    fn stop_after_process_already_exited() {
        let transcoder = FfmpegTranscoder::spawn_command(Command::new("true")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        transcoder.stop().unwrap();
    }

    #[test]
    fn reader_sees_eof_once_process_exits() {
        let transcoder = echo_process();
        // Close input from another thread while a read is pending.
        std::thread::scope(|s| {
            let t = &transcoder;
            s.spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(50));
                t.stop().unwrap();
            });
            let mut buf = [0u8; 16];
            assert_eq!(t.read_chunk(&mut buf).unwrap(), 0);
        });
    }
}
