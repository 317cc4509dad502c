//! Relay worker
//!
//! Sole reader of the transcoder's output: pulls encoded chunks off the
//! pipe and hands them to the hub, preserving stream order. Observing end
//! of stream means the encoder is gone, which ends the whole pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::broadcast::hub::BroadcastHub;
use crate::error::Error;
use crate::supervisor::PipelineEvent;
use crate::transcode::Transcoder;

/// Dedicated thread moving chunks from the transcoder into the hub.
pub struct RelayWorker {
    handle: Option<JoinHandle<()>>,
    chunks_relayed: Arc<AtomicU64>,
}

impl RelayWorker {
    pub fn spawn(
        transcoder: Arc<dyn Transcoder>,
        hub: Arc<BroadcastHub>,
        chunk_size: usize,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Result<Self, Error> {
        let chunks_relayed = Arc::new(AtomicU64::new(0));
        let counter = chunks_relayed.clone();

        let handle = thread::Builder::new()
            .name("chunk-relay".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; chunk_size.max(1)];
                loop {
                    match transcoder.read_chunk(&mut buf) {
                        Ok(0) => {
                            tracing::info!("encoder output ended");
                            break;
                        }
                        Ok(n) => {
                            hub.broadcast(Bytes::copy_from_slice(&buf[..n]));
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "encoder output read failed");
                            break;
                        }
                    }
                }
                let _ = events.send(PipelineEvent::StreamEnded);
            })?;

        Ok(Self {
            handle: Some(handle),
            chunks_relayed,
        })
    }

    /// Total chunks handed to the hub
    pub fn chunks_relayed(&self) -> u64 {
        self.chunks_relayed.load(Ordering::Relaxed)
    }

    /// Wait for the relay thread to finish. Returns once the transcoder's
    /// read side has reached end of stream.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
