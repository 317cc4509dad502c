//! Broadcast hub
//!
//! Owns the set of connected viewers and copies every encoded chunk to each
//! of them. Delivery is per-viewer independent: each registration gets its
//! own bounded channel drained by that connection's writer task, so one slow
//! or dead viewer never delays the rest — it is disconnected instead.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::StreamHeader;

/// Identity handle returned at registration, used to unregister later.
pub type ViewerId = Uuid;

struct ViewerHandle {
    tx: mpsc::Sender<Bytes>,
}

/// Fan-out point between the relay loop and the viewer connections.
///
/// `broadcast` and `register`/`unregister` are safe to call concurrently
/// from different execution contexts; all synchronization is internal.
pub struct BroadcastHub {
    viewers: DashMap<ViewerId, ViewerHandle>,
    header: Bytes,
    backlog: usize,
    closed: AtomicBool,
}

impl BroadcastHub {
    /// `backlog` is the per-viewer bound on undelivered chunks; a viewer
    /// whose queue fills up is forcibly disconnected.
    pub fn new(header: StreamHeader, backlog: usize) -> Self {
        Self {
            viewers: DashMap::new(),
            header: header.encode(),
            backlog: backlog.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Add a viewer. Returns its identity and the receiving half of its
    /// outbound channel, with the stream header already queued as the first
    /// message so every viewer self-describes the stream at its join point.
    ///
    /// Returns `None` once the hub has shut down.
    pub fn register(&self) -> Option<(ViewerId, mpsc::Receiver<Bytes>)> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }

        // Header capacity is on top of the chunk backlog so a full queue
        // can never evict it.
        let (tx, rx) = mpsc::channel(self.backlog + 1);
        tx.try_send(self.header.clone()).ok()?;

        let id = Uuid::new_v4();
        self.viewers.insert(id, ViewerHandle { tx });

        // Shutdown may have raced the insert; never leave a viewer behind.
        if self.closed.load(Ordering::SeqCst) {
            self.viewers.remove(&id);
            return None;
        }

        tracing::debug!(viewer = %id, viewers = self.viewers.len(), "viewer registered");
        Some((id, rx))
    }

    /// Remove a viewer. Unregistering an unknown or already-removed viewer
    /// is a no-op.
    pub fn unregister(&self, id: ViewerId) {
        if self.viewers.remove(&id).is_some() {
            tracing::debug!(viewer = %id, viewers = self.viewers.len(), "viewer unregistered");
        }
    }

    /// Deliver one chunk to every currently registered viewer, in arrival
    /// order per viewer. A viewer whose backlog is full, or whose receiving
    /// side is gone, is dropped within this call and sees no later chunk.
    pub fn broadcast(&self, chunk: Bytes) {
        self.viewers.retain(|id, viewer| match viewer.tx.try_send(chunk.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(viewer = %id, "viewer backlog exceeded, disconnecting");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Number of currently connected viewers
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Refuse new registrations and close every viewer's channel, ending
    /// their writer tasks.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.viewers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(backlog: usize) -> BroadcastHub {
        BroadcastHub::new(StreamHeader::new(640, 480), backlog)
    }

    #[tokio::test]
    async fn header_arrives_before_any_chunk() {
        let hub = hub(8);
        let (_, mut rx) = hub.register().unwrap();
        hub.broadcast(Bytes::from_static(b"chunk-1"));

        assert_eq!(&rx.recv().await.unwrap()[..4], b"jsmp");
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"chunk-1"));
    }

    #[tokio::test]
    async fn chunks_arrive_in_broadcast_order() {
        let hub = hub(8);
        let (_, mut rx) = hub.register().unwrap();

        for i in 0..5u8 {
            hub.broadcast(Bytes::copy_from_slice(&[i]));
        }

        let _header = rx.recv().await.unwrap();
        for i in 0..5u8 {
            assert_eq!(rx.recv().await.unwrap(), Bytes::copy_from_slice(&[i]));
        }
    }

    #[tokio::test]
    async fn mid_stream_join_sees_no_earlier_chunks() {
        let hub = hub(8);
        hub.broadcast(Bytes::from_static(b"before"));

        let (_, mut rx) = hub.register().unwrap();
        hub.broadcast(Bytes::from_static(b"after"));
        hub.shutdown();

        let _header = rx.recv().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"after"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let hub = hub(8);
        let (id, _rx) = hub.register().unwrap();

        hub.unregister(id);
        hub.unregister(id);
        hub.unregister(Uuid::new_v4());
        assert_eq!(hub.viewer_count(), 0);
    }

    #[tokio::test]
    async fn backlog_overflow_disconnects_the_viewer() {
        let hub = hub(2);
        let (_, mut rx) = hub.register().unwrap();

        // Nothing drains the channel: header + 2 chunks fit, the third
        // overflows and must drop the viewer within the broadcast call.
        hub.broadcast(Bytes::from_static(b"c1"));
        hub.broadcast(Bytes::from_static(b"c2"));
        assert_eq!(hub.viewer_count(), 1);
        hub.broadcast(Bytes::from_static(b"c3"));
        assert_eq!(hub.viewer_count(), 0);

        // No chunk past the disconnect point is ever attempted.
        hub.broadcast(Bytes::from_static(b"c4"));
        let _header = rx.recv().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"c1"));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"c2"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn slow_viewer_does_not_block_others() {
        let hub = hub(1);
        let (_, mut fast_rx) = hub.register().unwrap();
        let (_, _slow_rx) = hub.register().unwrap();

        // The slow viewer never drains; the fast one keeps draining and
        // must see every chunk in order.
        for i in 0..4u8 {
            hub.broadcast(Bytes::copy_from_slice(&[i]));
            if i == 0 {
                let _header = fast_rx.recv().await.unwrap();
            }
            assert_eq!(fast_rx.recv().await.unwrap(), Bytes::copy_from_slice(&[i]));
        }
        assert_eq!(hub.viewer_count(), 1);
    }

    #[tokio::test]
    async fn register_after_shutdown_is_refused() {
        let hub = hub(8);
        hub.shutdown();
        assert!(hub.register().is_none());
    }
}
