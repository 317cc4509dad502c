//! Startup/shutdown orchestration
//!
//! The supervisor owns the pipeline lifecycle state machine and enforces
//! the one ordering that is deadlock-free: components start source →
//! encoder → control plane → relay → capture, and stop in reverse. Every
//! shutdown step runs even if an earlier one failed; the first error is
//! reported after the whole sequence has been attempted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::broadcast::{BroadcastHub, RelayWorker};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::protocol::StreamHeader;
use crate::telemetry::{sampler, TempStore, W1TempSensor};
use crate::transcode::{FfmpegTranscoder, Transcoder};
use crate::video::source::{CameraSource, FrameSource};
use crate::video::CaptureWorker;
use crate::web::auth::AuthKey;
use crate::web::templates::PageTemplates;
use crate::web::{AppState, WebServer};

/// Pipeline lifecycle. Monotonic: no state is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Owner of the lifecycle state, published on a watch channel that every
/// supervised component subscribes to.
pub struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Move the lifecycle forward. Attempts to move backwards are ignored.
    pub fn advance(&self, next: LifecycleState) {
        self.tx.send_if_modified(|current| {
            if next > *current {
                tracing::debug!(from = ?current, to = ?next, "lifecycle transition");
                *current = next;
                true
            } else {
                false
            }
        });
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Reasons the streaming core stops on its own.
#[derive(Debug)]
pub enum PipelineEvent {
    /// The transcoder's output reached end of stream.
    StreamEnded,
    /// The frame source stopped producing frames.
    CaptureEnded,
    /// The capture path failed while running.
    CaptureFailed(Error),
}

/// The streaming core: capture worker, transcoder, relay worker and hub,
/// wired together with the ordered shutdown they require.
pub struct Pipeline {
    transcoder: Arc<dyn Transcoder>,
    hub: Arc<BroadcastHub>,
    capture: CaptureWorker,
    relay: RelayWorker,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
}

impl Pipeline {
    /// Launch the relay loop, then begin capture. The source and the
    /// transcoder must already be open/running.
    pub fn start(
        source: Box<dyn FrameSource>,
        transcoder: Arc<dyn Transcoder>,
        hub: Arc<BroadcastHub>,
        lifecycle: &Lifecycle,
        chunk_size: usize,
    ) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let relay = RelayWorker::spawn(transcoder.clone(), hub.clone(), chunk_size, events_tx.clone())?;
        let capture = CaptureWorker::spawn(source, transcoder.clone(), lifecycle.subscribe(), events_tx)?;

        Ok(Self {
            transcoder,
            hub,
            capture,
            relay,
            events: events_rx,
        })
    }

    /// Wait for the pipeline to stop on its own.
    pub async fn next_event(&mut self) -> PipelineEvent {
        self.events.recv().await.unwrap_or(PipelineEvent::StreamEnded)
    }

    /// Total chunks relayed so far
    pub fn chunks_relayed(&self) -> u64 {
        self.relay.chunks_relayed()
    }

    /// Tear the core down in order: join capture (stops frame writes and
    /// closes the source), stop the transcoder (flush, exit, close pipes),
    /// join the relay (exits on the encoder's end of stream), then close
    /// every viewer. The lifecycle must already be at `Stopping`, otherwise
    /// the capture worker will not let go.
    ///
    /// Every step runs even if an earlier one failed; the first error is
    /// returned once the whole sequence has been attempted.
    pub fn shutdown(mut self) -> Result<()> {
        let mut first_err: Option<Error> = None;

        self.capture.join();

        if let Err(e) = self.transcoder.stop() {
            first_err.get_or_insert(e.into());
        }

        self.relay.join();
        self.hub.shutdown();

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Assembles the whole service and runs it until an interrupt or until the
/// pipeline ends on its own.
pub struct Supervisor {
    config: AppConfig,
}

impl Supervisor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config;
        let lifecycle = Lifecycle::new();

        // Startup, in the only order that keeps partial failure unwindable:
        // each step tears down what came before it if it fails.
        tracing::info!(device = %config.video.device, "opening frame source");
        let source = CameraSource::open(&config.video)?;

        tracing::info!("starting transcoder");
        let transcoder: Arc<dyn Transcoder> =
            match FfmpegTranscoder::spawn(&config.transcode, &config.video) {
                Ok(t) => Arc::new(t),
                Err(e) => return Err(e.into()),
            };

        let store = match TempStore::open(&config.telemetry.db_path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                let _ = transcoder.stop();
                return Err(e.into());
            }
        };
        let templates = match PageTemplates::load(&config.server.assets_dir) {
            Ok(templates) => templates,
            Err(e) => {
                let _ = transcoder.stop();
                return Err(e);
            }
        };
        let sensor = Arc::new(W1TempSensor::new(config.telemetry.sensor_path.clone()));

        let header = StreamHeader::new(config.video.width as u16, config.video.height as u16);
        let hub = Arc::new(BroadcastHub::new(header, config.server.viewer_backlog));

        let password = config.auth.password.clone().unwrap_or_default();
        let state = Arc::new(AppState {
            hub: hub.clone(),
            store: store.clone(),
            sensor: sensor.clone(),
            templates,
            auth: AuthKey::new(&config.auth.username, &password),
            video: config.video.clone(),
            display: config.display.clone(),
            ws_port: config.server.ws_port,
        });

        tracing::info!("starting control plane");
        let server = match WebServer::start(state, &config.server, lifecycle.subscribe()).await {
            Ok(server) => server,
            Err(e) => {
                let _ = transcoder.stop();
                return Err(e);
            }
        };

        let sampler_handle = sampler::spawn(
            sensor,
            store,
            Duration::from_secs(config.telemetry.sample_interval_secs),
            lifecycle.subscribe(),
        );

        tracing::info!("starting relay and capture");
        let mut pipeline = match Pipeline::start(
            Box::new(source),
            transcoder.clone(),
            hub.clone(),
            &lifecycle,
            config.transcode.chunk_size,
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                lifecycle.advance(LifecycleState::Stopping);
                let _ = transcoder.stop();
                let _ = server.shutdown().await;
                lifecycle.advance(LifecycleState::Stopped);
                return Err(e);
            }
        };

        lifecycle.advance(LifecycleState::Running);
        tracing::info!("pipeline running");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received, shutting down"),
            event = pipeline.next_event() => match event {
                PipelineEvent::StreamEnded => tracing::info!("stream ended, shutting down"),
                PipelineEvent::CaptureEnded => tracing::info!("capture ended, shutting down"),
                PipelineEvent::CaptureFailed(e) => tracing::error!(error = %e, "capture failed, shutting down"),
            },
        }

        lifecycle.advance(LifecycleState::Stopping);
        let mut first_err: Option<Error> = None;

        // Core teardown happens off the runtime: it joins threads and waits
        // on the encoder process.
        match tokio::task::spawn_blocking(move || pipeline.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                first_err.get_or_insert(e);
            }
            Err(e) => {
                first_err.get_or_insert(Error::Config(format!("pipeline shutdown panicked: {e}")));
            }
        }

        // With every viewer closed the listeners can drain out.
        if let Err(e) = server.shutdown().await {
            first_err.get_or_insert(e);
        }

        let _ = sampler_handle.await;

        lifecycle.advance(LifecycleState::Stopped);
        tracing::info!("shutdown complete");

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
