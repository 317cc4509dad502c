//! Periodic temperature sampling
//!
//! A recurring task supervised by the pipeline lifecycle: it stops cleanly
//! alongside the rest of the components instead of running detached.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::supervisor::LifecycleState;
use crate::telemetry::{TempStore, W1TempSensor};

/// Spawn the sampling task. It appends one reading per interval until the
/// lifecycle reaches `Stopping`.
pub fn spawn(
    sensor: Arc<W1TempSensor>,
    store: Arc<TempStore>,
    interval: Duration,
    mut state: watch::Receiver<LifecycleState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *state.borrow() >= LifecycleState::Stopping {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => match sensor.read() {
                    Ok(temp) => {
                        if let Err(e) = store.insert(temp as f64) {
                            tracing::warn!(error = %e, "failed to record temperature");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "temperature read failed"),
                },
                changed = state.changed() => {
                    if changed.is_err() || *state.borrow() >= LifecycleState::Stopping {
                        break;
                    }
                }
            }
        }
        tracing::debug!("temperature sampler stopped");
    })
}
