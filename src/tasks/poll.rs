//! Connectivity Poll Task
//!
//! Background task that periodically re-probes connectivity. It backs up
//! change events that the platform may drop.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::network::{apply_probe_result, ConnectivityProbe};

/// Spawns a background task that re-probes connectivity every `interval`.
///
/// The first probe happens one interval after spawning; the caller is
/// expected to have probed already.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted by `NetworkMonitor::cleanup`.
pub fn spawn_poll_task(
    probe: Arc<dyn ConnectivityProbe>,
    online: Arc<AtomicBool>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "starting connectivity poll task");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let now_online = apply_probe_result(&online, probe.probe().await);
            debug!(online = now_online, "connectivity poll");
        }
    })
}
