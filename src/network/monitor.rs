//! Network Monitor
//!
//! Owns the online/offline flag. Only this module writes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{ConnectivityProbe, ConnectivityStatus};
use crate::error::NetworkError;
use crate::tasks::spawn_poll_task;

/// Folds one probe outcome into the shared flag.
///
/// A failed probe leaves the device treated as online. Returns the new state.
pub(crate) fn apply_probe_result(
    online: &AtomicBool,
    result: Result<ConnectivityStatus, NetworkError>,
) -> bool {
    let now_online = match result {
        Ok(status) => status.is_online(),
        Err(err) => {
            warn!(error = %err, "connectivity probe unavailable, assuming online");
            true
        }
    };
    let was_online = online.swap(now_online, Ordering::SeqCst);
    if was_online != now_online {
        info!(online = now_online, "network status changed");
    }
    now_online
}

// == Network Monitor ==
/// Tracks connectivity from an initial probe, change events and an
/// optional periodic poll.
///
/// Reports online until told otherwise. Going back online triggers
/// nothing here; callers decide whether to resync.
pub struct NetworkMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    online: Arc<AtomicBool>,
    poll_interval: Option<Duration>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NetworkMonitor {
    /// Creates a monitor. `poll_interval` of None disables polling.
    pub fn new(probe: Arc<dyn ConnectivityProbe>, poll_interval: Option<Duration>) -> Self {
        Self {
            probe,
            online: Arc::new(AtomicBool::new(true)),
            poll_interval,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Probes once, then subscribes to change events and starts the poll.
    ///
    /// Calling it again restarts the background tasks.
    pub async fn initialize(&self) {
        self.cleanup();

        let online = apply_probe_result(&self.online, self.probe.probe().await);
        info!(online, "network monitor initialized");

        let mut tasks = Vec::new();
        let subscription = self.probe.subscribe();
        let has_events = subscription.is_some();

        if let Some(mut rx) = subscription {
            let flag = Arc::clone(&self.online);
            tasks.push(tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let status = *rx.borrow_and_update();
                    apply_probe_result(&flag, Ok(status));
                }
            }));
        }

        match self.poll_interval {
            Some(interval) => tasks.push(spawn_poll_task(
                Arc::clone(&self.probe),
                Arc::clone(&self.online),
                interval,
            )),
            None if !has_events => {
                warn!("no connectivity events and polling disabled, status will not update")
            }
            None => {}
        }

        *self.tasks.lock().unwrap_or_else(PoisonError::into_inner) = tasks;
    }

    /// Last known connectivity.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Probes immediately and returns the updated state.
    pub async fn refresh(&self) -> bool {
        apply_probe_result(&self.online, self.probe.probe().await)
    }

    /// Unsubscribes from events and stops polling.
    pub fn cleanup(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("online", &self.is_online())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ManualConnectivity;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_defaults_to_online_before_initialize() {
        let net = Arc::new(ManualConnectivity::new(false));
        let monitor = NetworkMonitor::new(net, None);
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_initialize_probes_current_state() {
        let net = Arc::new(ManualConnectivity::new(false));
        let monitor = NetworkMonitor::new(net.clone(), None);
        monitor.initialize().await;

        assert!(!monitor.is_online());
        assert_eq!(net.probe_count(), 1);
        monitor.cleanup();
    }

    #[tokio::test]
    async fn test_follows_change_events() {
        let net = Arc::new(ManualConnectivity::new(true));
        let monitor = NetworkMonitor::new(net.clone(), None);
        monitor.initialize().await;

        net.set_online(false);
        settle().await;
        assert!(!monitor.is_online());

        net.set_online(true);
        settle().await;
        assert!(monitor.is_online());
        monitor.cleanup();
    }

    #[tokio::test]
    async fn test_cleanup_stops_following_events() {
        let net = Arc::new(ManualConnectivity::new(true));
        let monitor = NetworkMonitor::new(net.clone(), None);
        monitor.initialize().await;
        monitor.cleanup();
        settle().await;

        net.set_online(false);
        settle().await;
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_probe_failure_fails_open() {
        let net = Arc::new(ManualConnectivity::new(false));
        net.set_probe_failure(true);
        let monitor = NetworkMonitor::new(net, None);
        monitor.initialize().await;

        assert!(monitor.is_online());
        monitor.cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_picks_up_changes_without_events() {
        let net = Arc::new(ManualConnectivity::without_events(true));
        let monitor = NetworkMonitor::new(net.clone(), Some(Duration::from_secs(5)));
        monitor.initialize().await;
        assert!(monitor.is_online());

        net.set_online(false);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!monitor.is_online());
        monitor.cleanup();
    }

    #[tokio::test]
    async fn test_refresh() {
        let net = Arc::new(ManualConnectivity::without_events(true));
        let monitor = NetworkMonitor::new(net.clone(), None);
        monitor.initialize().await;

        net.set_online(false);
        assert!(!monitor.refresh().await);
        assert!(!monitor.is_online());
    }
}
