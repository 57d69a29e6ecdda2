//! Connectivity primitives.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::debug;

use crate::error::NetworkError;

// == Connectivity Status ==
/// Snapshot reported by the platform connectivity primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityStatus {
    /// A network interface is up
    pub connected: bool,
    /// The internet is reachable, None if not yet determined
    pub reachable: Option<bool>,
}

impl ConnectivityStatus {
    pub fn online() -> Self {
        Self {
            connected: true,
            reachable: Some(true),
        }
    }

    pub fn offline() -> Self {
        Self {
            connected: false,
            reachable: Some(false),
        }
    }

    /// Connected and not known to be unreachable.
    pub fn is_online(&self) -> bool {
        self.connected && self.reachable != Some(false)
    }
}

// == Connectivity Probe ==
/// Platform connectivity primitive.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + 'static {
    /// Checks current connectivity.
    async fn probe(&self) -> Result<ConnectivityStatus, NetworkError>;

    /// Stream of change events, None if the platform has none.
    ///
    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Option<watch::Receiver<ConnectivityStatus>> {
        None
    }
}

// == TCP Probe ==
/// Probes connectivity by opening a TCP connection to a well-known address.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn probe(&self) -> Result<ConnectivityStatus, NetworkError> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => Ok(ConnectivityStatus::online()),
            Ok(Err(err)) => {
                debug!(addr = %self.addr, error = %err, "tcp probe failed");
                Ok(ConnectivityStatus::offline())
            }
            Err(_) => {
                debug!(addr = %self.addr, "tcp probe timed out");
                Ok(ConnectivityStatus::offline())
            }
        }
    }
}

// == Manual Connectivity ==
/// Programmable connectivity primitive with change events.
///
/// Used by tests and by hosts that learn connectivity from elsewhere.
#[derive(Debug)]
pub struct ManualConnectivity {
    status: watch::Sender<ConnectivityStatus>,
    fail_probe: AtomicBool,
    events: bool,
    probes: AtomicUsize,
}

impl ManualConnectivity {
    /// Creates a primitive that emits change events.
    pub fn new(online: bool) -> Self {
        let status = if online {
            ConnectivityStatus::online()
        } else {
            ConnectivityStatus::offline()
        };
        let (tx, _rx) = watch::channel(status);
        Self {
            status: tx,
            fail_probe: AtomicBool::new(false),
            events: true,
            probes: AtomicUsize::new(0),
        }
    }

    /// Creates a primitive that can only be polled.
    pub fn without_events(online: bool) -> Self {
        Self {
            events: false,
            ..Self::new(online)
        }
    }

    /// Changes connectivity and notifies subscribers.
    pub fn set_status(&self, status: ConnectivityStatus) {
        self.status.send_replace(status);
    }

    pub fn set_online(&self, online: bool) {
        self.set_status(if online {
            ConnectivityStatus::online()
        } else {
            ConnectivityStatus::offline()
        });
    }

    /// Makes subsequent probes fail.
    pub fn set_probe_failure(&self, fail: bool) {
        self.fail_probe.store(fail, Ordering::SeqCst);
    }

    /// Number of probes performed so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for ManualConnectivity {
    async fn probe(&self) -> Result<ConnectivityStatus, NetworkError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(NetworkError::Unavailable);
        }
        Ok(*self.status.borrow())
    }

    fn subscribe(&self) -> Option<watch::Receiver<ConnectivityStatus>> {
        self.events.then(|| self.status.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_online() {
        assert!(ConnectivityStatus::online().is_online());
        assert!(!ConnectivityStatus::offline().is_online());

        let undetermined = ConnectivityStatus {
            connected: true,
            reachable: None,
        };
        assert!(undetermined.is_online());

        let unreachable = ConnectivityStatus {
            connected: true,
            reachable: Some(false),
        };
        assert!(!unreachable.is_online());
    }

    #[tokio::test]
    async fn test_manual_probe() {
        let net = ManualConnectivity::new(true);
        assert!(net.probe().await.unwrap().is_online());

        net.set_online(false);
        assert!(!net.probe().await.unwrap().is_online());

        net.set_probe_failure(true);
        assert!(net.probe().await.is_err());
        assert_eq!(net.probe_count(), 3);
    }

    #[tokio::test]
    async fn test_manual_subscription() {
        let net = ManualConnectivity::new(true);
        let mut rx = net.subscribe().unwrap();
        net.set_online(false);
        rx.changed().await.unwrap();
        assert!(!rx.borrow().is_online());

        assert!(ManualConnectivity::without_events(true).subscribe().is_none());
    }

    #[tokio::test]
    async fn test_tcp_probe_unreachable_is_offline() {
        // Bind then drop a listener so the port is closed
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = TcpProbe::new(addr.to_string(), Duration::from_millis(500));
        assert!(!probe.probe().await.unwrap().is_online());
    }

    #[tokio::test]
    async fn test_tcp_probe_reachable_is_online() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new(addr.to_string(), Duration::from_millis(500));
        assert!(probe.probe().await.unwrap().is_online());
    }
}
