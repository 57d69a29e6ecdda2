//! Network Module
//!
//! Connectivity probing and the online/offline signal read by the cache.

mod monitor;
mod probe;

pub use monitor::NetworkMonitor;
pub use probe::{ConnectivityProbe, ConnectivityStatus, ManualConnectivity, TcpProbe};

pub(crate) use monitor::apply_probe_result;
