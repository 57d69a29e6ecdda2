//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries held by the memory tier
    pub max_memory_entries: usize,
    /// TTL in milliseconds for keys that map to no registered category
    pub default_ttl_ms: u64,
    /// Connectivity poll interval in seconds, 0 disables polling
    pub network_poll_interval: u64,
    /// Address the TCP connectivity probe connects to
    pub probe_addr: String,
    /// Connectivity probe timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Directory holding the persistent tier
    pub cache_dir: PathBuf,
    /// HTTP diagnostics server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_MEMORY_ENTRIES` - Memory tier capacity (default: 100)
    /// - `DEFAULT_TTL_MS` - Fallback TTL in milliseconds (default: 300000)
    /// - `NETWORK_POLL_INTERVAL_SECS` - Connectivity poll interval (default: 30)
    /// - `PROBE_ADDR` - Connectivity probe target (default: 1.1.1.1:443)
    /// - `PROBE_TIMEOUT_MS` - Connectivity probe timeout (default: 3000)
    /// - `CACHE_DIR` - Persistent tier directory (default: ./cache-data)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_memory_entries: parse_var("MAX_MEMORY_ENTRIES")
                .unwrap_or(defaults.max_memory_entries),
            default_ttl_ms: parse_var("DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            network_poll_interval: parse_var("NETWORK_POLL_INTERVAL_SECS")
                .unwrap_or(defaults.network_poll_interval),
            probe_addr: env::var("PROBE_ADDR").unwrap_or(defaults.probe_addr),
            probe_timeout_ms: parse_var("PROBE_TIMEOUT_MS").unwrap_or(defaults.probe_timeout_ms),
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// Poll interval as a Duration, or None when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.network_poll_interval > 0).then(|| Duration::from_secs(self.network_poll_interval))
    }

    /// Probe timeout as a Duration.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_memory_entries: 100,
            default_ttl_ms: 300_000,
            network_poll_interval: 30,
            probe_addr: "1.1.1.1:443".to_string(),
            probe_timeout_ms: 3_000,
            cache_dir: PathBuf::from("./cache-data"),
            server_port: 3000,
        }
    }
}
