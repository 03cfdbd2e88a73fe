//! Node configuration.
//!
//! Provides [`NodeConfig`] with defaults for the engine mode, local mining and
//! the JSON-RPC binding.

use hmhash_consensus::{Config, Mode};

/// Default JSON-RPC port.
pub const DEFAULT_RPC_PORT: u16 = 8545;

/// Configuration for a node instance.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Engine verification mode.
    pub mode: Mode,
    /// URLs notified of new work packages.
    pub notify: Vec<String>,
    /// Send full header objects in notifications.
    pub notify_full: bool,
    /// Accept remote solutions without verification.
    pub noverify: bool,
    /// Local mining threads (0 = one per CPU, negative = disabled).
    pub threads: i32,
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    /// Port for the JSON-RPC server.
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "debug", "hmhash_consensus=trace").
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            notify: Vec::new(),
            notify_full: false,
            noverify: false,
            threads: -1,
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }

    /// Engine configuration derived from these settings.
    pub fn engine_config(&self) -> Config {
        Config {
            mode: self.mode,
            notify_full: self.notify_full,
            log: None,
        }
    }
}
