//! hmhash node binary.
//!
//! Builds a proof-of-work engine, serves its miner API over JSON-RPC and
//! closes the engine on Ctrl+C.

use anyhow::{Context, Result};
use clap::Parser;
use hmhash_consensus::Mode;
use hmhash_node_lib::config::DEFAULT_RPC_PORT;
use hmhash_node_lib::{start_rpc_server, Node, NodeConfig};
use tracing::{error, info};

/// hmhash proof-of-work node.
#[derive(Parser, Debug)]
#[command(name = "hmhash-node", version, about = "hmhash proof-of-work engine with a remote miner RPC")]
struct Args {
    /// Engine mode (normal, shared, test, fake, full-fake)
    #[arg(long, default_value = "normal")]
    mode: Mode,

    /// URLs to notify of new work packages (comma-separated)
    #[arg(long, value_delimiter = ',')]
    notify: Vec<String>,

    /// Send the full header object in work notifications
    #[arg(long)]
    notify_full: bool,

    /// Accept remote solutions without verifying them
    #[arg(long)]
    noverify: bool,

    /// Local mining threads (0 = one per CPU, negative = disabled)
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    threads: i32,

    /// RPC server bind address
    #[arg(long, default_value = "127.0.0.1")]
    rpc_bind: String,

    /// RPC server port
    #[arg(long, default_value_t = DEFAULT_RPC_PORT)]
    rpc_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Convert CLI args into a NodeConfig.
    fn into_config(self) -> (NodeConfig, String) {
        let config = NodeConfig {
            mode: self.mode,
            notify: self.notify,
            notify_full: self.notify_full,
            noverify: self.noverify,
            threads: self.threads,
            rpc_bind: self.rpc_bind,
            rpc_port: self.rpc_port,
            log_level: self.log_level,
        };
        (config, self.log_format)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, log_format) = Args::parse().into_config();
    init_logging(&config.log_level, &log_format);

    info!("hmhash node v{}", env!("CARGO_PKG_VERSION"));
    info!(mode = %config.mode, threads = config.threads, notify = ?config.notify, "configuration");

    let node = Node::new(config.clone()).context("failed to start engine")?;
    let (rpc_handle, addr) = start_rpc_server(&config.rpc_addr(), &node.apis())
        .await
        .context("failed to start RPC server")?;
    info!("RPC server listening on {addr} (Ctrl+C to stop)");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down..."),
        Err(e) => error!("failed to listen for Ctrl+C: {e}"),
    }

    rpc_handle.stop().ok();
    info!("RPC server stopped");
    node.shutdown().await.context("failed to close engine")?;
    info!("hmhash node shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_map_onto_config() {
        let args = Args::parse_from([
            "hmhash-node",
            "--mode",
            "test",
            "--notify",
            "http://a:1,http://b:2",
            "--threads",
            "-1",
            "--rpc-port",
            "0",
        ]);
        let (config, format) = args.into_config();
        assert_eq!(config.mode, Mode::Test);
        assert_eq!(config.notify, vec!["http://a:1", "http://b:2"]);
        assert_eq!(config.threads, -1);
        assert_eq!(config.rpc_port, 0);
        assert_eq!(format, "text");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Args::try_parse_from(["hmhash-node", "--mode", "fake-fail"]).is_err());
    }
}
