//! # hmhash-node — engine composition and miner RPC.
//!
//! - [`node::Node`] builds an engine from a [`NodeConfig`] and owns its
//!   lifetime
//! - [`rpc`] serves the engine's miner API over JSON-RPC under the `eth`
//!   and `hmhash` namespaces
//! - [`config::NodeConfig`] holds node settings

pub mod config;
pub mod error;
pub mod node;
pub mod rpc;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::Node;
pub use rpc::start_rpc_server;
