//! Node composition: builds the engine for the configured mode and owns it
//! until shutdown.

use std::sync::Arc;

use hmhash_consensus::{Hmhash, Mode, RpcApi};
use tracing::info;

use crate::config::NodeConfig;
use crate::error::NodeError;

/// A running engine and the settings it was built from.
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    engine: Arc<Hmhash>,
}

impl Node {
    /// Build the engine and apply the configured thread count.
    pub fn new(config: NodeConfig) -> Result<Arc<Self>, NodeError> {
        let engine = match config.mode {
            Mode::Fake | Mode::FakeFail | Mode::FakeDelay => Hmhash::new_faker(),
            Mode::FullFake => Hmhash::new_full_faker(),
            Mode::Test => Hmhash::new_tester(config.notify.clone(), config.noverify)?,
            Mode::Normal | Mode::Shared => {
                Hmhash::new(config.engine_config(), config.notify.clone(), config.noverify)?
            }
        };
        engine.set_threads(config.threads);
        info!(mode = %engine.mode(), threads = config.threads, "engine ready");

        Ok(Arc::new(Self {
            config,
            engine: Arc::new(engine),
        }))
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<Hmhash> {
        &self.engine
    }

    /// Miner API descriptors to serve over RPC.
    pub fn apis(&self) -> Vec<RpcApi> {
        self.engine.apis()
    }

    /// Close the engine, stopping its remote sealer.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        self.engine.close().await?;
        info!("engine closed");
        Ok(())
    }
}
