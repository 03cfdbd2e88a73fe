//! Miner-facing API over an engine's remote sealer.
//!
//! The same service is exposed under the `eth` and `hmhash` namespaces; the
//! transport that serves it lives with the node.

use std::sync::Arc;

use hmhash_core::types::{BlockNonce, Hash256};

use crate::engine::Hmhash;
use crate::error::HmhashError;
use crate::sealer::WorkPackage;

/// Remote mining calls backed by one engine.
#[derive(Debug, Clone)]
pub struct HmhashApi {
    engine: Arc<Hmhash>,
}

/// A service together with the namespace it is registered under.
#[derive(Debug, Clone)]
pub struct RpcApi {
    pub namespace: &'static str,
    pub service: Arc<HmhashApi>,
}

impl HmhashApi {
    pub fn new(engine: Arc<Hmhash>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<Hmhash> {
        &self.engine
    }

    /// Current work package: seal hash, seed hash, boundary and number.
    ///
    /// # Errors
    ///
    /// [`HmhashError::NotSupported`] when the engine has no remote sealer,
    /// [`HmhashError::NoMiningWork`] before any work exists and
    /// [`HmhashError::Stopped`] after close.
    pub async fn get_work(&self) -> Result<WorkPackage, HmhashError> {
        let remote = self.engine.remote().ok_or(HmhashError::NotSupported)?;
        remote.fetch_work().await
    }

    /// Submit a proof-of-work solution for the work identified by `hash`.
    /// Returns whether it was accepted.
    pub async fn submit_work(&self, nonce: BlockNonce, hash: Hash256, digest: Hash256) -> bool {
        match self.engine.remote() {
            Some(remote) => remote.submit_work(nonce, digest, hash).await,
            None => false,
        }
    }

    /// Report a remote miner's hash rate. Engines without a remote sealer
    /// accept and ignore reports.
    pub async fn submit_hashrate(&self, rate: u64, id: Hash256) -> bool {
        match self.engine.remote() {
            Some(remote) => remote.submit_hashrate(rate, id).await,
            None => true,
        }
    }

    /// Total hash rate, truncated to whole hashes per second.
    pub async fn get_hashrate(&self) -> u64 {
        self.engine.hashrate().await as u64
    }
}

impl Hmhash {
    /// Miner API descriptors for this engine, one per namespace, sharing a
    /// single service.
    pub fn apis(self: &Arc<Self>) -> Vec<RpcApi> {
        let service = Arc::new(HmhashApi::new(self.clone()));
        vec![
            RpcApi {
                namespace: "eth",
                service: service.clone(),
            },
            RpcApi {
                namespace: "hmhash",
                service,
            },
        ]
    }
}
