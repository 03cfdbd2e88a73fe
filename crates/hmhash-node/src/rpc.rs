//! JSON-RPC server for remote miners.
//!
//! Uses jsonrpsee 0.24. The same four calls are served under each namespace
//! the engine registers an API for, e.g. `eth_getWork` and `hmhash_getWork`.
//! Hashes, nonces and quantities travel as hex strings with an optional `0x`
//! prefix.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use tracing::{info, warn};

use hmhash_consensus::{HmhashApi, HmhashError, RpcApi};
use hmhash_core::types::{BlockNonce, Hash256};

use crate::error::NodeError;

/// Generic server-side error code.
const SERVER_ERROR: i32 = -32000;
/// Invalid method parameter(s).
const INVALID_PARAMS: i32 = -32602;

fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a 64-character hex string into a Hash256.
pub fn parse_hash(hex_str: &str) -> Result<Hash256, ErrorObjectOwned> {
    let digits = strip_prefix(hex_str);
    if digits.len() != 64 {
        return Err(rpc_error(INVALID_PARAMS, "hash must be 64 hex characters"));
    }
    let bytes = hex::decode(digits).map_err(|_| rpc_error(INVALID_PARAMS, "invalid hex in hash"))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| rpc_error(INVALID_PARAMS, "hash must be 32 bytes"))?;
    Ok(Hash256(arr))
}

/// Parse a 16-character hex string into a BlockNonce.
pub fn parse_nonce(hex_str: &str) -> Result<BlockNonce, ErrorObjectOwned> {
    let digits = strip_prefix(hex_str);
    if digits.len() != 16 {
        return Err(rpc_error(INVALID_PARAMS, "nonce must be 16 hex characters"));
    }
    let bytes = hex::decode(digits).map_err(|_| rpc_error(INVALID_PARAMS, "invalid hex in nonce"))?;
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| rpc_error(INVALID_PARAMS, "nonce must be 8 bytes"))?;
    Ok(BlockNonce(arr))
}

/// Parse a hex quantity such as `0x1f4`.
pub fn parse_quantity(hex_str: &str) -> Result<u64, ErrorObjectOwned> {
    let digits = strip_prefix(hex_str);
    if digits.is_empty() {
        return Err(rpc_error(INVALID_PARAMS, "empty hex quantity"));
    }
    u64::from_str_radix(digits, 16).map_err(|_| rpc_error(INVALID_PARAMS, "invalid hex quantity"))
}

/// Create a JSON-RPC error.
fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

fn engine_error(err: HmhashError) -> ErrorObjectOwned {
    rpc_error(SERVER_ERROR, &err.to_string())
}

/// Remote mining calls under the `hmhash` namespace.
#[rpc(server, namespace = "hmhash")]
pub trait HmhashRpc {
    /// Returns the current work package: seal hash, seed hash, boundary and
    /// block number.
    #[method(name = "getWork")]
    async fn get_work(&self) -> Result<[String; 4], ErrorObjectOwned>;

    /// Submits a solution; returns whether it was accepted.
    #[method(name = "submitWork")]
    async fn submit_work(&self, nonce: String, hash: String, digest: String) -> Result<bool, ErrorObjectOwned>;

    /// Reports a remote miner's hash rate.
    #[method(name = "submitHashrate")]
    async fn submit_hashrate(&self, rate: String, id: String) -> Result<bool, ErrorObjectOwned>;

    /// Returns the total hash rate in hashes per second.
    #[method(name = "getHashrate")]
    async fn get_hashrate(&self) -> Result<u64, ErrorObjectOwned>;
}

/// The same calls under the `eth` namespace, for stock mining software.
#[rpc(server, namespace = "eth")]
pub trait EthMiningRpc {
    #[method(name = "getWork")]
    async fn get_work(&self) -> Result<[String; 4], ErrorObjectOwned>;

    #[method(name = "submitWork")]
    async fn submit_work(&self, nonce: String, hash: String, digest: String) -> Result<bool, ErrorObjectOwned>;

    #[method(name = "submitHashrate")]
    async fn submit_hashrate(&self, rate: String, id: String) -> Result<bool, ErrorObjectOwned>;

    #[method(name = "getHashrate")]
    async fn get_hashrate(&self) -> Result<u64, ErrorObjectOwned>;
}

/// RPC adapter over one [`HmhashApi`] service.
#[derive(Clone)]
pub struct MinerRpcImpl {
    api: Arc<HmhashApi>,
}

impl MinerRpcImpl {
    pub fn new(api: Arc<HmhashApi>) -> Self {
        Self { api }
    }

    async fn get_work(&self) -> Result<[String; 4], ErrorObjectOwned> {
        self.api.get_work().await.map_err(engine_error)
    }

    async fn submit_work(&self, nonce: &str, hash: &str, digest: &str) -> Result<bool, ErrorObjectOwned> {
        let nonce = parse_nonce(nonce)?;
        let hash = parse_hash(hash)?;
        let digest = parse_hash(digest)?;
        Ok(self.api.submit_work(nonce, hash, digest).await)
    }

    async fn submit_hashrate(&self, rate: &str, id: &str) -> Result<bool, ErrorObjectOwned> {
        let rate = parse_quantity(rate)?;
        let id = parse_hash(id)?;
        Ok(self.api.submit_hashrate(rate, id).await)
    }
}

#[async_trait]
impl HmhashRpcServer for MinerRpcImpl {
    async fn get_work(&self) -> Result<[String; 4], ErrorObjectOwned> {
        MinerRpcImpl::get_work(self).await
    }

    async fn submit_work(&self, nonce: String, hash: String, digest: String) -> Result<bool, ErrorObjectOwned> {
        MinerRpcImpl::submit_work(self, &nonce, &hash, &digest).await
    }

    async fn submit_hashrate(&self, rate: String, id: String) -> Result<bool, ErrorObjectOwned> {
        MinerRpcImpl::submit_hashrate(self, &rate, &id).await
    }

    async fn get_hashrate(&self) -> Result<u64, ErrorObjectOwned> {
        Ok(self.api.get_hashrate().await)
    }
}

#[async_trait]
impl EthMiningRpcServer for MinerRpcImpl {
    async fn get_work(&self) -> Result<[String; 4], ErrorObjectOwned> {
        MinerRpcImpl::get_work(self).await
    }

    async fn submit_work(&self, nonce: String, hash: String, digest: String) -> Result<bool, ErrorObjectOwned> {
        MinerRpcImpl::submit_work(self, &nonce, &hash, &digest).await
    }

    async fn submit_hashrate(&self, rate: String, id: String) -> Result<bool, ErrorObjectOwned> {
        MinerRpcImpl::submit_hashrate(self, &rate, &id).await
    }

    async fn get_hashrate(&self) -> Result<u64, ErrorObjectOwned> {
        Ok(self.api.get_hashrate().await)
    }
}

/// Merge every known namespace in `apis` into one module. Unknown namespaces
/// are skipped.
pub fn build_rpc_module(apis: &[RpcApi]) -> Result<RpcModule<()>, NodeError> {
    let mut module = RpcModule::new(());
    for api in apis {
        let rpc_impl = MinerRpcImpl::new(api.service.clone());
        let merged = match api.namespace {
            "hmhash" => module.merge(HmhashRpcServer::into_rpc(rpc_impl)),
            "eth" => module.merge(EthMiningRpcServer::into_rpc(rpc_impl)),
            other => {
                warn!(namespace = other, "skipping unknown rpc namespace");
                continue;
            }
        };
        merged.map_err(|e| NodeError::Rpc(e.to_string()))?;
    }
    Ok(module)
}

/// Start the JSON-RPC server. Returns its handle and the bound address, which
/// differs from `addr` when binding port 0.
pub async fn start_rpc_server(addr: &str, apis: &[RpcApi]) -> Result<(ServerHandle, SocketAddr), NodeError> {
    let module = build_rpc_module(apis)?;
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| NodeError::Rpc(e.to_string()))?;
    let local = server.local_addr().map_err(|e| NodeError::Rpc(e.to_string()))?;

    let handle = server.start(module);
    info!(addr = %local, "rpc server listening");
    Ok((handle, local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmhash_consensus::Hmhash;

    #[test]
    fn parse_hash_valid() {
        let hex_str = "aa".repeat(32);
        assert_eq!(parse_hash(&hex_str).unwrap(), Hash256([0xAA; 32]));
        assert_eq!(parse_hash(&format!("0x{hex_str}")).unwrap(), Hash256([0xAA; 32]));
    }

    #[test]
    fn parse_hash_wrong_length() {
        let err = parse_hash("0xabcdef").unwrap_err();
        assert!(err.message().contains("64 hex characters"));
        assert_eq!(err.code(), INVALID_PARAMS);
    }

    #[test]
    fn parse_hash_invalid_hex() {
        let err = parse_hash(&"zz".repeat(32)).unwrap_err();
        assert!(err.message().contains("invalid hex"));
    }

    #[test]
    fn parse_nonce_big_endian() {
        let nonce = parse_nonce("0x0000000000000102").unwrap();
        assert_eq!(nonce.as_u64(), 0x0102);
        assert!(parse_nonce("0x0102").is_err());
    }

    #[test]
    fn parse_quantity_forms() {
        assert_eq!(parse_quantity("0x1f4").unwrap(), 500);
        assert_eq!(parse_quantity("ff").unwrap(), 255);
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xg").is_err());
    }

    #[test]
    fn module_registers_both_namespaces() {
        let engine = Arc::new(Hmhash::new_faker());
        let module = build_rpc_module(&engine.apis()).unwrap();
        let names: Vec<_> = module.method_names().collect();
        for name in [
            "eth_getWork",
            "eth_submitWork",
            "eth_submitHashrate",
            "eth_getHashrate",
            "hmhash_getWork",
            "hmhash_submitWork",
            "hmhash_submitHashrate",
            "hmhash_getHashrate",
        ] {
            assert!(names.contains(&name), "missing {name}");
        }
    }

    #[test]
    fn unknown_namespace_is_skipped() {
        let engine = Arc::new(Hmhash::new_faker());
        let mut apis = engine.apis();
        apis[0].namespace = "debug";
        let module = build_rpc_module(&apis).unwrap();
        assert!(module.method_names().all(|name| name.starts_with("hmhash_")));
    }

    #[tokio::test]
    async fn faker_rejects_get_work_over_rpc() {
        let engine = Arc::new(Hmhash::new_faker());
        let module = build_rpc_module(&engine.apis()).unwrap();

        let err = module
            .call::<_, [String; 4]>("eth_getWork", jsonrpsee::rpc_params![])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not supported"));

        let accepted: bool = module
            .call("hmhash_submitHashrate", jsonrpsee::rpc_params!["0x10", "11".repeat(32)])
            .await
            .unwrap();
        assert!(accepted);
    }

    #[tokio::test]
    async fn malformed_params_are_rejected() {
        let engine = Arc::new(Hmhash::new_faker());
        let module = build_rpc_module(&engine.apis()).unwrap();
        let err = module
            .call::<_, bool>("eth_submitWork", jsonrpsee::rpc_params!["0x01", "00".repeat(32), "00".repeat(32)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nonce"));
    }
}
