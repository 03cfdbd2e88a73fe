//! Remote mining over JSON-RPC.
//!
//! Each test starts a test-mode engine with local mining disabled, serves its
//! miner API on an ephemeral port and plays the part of an external miner.

use std::sync::Arc;
use std::time::Duration;

use hmhash_consensus::Hmhash;
use hmhash_core::algorithm::{difficulty_to_target, seed_hash};
use hmhash_core::types::{Hash256, SealHeader};
use hmhash_node_lib::start_rpc_server;
use hmhash_tests::helpers::*;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::server::ServerHandle;
use tokio::sync::{mpsc, watch};

struct Harness {
    engine: Arc<Hmhash>,
    client: HttpClient,
    _server: ServerHandle,
}

async fn harness() -> Harness {
    let engine = Arc::new(Hmhash::new_tester(Vec::new(), false).unwrap());
    engine.set_threads(-1);
    let (server, addr) = start_rpc_server("127.0.0.1:0", &engine.apis()).await.unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .unwrap();
    Harness {
        engine,
        client,
        _server: server,
    }
}

async fn recv_sealed(rx: &mut mpsc::Receiver<SealHeader>) -> SealHeader {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("sealed header in time")
        .expect("results channel open")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_miner_seals_block() {
    let h = harness().await;
    let (results, mut rx) = mpsc::channel(1);
    let (_stop_tx, stop) = watch::channel(false);
    let work_header = header(30_005, 1_000);
    h.engine.seal(work_header.clone(), results, stop).await.unwrap();

    let work: [String; 4] = h.client.request("eth_getWork", rpc_params![]).await.unwrap();
    assert_eq!(work[0], work_header.seal_hash().to_prefixed_hex());
    assert_eq!(work[1], seed_hash(30_005).to_prefixed_hex());
    assert_eq!(work[2], difficulty_to_target(1_000).to_prefixed_hex());
    assert_eq!(work[3], "0x7535");

    let (nonce, mix) = solve_work(&work);
    let accepted: bool = h
        .client
        .request(
            "eth_submitWork",
            rpc_params![nonce.to_string(), work[0].clone(), mix.to_prefixed_hex()],
        )
        .await
        .unwrap();
    assert!(accepted);

    let sealed = recv_sealed(&mut rx).await;
    assert_eq!(sealed.nonce, nonce);
    assert_eq!(sealed.mix_digest, mix);
    assert_eq!(sealed.seal_hash(), work_header.seal_hash());
    h.engine.verify_seal(&sealed).unwrap();

    h.engine.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn both_namespaces_serve_the_same_sealer() {
    let h = harness().await;
    let (results, _rx) = mpsc::channel(1);
    let (_stop_tx, stop) = watch::channel(false);
    h.engine.seal(header(1, 10), results, stop).await.unwrap();

    let eth: [String; 4] = h.client.request("eth_getWork", rpc_params![]).await.unwrap();
    let own: [String; 4] = h.client.request("hmhash_getWork", rpc_params![]).await.unwrap();
    assert_eq!(eth, own);

    let id = "ab".repeat(32);
    let ok: bool = h
        .client
        .request("hmhash_submitHashrate", rpc_params!["0x1f4", id.clone()])
        .await
        .unwrap();
    assert!(ok);
    let rate: u64 = h.client.request("eth_getHashrate", rpc_params![]).await.unwrap();
    assert_eq!(rate, 500);

    h.engine.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bad_submissions_are_rejected() {
    let h = harness().await;

    // nothing to solve yet
    let err = h
        .client
        .request::<[String; 4], _>("eth_getWork", rpc_params![])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no mining work"));

    let (results, mut rx) = mpsc::channel(1);
    let (_stop_tx, stop) = watch::channel(false);
    h.engine.seal(header(2, 1_000), results, stop).await.unwrap();
    let work: [String; 4] = h.client.request("eth_getWork", rpc_params![]).await.unwrap();
    let (nonce, mix) = solve_work(&work);

    // unknown seal hash
    let unknown = Hash256([0x99; 32]).to_prefixed_hex();
    let ok: bool = h
        .client
        .request("eth_submitWork", rpc_params![nonce.to_string(), unknown, mix.to_prefixed_hex()])
        .await
        .unwrap();
    assert!(!ok);

    // wrong mix digest
    let mut bad = mix;
    bad.0[0] ^= 0xff;
    let ok: bool = h
        .client
        .request("eth_submitWork", rpc_params![nonce.to_string(), work[0].clone(), bad.to_prefixed_hex()])
        .await
        .unwrap();
    assert!(!ok);
    assert!(rx.try_recv().is_err());

    h.engine.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_work_is_refused() {
    let h = harness().await;
    let (_stop_tx, stop) = watch::channel(false);

    let (old_results, _old_rx) = mpsc::channel(1);
    h.engine.seal(header(10, 100), old_results, stop.clone()).await.unwrap();
    let old_work: [String; 4] = h.client.request("eth_getWork", rpc_params![]).await.unwrap();

    let (results, mut rx) = mpsc::channel(1);
    h.engine.seal(header(17, 100), results, stop).await.unwrap();
    let current: [String; 4] = h.client.request("eth_getWork", rpc_params![]).await.unwrap();
    assert_eq!(current[3], "0x11");

    let (nonce, mix) = solve_work(&old_work);
    let ok: bool = h
        .client
        .request("eth_submitWork", rpc_params![nonce.to_string(), old_work[0].clone(), mix.to_prefixed_hex()])
        .await
        .unwrap();
    assert!(!ok);
    assert!(rx.try_recv().is_err());

    h.engine.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_engine_answers_promptly() {
    let h = harness().await;
    let ok: bool = h
        .client
        .request("eth_submitHashrate", rpc_params!["0x10", "cd".repeat(32)])
        .await
        .unwrap();
    assert!(ok);
    h.engine.close().await.unwrap();

    let err = h
        .client
        .request::<[String; 4], _>("eth_getWork", rpc_params![])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("hmhash stopped"));

    let ok: bool = h
        .client
        .request("eth_submitHashrate", rpc_params!["0x10", "cd".repeat(32)])
        .await
        .unwrap();
    assert!(!ok);

    let rate: u64 = h.client.request("eth_getHashrate", rpc_params![]).await.unwrap();
    assert_eq!(rate, 0);
}
