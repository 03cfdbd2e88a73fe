//! Shared test helpers for integration tests.

use std::io;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use hmhash_core::algorithm::hashimoto_full;
use hmhash_core::types::{BlockNonce, Hash256, SealHeader};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// An unsealed header at `number` with the given difficulty.
pub fn header(number: u64, difficulty: u64) -> SealHeader {
    SealHeader {
        parent_hash: Hash256([0x5e; 32]),
        number,
        difficulty,
        timestamp: 1_700_000_000 + number,
        ..SealHeader::default()
    }
}

/// Parse a 0x-prefixed 32-byte hex string from a work package.
pub fn work_hash(s: &str) -> Hash256 {
    let bytes = hex::decode(s.trim_start_matches("0x")).unwrap();
    Hash256(bytes.try_into().unwrap())
}

/// Solve a work package the way an external miner would: only the seal hash
/// and the boundary are used. Returns the nonce and the mix digest.
pub fn solve_work(work: &[String; 4]) -> (BlockNonce, Hash256) {
    let seal_hash = work_hash(&work[0]);
    let target = work_hash(&work[2]);
    (0u64..)
        .map(BlockNonce::new)
        .map(|nonce| (nonce, hashimoto_full(&seal_hash, &nonce.hash())))
        .find(|(_, result)| *result <= target)
        .unwrap()
}

/// HTTP endpoint collecting the JSON bodies POSTed to it.
pub struct NotifyCollector {
    pub url: String,
    bodies: mpsc::UnboundedReceiver<Value>,
}

impl NotifyCollector {
    pub async fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}", listener.local_addr()?);
        let (tx, bodies) = mpsc::unbounded_channel();
        let app = Router::new().route("/", post(collect)).with_state(tx);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { url, bodies })
    }

    /// Next received body, or `None` after five seconds of silence.
    pub async fn next_json(&mut self) -> Option<Value> {
        tokio::time::timeout(Duration::from_secs(5), self.bodies.recv())
            .await
            .ok()?
    }
}

async fn collect(State(tx): State<mpsc::UnboundedSender<Value>>, Json(body): Json<Value>) -> StatusCode {
    let _ = tx.send(body);
    StatusCode::OK
}
