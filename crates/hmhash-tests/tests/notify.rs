//! Work notifications pushed to external miners.

use std::time::{Duration, Instant};

use hmhash_consensus::{Config, Hmhash, HmhashApi, Mode};
use hmhash_tests::helpers::*;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_work_is_posted_as_package() {
    let mut collector = NotifyCollector::start().await.unwrap();
    let engine = Arc::new(Hmhash::new_tester(vec![collector.url.clone()], false).unwrap());
    engine.set_threads(-1);

    let (results, _rx) = mpsc::channel(1);
    let (_stop_tx, stop) = watch::channel(false);
    engine.seal(header(5, 1_000), results, stop).await.unwrap();

    let body = collector.next_json().await.expect("notification");
    let work = HmhashApi::new(engine.clone()).get_work().await.unwrap();
    assert_eq!(body, serde_json::json!(work));

    engine.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_notifications_carry_the_header() {
    let mut collector = NotifyCollector::start().await.unwrap();
    let config = Config {
        notify_full: true,
        ..Config::with_mode(Mode::Test)
    };
    let engine = Hmhash::new(config, vec![collector.url.clone()], false).unwrap();
    engine.set_threads(-1);

    let work = header(16, 7);
    let (results, _rx) = mpsc::channel(1);
    let (_stop_tx, stop) = watch::channel(false);
    engine.seal(work.clone(), results, stop).await.unwrap();

    let body = collector.next_json().await.expect("notification");
    assert_eq!(body["number"], "0x10");
    assert_eq!(body["difficulty"], "0x7");
    assert_eq!(body["sealHash"], work.seal_hash().to_prefixed_hex());
    assert_eq!(body["parentHash"], work.parent_hash.to_prefixed_hex());

    engine.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_url_is_notified() {
    let mut first = NotifyCollector::start().await.unwrap();
    let mut second = NotifyCollector::start().await.unwrap();
    let engine = Hmhash::new_tester(vec![first.url.clone(), second.url.clone()], false).unwrap();
    engine.set_threads(-1);

    let (results, _rx) = mpsc::channel(1);
    let (_stop_tx, stop) = watch::channel(false);
    engine.seal(header(1, 2), results, stop).await.unwrap();

    assert!(first.next_json().await.is_some());
    assert!(second.next_json().await.is_some());
    engine.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_miner_does_not_block_sealing() {
    // nothing listens on the discard port
    let engine = Arc::new(Hmhash::new_tester(vec!["http://127.0.0.1:9".to_string()], false).unwrap());
    engine.set_threads(-1);

    let (results, _rx) = mpsc::channel(1);
    let (_stop_tx, stop) = watch::channel(false);
    let start = Instant::now();
    engine.seal(header(3, 2), results, stop).await.unwrap();
    HmhashApi::new(engine.clone()).get_work().await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    engine.close().await.unwrap();
}

#[tokio::test]
async fn collector_accepts_chunked_bodies() {
    let mut collector = NotifyCollector::start().await.unwrap();
    let addr = collector.url.trim_start_matches("http://").to_string();
    let mut stream = TcpStream::connect(&addr).await.unwrap();
    let request = format!(
        "POST / HTTP/1.1\r\nhost: {addr}\r\ncontent-type: application/json\r\n\
         transfer-encoding: chunked\r\nconnection: close\r\n\r\n\
         7\r\n[\"0x1\",\r\n6\r\n\"0x2\"]\r\n0\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let body = collector.next_json().await.expect("chunked body");
    assert_eq!(body, serde_json::json!(["0x1", "0x2"]));

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    assert!(response.starts_with(b"HTTP/1.1 200"));
}
