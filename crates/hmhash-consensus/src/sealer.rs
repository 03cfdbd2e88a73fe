//! Remote sealer: hands out work to external miners and collects solutions.
//!
//! The sealer loop runs on its own thread with a single-threaded tokio
//! runtime. All of its state is owned by that loop; [`RemoteSealer`] talks to
//! it through bounded channels with oneshot replies. Once the loop has exited,
//! every handle method returns promptly with a stopped result instead of
//! blocking.
//!
//! Work packages are four 0x-prefixed hex strings:
//!
//! 1. seal hash of the header,
//! 2. seed hash for the header's epoch,
//! 3. boundary condition (`2^256 / difficulty`),
//! 4. block number.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use hmhash_core::algorithm::{difficulty_to_target, seed_hash_with, Hasher};
use hmhash_core::constants::STALE_THRESHOLD;
use hmhash_core::error::AlgorithmError;
use hmhash_core::types::{BlockNonce, Hash256, SealHeader};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn, Dispatch};

use crate::engine::verify_pow;
use crate::error::HmhashError;

/// Four-string work package handed to remote miners.
pub type WorkPackage = [String; 4];

/// Name of the thread that drives the sealer runtime.
pub const SEALER_THREAD: &str = "hmhash-sealer";

/// Timeout for each work notification POST.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(1);

/// How often stale works and hash rates are pruned.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(5);

/// Hash rate reports older than this are dropped.
pub const RATE_TTL: Duration = Duration::from_secs(10);

const CHANNEL_CAPACITY: usize = 16;

/// Grace period for in-flight tasks when the sealer runtime shuts down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Startup options for a [`RemoteSealer`].
#[derive(Debug, Clone)]
pub struct SealerSettings {
    /// URLs notified with every new work package.
    pub notify: Vec<String>,
    /// Notify with the header JSON object instead of the work package.
    pub notify_full: bool,
    /// Accept submitted solutions without verifying them.
    pub noverify: bool,
    /// Log sink for the sealer thread.
    pub log: Dispatch,
}

/// A header to seal and the channel its solution goes to.
#[derive(Debug)]
pub(crate) struct SealTask {
    pub header: SealHeader,
    pub results: mpsc::Sender<SealHeader>,
}

#[derive(Debug)]
struct SubmitWork {
    nonce: BlockNonce,
    mix_digest: Hash256,
    seal_hash: Hash256,
    reply: oneshot::Sender<bool>,
}

#[derive(Debug)]
struct SubmitRate {
    id: Hash256,
    rate: u64,
    done: oneshot::Sender<()>,
}

/// Receiving ends of the sealer channels.
struct Inbox {
    work: mpsc::Receiver<SealTask>,
    fetch_work: mpsc::Receiver<oneshot::Sender<Result<WorkPackage, HmhashError>>>,
    submit_work: mpsc::Receiver<SubmitWork>,
    submit_rate: mpsc::Receiver<SubmitRate>,
    fetch_rate: mpsc::Receiver<oneshot::Sender<u64>>,
    exit_requested: watch::Receiver<bool>,
}

/// Handle to a running sealer loop.
pub struct RemoteSealer {
    work_tx: mpsc::Sender<SealTask>,
    fetch_work_tx: mpsc::Sender<oneshot::Sender<Result<WorkPackage, HmhashError>>>,
    submit_work_tx: mpsc::Sender<SubmitWork>,
    submit_rate_tx: mpsc::Sender<SubmitRate>,
    fetch_rate_tx: mpsc::Sender<oneshot::Sender<u64>>,
    request_exit: watch::Sender<bool>,
    exited: watch::Receiver<bool>,
    runtime: Handle,
}

impl std::fmt::Debug for RemoteSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSealer")
            .field("exited", &self.has_exited())
            .finish_non_exhaustive()
    }
}

impl RemoteSealer {
    /// Spawn the sealer thread and its loop.
    ///
    /// # Errors
    ///
    /// Fails if the runtime, the notification client or the thread cannot be
    /// created.
    pub fn start(settings: SealerSettings, hasher: Hasher) -> Result<Self, HmhashError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;

        let (work_tx, work) = mpsc::channel(CHANNEL_CAPACITY);
        let (fetch_work_tx, fetch_work) = mpsc::channel(CHANNEL_CAPACITY);
        let (submit_work_tx, submit_work) = mpsc::channel(CHANNEL_CAPACITY);
        let (submit_rate_tx, submit_rate) = mpsc::channel(CHANNEL_CAPACITY);
        let (fetch_rate_tx, fetch_rate) = mpsc::channel(CHANNEL_CAPACITY);
        let (request_exit, exit_requested) = watch::channel(false);
        let (exit_tx, exited) = watch::channel(false);

        let inbox = Inbox {
            work,
            fetch_work,
            submit_work,
            submit_rate,
            fetch_rate,
            exit_requested,
        };
        let sealer = SealerLoop::new(hasher, client, &settings);
        let handle = runtime.handle().clone();
        let log = settings.log;

        std::thread::Builder::new()
            .name(SEALER_THREAD.into())
            .spawn(move || {
                tracing::dispatcher::with_default(&log, || {
                    runtime.block_on(sealer.run(inbox, exit_tx));
                    runtime.shutdown_timeout(SHUTDOWN_GRACE);
                })
            })?;

        Ok(Self {
            work_tx,
            fetch_work_tx,
            submit_work_tx,
            submit_rate_tx,
            fetch_rate_tx,
            request_exit,
            exited,
            runtime: handle,
        })
    }

    /// Whether the sealer loop has finished.
    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Run a task on the sealer runtime. It is cancelled when the sealer stops.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(task)
    }

    /// Send `msg`, giving up as soon as the loop has exited.
    async fn send<T>(&self, tx: &mpsc::Sender<T>, msg: T) -> Result<(), HmhashError> {
        let mut exited = self.exited.clone();
        tokio::select! {
            biased;
            _ = exited.wait_for(|done| *done) => Err(HmhashError::Stopped),
            sent = tx.send(msg) => sent.map_err(|_| HmhashError::Stopped),
        }
    }

    /// Make `header` the current work. Solutions are delivered to `results`.
    pub(crate) async fn push_work(
        &self,
        header: SealHeader,
        results: mpsc::Sender<SealHeader>,
    ) -> Result<(), HmhashError> {
        self.send(&self.work_tx, SealTask { header, results }).await
    }

    /// The current work package.
    ///
    /// # Errors
    ///
    /// [`HmhashError::NoMiningWork`] before any work was pushed, and
    /// [`HmhashError::Stopped`] once the sealer has exited.
    pub async fn fetch_work(&self) -> Result<WorkPackage, HmhashError> {
        let (reply, rx) = oneshot::channel();
        self.send(&self.fetch_work_tx, reply).await?;
        rx.await.map_err(|_| HmhashError::Stopped)?
    }

    /// Offer a solution for the work identified by `seal_hash`.
    pub async fn submit_work(&self, nonce: BlockNonce, mix_digest: Hash256, seal_hash: Hash256) -> bool {
        let (reply, rx) = oneshot::channel();
        let req = SubmitWork {
            nonce,
            mix_digest,
            seal_hash,
            reply,
        };
        if self.send(&self.submit_work_tx, req).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Record the hash rate of the remote miner `id`.
    pub async fn submit_hashrate(&self, rate: u64, id: Hash256) -> bool {
        let (done, rx) = oneshot::channel();
        if self.send(&self.submit_rate_tx, SubmitRate { id, rate, done }).await.is_err() {
            return false;
        }
        rx.await.is_ok()
    }

    /// Sum of live remote hash rates, or `None` once the sealer has exited.
    pub async fn fetch_hashrate(&self) -> Option<u64> {
        let (reply, rx) = oneshot::channel();
        self.send(&self.fetch_rate_tx, reply).await.ok()?;
        rx.await.ok()
    }

    /// Request exit and wait until the loop has finished.
    pub async fn stop(&self) {
        self.request_exit.send_replace(true);
        let mut exited = self.exited.clone();
        let _ = exited.wait_for(|done| *done).await;
    }
}

impl Drop for RemoteSealer {
    fn drop(&mut self) {
        self.request_exit.send_replace(true);
    }
}

#[derive(Debug, Clone, Copy)]
struct RemoteRate {
    rate: u64,
    ping: Instant,
}

/// Header serialization used for full notifications.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HeaderJson {
    parent_hash: String,
    number: String,
    difficulty: String,
    timestamp: String,
    nonce: String,
    mix_hash: String,
    seal_hash: String,
}

impl From<&SealHeader> for HeaderJson {
    fn from(header: &SealHeader) -> Self {
        Self {
            parent_hash: header.parent_hash.to_prefixed_hex(),
            number: format!("{:#x}", header.number),
            difficulty: format!("{:#x}", header.difficulty),
            timestamp: format!("{:#x}", header.timestamp),
            nonce: header.nonce.to_string(),
            mix_hash: header.mix_digest.to_prefixed_hex(),
            seal_hash: header.seal_hash().to_prefixed_hex(),
        }
    }
}

/// State owned by the sealer loop.
struct SealerLoop {
    hasher: Hasher,
    client: reqwest::Client,
    notify_urls: Vec<String>,
    notify_full: bool,
    noverify: bool,

    /// Pending works keyed by seal hash.
    works: HashMap<Hash256, SealHeader>,
    /// Remote hash rates keyed by miner id.
    rates: HashMap<Hash256, RemoteRate>,
    current_block: Option<SealHeader>,
    current_work: WorkPackage,
    results: Option<mpsc::Sender<SealHeader>>,
    notifications: JoinSet<()>,
}

impl SealerLoop {
    fn new(hasher: Hasher, client: reqwest::Client, settings: &SealerSettings) -> Self {
        Self {
            hasher,
            client,
            notify_urls: settings.notify.clone(),
            notify_full: settings.notify_full,
            noverify: settings.noverify,
            works: HashMap::new(),
            rates: HashMap::new(),
            current_block: None,
            current_work: WorkPackage::default(),
            results: None,
            notifications: JoinSet::new(),
        }
    }

    async fn run(mut self, mut inbox: Inbox, exit: watch::Sender<bool>) {
        let start = tokio::time::Instant::now() + PRUNE_INTERVAL;
        let mut ticker = tokio::time::interval_at(start, PRUNE_INTERVAL);
        info!(notify = self.notify_urls.len(), noverify = self.noverify, "remote sealer started");

        loop {
            // new work is taken before queued requests that may refer to it
            tokio::select! {
                biased;
                Some(task) = inbox.work.recv() => self.on_work(task),
                Some(reply) = inbox.fetch_work.recv() => {
                    let _ = reply.send(self.fetch_work());
                }
                Some(req) = inbox.submit_work.recv() => {
                    let accepted = self.submit_work(req.nonce, req.mix_digest, req.seal_hash);
                    let _ = req.reply.send(accepted);
                }
                Some(req) = inbox.submit_rate.recv() => {
                    self.rates.insert(req.id, RemoteRate { rate: req.rate, ping: Instant::now() });
                    let _ = req.done.send(());
                }
                Some(reply) = inbox.fetch_rate.recv() => {
                    let _ = reply.send(self.total_rate());
                }
                _ = ticker.tick() => self.prune(Instant::now()),
                Some(_) = self.notifications.join_next(), if !self.notifications.is_empty() => {}
                _ = inbox.exit_requested.wait_for(|requested| *requested) => break,
            }
        }

        self.notifications.shutdown().await;
        info!("remote sealer stopped");
        exit.send_replace(true);
    }

    fn on_work(&mut self, task: SealTask) {
        self.results = Some(task.results);
        match self.make_work(task.header) {
            Ok(()) => self.notify_work(),
            Err(err) => error!(%err, "failed to build work package"),
        }
    }

    /// Build the work package for `header` and make it current.
    fn make_work(&mut self, header: SealHeader) -> Result<(), AlgorithmError> {
        let hash = header.seal_hash();
        let seed = seed_hash_with(&mut self.hasher, header.number)?;
        self.current_work = [
            hash.to_prefixed_hex(),
            seed.to_prefixed_hex(),
            difficulty_to_target(header.difficulty).to_prefixed_hex(),
            format!("{:#x}", header.number),
        ];
        debug!(number = header.number, sealhash = %hash, "new work package");
        self.works.insert(hash, header.clone());
        self.current_block = Some(header);
        Ok(())
    }

    fn fetch_work(&self) -> Result<WorkPackage, HmhashError> {
        match self.current_block {
            Some(_) => Ok(self.current_work.clone()),
            None => Err(HmhashError::NoMiningWork),
        }
    }

    /// POST the current work to every notify URL without waiting for replies.
    fn notify_work(&mut self) {
        if self.notify_urls.is_empty() {
            return;
        }
        let Some(block) = &self.current_block else {
            return;
        };
        let body = if self.notify_full {
            serde_json::to_vec(&HeaderJson::from(block))
        } else {
            serde_json::to_vec(&self.current_work)
        };
        let body = match body {
            Ok(body) => body,
            Err(err) => {
                error!(%err, "failed to encode work notification");
                return;
            }
        };
        for url in &self.notify_urls {
            self.notifications.spawn(send_notification(
                self.client.clone(),
                url.clone(),
                body.clone(),
                self.current_work[0].clone(),
            ));
        }
    }

    /// Verify a solution and forward the sealed header. Returns whether it
    /// was accepted.
    fn submit_work(&mut self, nonce: BlockNonce, mix_digest: Hash256, seal_hash: Hash256) -> bool {
        let Some(current) = self.current_block.as_ref().map(|block| block.number) else {
            error!(sealhash = %seal_hash, "pending work without block");
            return false;
        };
        let Some(block) = self.works.get(&seal_hash) else {
            warn!(sealhash = %seal_hash, curnumber = current, "work submitted but none pending");
            return false;
        };
        let solution = block.with_seal(nonce, mix_digest);

        let start = Instant::now();
        if !self.noverify {
            if let Err(err) = verify_pow(&solution) {
                warn!(sealhash = %seal_hash, elapsed = ?start.elapsed(), %err, "invalid proof-of-work submitted");
                return false;
            }
        }
        let Some(results) = &self.results else {
            warn!("result channel is empty, submitted mining result is rejected");
            return false;
        };
        trace!(sealhash = %seal_hash, elapsed = ?start.elapsed(), "verified correct proof-of-work");

        if solution.number.saturating_add(STALE_THRESHOLD) <= current {
            warn!(number = solution.number, sealhash = %seal_hash, "work submitted is too old");
            return false;
        }
        match results.try_send(solution) {
            Ok(()) => {
                debug!(number = block.number, sealhash = %seal_hash, "work submitted is acceptable");
                true
            }
            Err(_) => {
                warn!(mode = "remote", sealhash = %seal_hash, "sealing result is not read by miner");
                false
            }
        }
    }

    fn total_rate(&self) -> u64 {
        self.rates.values().fold(0u64, |sum, r| sum.saturating_add(r.rate))
    }

    /// Drop expired hash rates and works too old to be submitted.
    fn prune(&mut self, now: Instant) {
        self.rates
            .retain(|_, r| now.saturating_duration_since(r.ping) <= RATE_TTL);
        if let Some(current) = self.current_block.as_ref().map(|block| block.number) {
            self.works
                .retain(|_, header| header.number.saturating_add(STALE_THRESHOLD) > current);
        }
    }
}

async fn send_notification(client: reqwest::Client, url: String, body: Vec<u8>, sealhash: String) {
    let sent = client
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;
    match sent {
        Ok(resp) => trace!(miner = %url, %sealhash, status = %resp.status(), "notified remote miner"),
        Err(err) => warn!(miner = %url, %err, "failed to notify remote miner"),
    }
}
