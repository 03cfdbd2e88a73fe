//! Local mining: thread count control and the per-seal coordinator.
//!
//! Each seal request gets a coordinator task on the sealer runtime. It starts
//! one OS thread per configured miner, each searching nonces upward from a
//! random start, and waits for the first of: a found solution, a stop signal,
//! or a thread count change. A change restarts the round with the new count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use hmhash_core::algorithm::{difficulty_to_target, hashimoto_full};
use hmhash_core::types::{BlockNonce, SealHeader};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, trace, warn};

use crate::meter::Meter;

/// Attempts between hash rate meter updates.
const METER_BATCH: u64 = 1 << 15;

#[derive(Debug)]
struct MiningState {
    threads: i32,
    /// Seeded on first use.
    rand: Option<StdRng>,
}

/// Local mining settings shared by the engine and its coordinators.
#[derive(Debug)]
pub(crate) struct Mining {
    state: Mutex<MiningState>,
    update: Notify,
    pub(crate) hashrate: Arc<Meter>,
}

impl Mining {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MiningState {
                threads: 0,
                rand: None,
            }),
            update: Notify::new(),
            hashrate: Arc::new(Meter::new()),
        }
    }

    pub(crate) fn threads(&self) -> i32 {
        self.state.lock().threads
    }

    /// Store the new count and wake running coordinators. A wake-up that no
    /// coordinator is waiting for is dropped; the next round reads the count.
    pub(crate) fn set_threads(&self, threads: i32) {
        self.state.lock().threads = threads;
        self.update.notify_waiters();
    }

    /// Start nonces for a new round, one per miner thread. Zero threads means
    /// one per available CPU, negative means none.
    fn round(&self) -> Vec<u64> {
        let mut state = self.state.lock();
        let threads = match state.threads {
            0 => thread::available_parallelism().map_or(1, usize::from),
            n if n < 0 => return Vec::new(),
            n => n.unsigned_abs() as usize,
        };
        let rng = state.rand.get_or_insert_with(StdRng::from_entropy);
        (0..threads).map(|_| rng.r#gen()).collect()
    }
}

/// Raises the abort flag when the round ends, including when the coordinator
/// task itself is dropped.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Drive local mining for `header` until a solution is found or `stop` fires.
///
/// `stop` fires when it holds `true` or its sender is dropped.
pub(crate) async fn coordinate(
    mining: Arc<Mining>,
    header: SealHeader,
    results: mpsc::Sender<SealHeader>,
    mut stop: watch::Receiver<bool>,
) {
    let sealhash = header.seal_hash();
    loop {
        let updated = mining.update.notified();
        tokio::pin!(updated);
        updated.as_mut().enable();

        let seeds = mining.round();
        debug!(%sealhash, miners = seeds.len(), "starting local mining round");

        let abort = AbortOnDrop(Arc::new(AtomicBool::new(false)));
        let (found_tx, mut found) = mpsc::channel(1);
        let log = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
        let mut miners: Vec<JoinHandle<()>> = Vec::with_capacity(seeds.len());
        for (id, seed) in seeds.into_iter().enumerate() {
            let job = MinerJob {
                id,
                header: header.clone(),
                seed,
                abort: abort.0.clone(),
                found: found_tx.clone(),
                hashrate: mining.hashrate.clone(),
            };
            let log = log.clone();
            let spawned = thread::Builder::new()
                .name(format!("hmhash-miner-{id}"))
                .spawn(move || tracing::dispatcher::with_default(&log, || job.run()));
            match spawned {
                Ok(handle) => miners.push(handle),
                Err(err) => warn!(miner = id, %err, "failed to start miner thread"),
            }
        }

        let restart = tokio::select! {
            _ = stop.wait_for(|stopped| *stopped) => false,
            Some(sealed) = found.recv() => {
                if results.try_send(sealed).is_err() {
                    warn!(mode = "local", %sealhash, "sealing result is not read by miner");
                }
                false
            }
            _ = &mut updated => true,
        };

        drop(abort);
        drop(found_tx);
        let joined = tokio::task::spawn_blocking(move || {
            for miner in miners {
                let _ = miner.join();
            }
        })
        .await;
        if let Err(err) = joined {
            warn!(%err, "failed to join miner threads");
        }

        if !restart {
            break;
        }
        debug!(%sealhash, "thread count changed, restarting mining");
    }
}

/// Nonce search on one thread.
struct MinerJob {
    id: usize,
    header: SealHeader,
    seed: u64,
    abort: Arc<AtomicBool>,
    found: mpsc::Sender<SealHeader>,
    hashrate: Arc<Meter>,
}

impl MinerJob {
    fn run(self) {
        let hash = self.header.seal_hash();
        let target = difficulty_to_target(self.header.difficulty);
        let mut nonce = self.seed;
        let mut attempts = 0u64;
        trace!(miner = self.id, seed = self.seed, "started search for new nonces");

        loop {
            if self.abort.load(Ordering::Acquire) {
                trace!(miner = self.id, attempts = nonce.wrapping_sub(self.seed), "nonce search aborted");
                break;
            }
            attempts += 1;
            if attempts % METER_BATCH == 0 {
                self.hashrate.mark(attempts);
                attempts = 0;
            }

            let candidate = BlockNonce::new(nonce);
            let result = hashimoto_full(&hash, &candidate.hash());
            if result <= target {
                let sealed = self.header.with_seal(candidate, result);
                match self.found.try_send(sealed) {
                    Ok(()) => trace!(miner = self.id, %candidate, "nonce found and reported"),
                    Err(_) => trace!(miner = self.id, %candidate, "nonce found but discarded"),
                }
                break;
            }
            nonce = nonce.wrapping_add(1);
        }
        self.hashrate.mark(attempts);
    }
}
