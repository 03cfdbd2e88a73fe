//! The hmhash consensus engine.
//!
//! An [`Hmhash`] is built once in one of several modes and is then immutable
//! apart from its local thread count. Normal and test engines verify seals
//! with the hash primitive, mine locally and run a remote sealer. The fake
//! modes skip proof-of-work checks and seal instantly. Shared engines forward
//! verification, sealing and thread control to the process-wide instance.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hmhash_core::algorithm::{difficulty_to_target, hashimoto_light, Hasher};
use hmhash_core::error::SealError;
use hmhash_core::types::{BlockNonce, Hash256, SealHeader};
use tokio::sync::{mpsc, watch, OnceCell};
use tracing::{info, warn};

use crate::config::{Config, Mode};
use crate::error::HmhashError;
use crate::miner::{self, Mining};
use crate::sealer::{RemoteSealer, SealerSettings};
use crate::shared::shared_engine;

/// Check a sealed header against its own difficulty with the light hash.
///
/// # Errors
///
/// - [`SealError::InvalidDifficulty`] for a zero difficulty.
/// - [`SealError::InvalidMixDigest`] if the mix digest does not match.
/// - [`SealError::InvalidPoW`] if the result is above the target.
pub fn verify_pow(header: &SealHeader) -> Result<(), SealError> {
    if header.difficulty == 0 {
        return Err(SealError::InvalidDifficulty);
    }
    let result = hashimoto_light(&header.seal_hash(), &header.nonce.hash());
    if result != header.mix_digest {
        return Err(SealError::InvalidMixDigest);
    }
    if result > difficulty_to_target(header.difficulty) {
        return Err(SealError::InvalidPoW);
    }
    Ok(())
}

/// Proof-of-work consensus engine.
pub struct Hmhash {
    config: Config,
    mining: Arc<Mining>,
    remote: Option<RemoteSealer>,
    shared: Option<Arc<Hmhash>>,
    /// Block number that fake-fail engines reject.
    fake_fail: Option<u64>,
    /// Sleep before each fake verification.
    fake_delay: Duration,
    close_once: OnceCell<()>,
}

impl fmt::Debug for Hmhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hmhash")
            .field("mode", &self.config.mode)
            .field("threads", &self.threads())
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl Hmhash {
    fn with_parts(config: Config, remote: Option<RemoteSealer>, shared: Option<Arc<Hmhash>>) -> Self {
        Self {
            config,
            mining: Arc::new(Mining::new()),
            remote,
            shared,
            fake_fail: None,
            fake_delay: Duration::ZERO,
            close_once: OnceCell::new(),
        }
    }

    /// Create an engine and start its remote sealer.
    ///
    /// A missing log sink is filled with the current default dispatcher. In
    /// [`Mode::Shared`] the process-wide engine is bound as delegate.
    ///
    /// # Errors
    ///
    /// Fails if the shared engine, the hashing context or the sealer cannot be
    /// created.
    pub fn new(mut config: Config, notify: Vec<String>, noverify: bool) -> Result<Self, HmhashError> {
        let log = config
            .log
            .get_or_insert_with(|| tracing::dispatcher::get_default(|dispatch| dispatch.clone()))
            .clone();
        let shared = match config.mode {
            Mode::Shared => Some(shared_engine()?),
            _ => None,
        };
        let settings = SealerSettings {
            notify,
            notify_full: config.notify_full,
            noverify,
            log,
        };
        let remote = RemoteSealer::start(settings, Hasher::keccak256()?)?;
        info!(mode = %config.mode, noverify, "hmhash engine created");
        Ok(Self::with_parts(config, Some(remote), shared))
    }

    /// Engine with test-sized resources, for unit and integration tests.
    pub fn new_tester(notify: Vec<String>, noverify: bool) -> Result<Self, HmhashError> {
        Self::new(Config::with_mode(Mode::Test), notify, noverify)
    }

    /// Engine that accepts every seal as valid.
    pub fn new_faker() -> Self {
        Self::fake(Mode::Fake)
    }

    /// Fake engine that rejects the seal of exactly block `fail`.
    pub fn new_fake_failer(fail: u64) -> Self {
        Self {
            fake_fail: Some(fail),
            ..Self::fake(Mode::FakeFail)
        }
    }

    /// Fake engine that sleeps for `delay` before each verification.
    pub fn new_fake_delayer(delay: Duration) -> Self {
        Self {
            fake_delay: delay,
            ..Self::fake(Mode::FakeDelay)
        }
    }

    /// Engine that accepts everything without checking any rule.
    pub fn new_full_faker() -> Self {
        Self::fake(Mode::FullFake)
    }

    fn fake(mode: Mode) -> Self {
        let config = Config {
            mode,
            notify_full: false,
            log: Some(tracing::dispatcher::get_default(|dispatch| dispatch.clone())),
        };
        Self::with_parts(config, None, None)
    }

    /// Engine delegating to the process-wide shared instance, creating that
    /// instance on first use. Has no remote sealer of its own.
    pub fn new_shared() -> Result<Self, HmhashError> {
        let config = Config {
            log: Some(tracing::dispatcher::get_default(|dispatch| dispatch.clone())),
            ..Config::with_mode(Mode::Shared)
        };
        Ok(Self::with_parts(config, None, Some(shared_engine()?)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub(crate) fn remote(&self) -> Option<&RemoteSealer> {
        self.remote.as_ref()
    }

    /// Number of local mining threads. Zero means one per CPU, negative
    /// disables local mining.
    pub fn threads(&self) -> i32 {
        match &self.shared {
            Some(shared) => shared.threads(),
            None => self.mining.threads(),
        }
    }

    /// Update the local mining thread count. Running seal operations restart
    /// with the new count.
    pub fn set_threads(&self, threads: i32) {
        match &self.shared {
            Some(shared) => shared.set_threads(threads),
            None => self.mining.set_threads(threads),
        }
    }

    /// Hashes per second: the local one-minute average, plus the remote miners'
    /// reports for normal and test engines whose sealer is still running.
    pub async fn hashrate(&self) -> f64 {
        let local = self.mining.hashrate.rate1();
        if !matches!(self.config.mode, Mode::Normal | Mode::Test) {
            return local;
        }
        let remote = match &self.remote {
            Some(remote) => remote.fetch_hashrate().await.unwrap_or(0),
            None => 0,
        };
        local + remote as f64
    }

    /// Stop the remote sealer and wait for it to exit. Only the first call
    /// does any work; later and concurrent calls return once it is done.
    pub async fn close(&self) -> Result<(), HmhashError> {
        self.close_once
            .get_or_init(|| async {
                if let Some(remote) = &self.remote {
                    remote.stop().await;
                }
                info!(mode = %self.config.mode, "hmhash engine closed");
            })
            .await;
        Ok(())
    }

    /// Alias of [`close`](Self::close).
    pub async fn stop_remote_sealer(&self) -> Result<(), HmhashError> {
        self.close().await
    }

    /// Check the proof-of-work of a sealed header.
    ///
    /// Fake engines block the calling thread for their configured delay.
    pub fn verify_seal(&self, header: &SealHeader) -> Result<(), HmhashError> {
        let mode = self.config.mode;
        if mode.verifies_pow() {
            if let Some(shared) = &self.shared {
                return shared.verify_seal(header);
            }
            return verify_pow(header).map_err(HmhashError::from);
        }
        if mode.is_fake() {
            if !self.fake_delay.is_zero() {
                std::thread::sleep(self.fake_delay);
            }
            if self.fake_fail == Some(header.number) {
                return Err(SealError::InvalidPoW.into());
            }
        }
        Ok(())
    }

    /// Start sealing `header`. The solution is sent to `results`.
    ///
    /// Fake engines deliver immediately with a zero nonce and mix digest.
    /// Otherwise the header becomes the remote sealer's current work and local
    /// miners search for a nonce in the background until one is found or
    /// `stop` holds `true` (or its sender is dropped).
    pub async fn seal(
        &self,
        header: SealHeader,
        results: mpsc::Sender<SealHeader>,
        stop: watch::Receiver<bool>,
    ) -> Result<(), HmhashError> {
        let engine = self.shared.as_deref().unwrap_or(self);
        engine.seal_own(header, results, stop).await
    }

    async fn seal_own(
        &self,
        header: SealHeader,
        results: mpsc::Sender<SealHeader>,
        stop: watch::Receiver<bool>,
    ) -> Result<(), HmhashError> {
        if self.config.mode.is_fake() || self.config.mode == Mode::FullFake {
            let sealed = header.with_seal(BlockNonce::default(), Hash256::ZERO);
            if results.try_send(sealed).is_err() {
                warn!(mode = "fake", sealhash = %header.seal_hash(), "sealing result is not read by miner");
            }
            return Ok(());
        }
        if header.difficulty == 0 {
            return Err(SealError::InvalidDifficulty.into());
        }
        let remote = self.remote.as_ref().ok_or(HmhashError::Stopped)?;
        remote.push_work(header.clone(), results.clone()).await?;
        remote.spawn(miner::coordinate(self.mining.clone(), header, results, stop));
        Ok(())
    }
}
