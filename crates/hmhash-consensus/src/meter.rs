//! One-minute exponentially weighted hash rate meter.
//!
//! Miner threads [`mark`](Meter::mark) hashes into an atomic counter. The
//! moving average folds pending counts in on five-second ticks. Ticks are
//! caught up lazily both when hashes are recorded and when the rate is read,
//! so hashes marked during a tick land in that tick even if nobody reads the
//! meter for a long time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Interval between averaging ticks.
pub const TICK: Duration = Duration::from_secs(5);

/// Window of the moving average.
const WINDOW_SECS: f64 = 60.0;

fn alpha() -> f64 {
    1.0 - (-TICK.as_secs_f64() / WINDOW_SECS).exp()
}

#[derive(Debug)]
struct EwmaState {
    /// Events per second.
    rate: f64,
    initialized: bool,
    last_tick: Instant,
}

/// Hash rate meter shared between miners and the engine.
#[derive(Debug)]
pub struct Meter {
    uncounted: AtomicU64,
    state: Mutex<EwmaState>,
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    fn started_at(start: Instant) -> Self {
        Self {
            uncounted: AtomicU64::new(0),
            state: Mutex::new(EwmaState {
                rate: 0.0,
                initialized: false,
                last_tick: start,
            }),
        }
    }

    /// Record `n` hashes.
    pub fn mark(&self, n: u64) {
        self.mark_at(n, Instant::now());
    }

    pub(crate) fn mark_at(&self, n: u64, now: Instant) {
        // a contended lock means another thread is catching up already
        if let Some(mut state) = self.state.try_lock() {
            self.catch_up(&mut state, now);
        }
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// One-minute moving average in hashes per second.
    pub fn rate1(&self) -> f64 {
        self.rate1_at(Instant::now())
    }

    pub(crate) fn rate1_at(&self, now: Instant) -> f64 {
        let mut state = self.state.lock();
        self.catch_up(&mut state, now);
        state.rate
    }

    /// Apply every tick that ended before `now`. The first absorbs the
    /// pending count, the rest only decay.
    fn catch_up(&self, state: &mut EwmaState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_tick);
        let ticks = (elapsed.as_nanos() / TICK.as_nanos()) as u64;
        if ticks == 0 {
            return;
        }

        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant = count as f64 / TICK.as_secs_f64();
        let a = alpha();
        if state.initialized {
            state.rate += a * (instant - state.rate);
        } else {
            state.rate = instant;
            state.initialized = true;
        }
        if ticks > 1 {
            let idle = i32::try_from(ticks - 1).unwrap_or(i32::MAX);
            state.rate *= (1.0 - a).powi(idle);
        }
        state.last_tick += TICK * u32::try_from(ticks).unwrap_or(u32::MAX);
    }
}
