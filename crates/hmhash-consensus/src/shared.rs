//! Process-wide shared engine.
//!
//! The first caller creates a normal-mode engine that lives until the process
//! exits. Later callers get the same instance.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::Hmhash;
use crate::error::HmhashError;

static SHARED: Mutex<Option<Arc<Hmhash>>> = parking_lot::const_mutex(None);

/// The shared engine, created on first use.
///
/// # Errors
///
/// Fails only if creating the engine fails; the next call retries.
pub fn shared_engine() -> Result<Arc<Hmhash>, HmhashError> {
    let mut slot = SHARED.lock();
    if let Some(engine) = slot.as_ref() {
        return Ok(engine.clone());
    }
    let engine = Arc::new(Hmhash::new(Config::default(), Vec::new(), false)?);
    *slot = Some(engine.clone());
    Ok(engine)
}
