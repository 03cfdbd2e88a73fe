//! # hmhash-consensus — proof-of-work engine lifecycle and mining coordination.
//!
//! [`Hmhash`] verifies seals according to its [`Mode`], drives local mining
//! threads, and owns a remote sealer through which external miners pull work
//! and push solutions. Shared-mode engines delegate to one process-wide
//! instance from the [`shared`] registry.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod meter;
mod miner;
pub mod sealer;
pub mod shared;

pub use api::{HmhashApi, RpcApi};
pub use config::{Config, Mode};
pub use engine::{verify_pow, Hmhash};
pub use error::HmhashError;
