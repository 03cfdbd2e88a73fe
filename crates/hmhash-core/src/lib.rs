//! # hmhash-core
//! Foundation types, seed derivation and the pluggable hash primitive for the
//! hmhash proof-of-work engine.

pub mod algorithm;
pub mod constants;
pub mod dump;
pub mod error;
pub mod types;
