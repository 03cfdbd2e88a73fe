//! Integration test suite for the hmhash engine.
//!
//! Exercises engines end to end: remote mining over JSON-RPC, work
//! notifications, the shared engine and shutdown under concurrency.

pub mod helpers;
