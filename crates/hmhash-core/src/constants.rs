//! Protocol constants for the hmhash proof-of-work scheme.

/// Blocks per epoch. All blocks of an epoch share one seed.
pub const EPOCH_LENGTH: u64 = 30_000;

/// Data structure version of caches and datasets, used in dump file names.
pub const ALGORITHM_REVISION: u32 = 23;

/// Two-word header every cache or dataset dump starts with.
pub const DUMP_MAGIC: [u32; 2] = [0xbaddcafe, 0xfee1dead];

/// Length in bytes of every digest handled by the engine.
pub const HASH_LEN: usize = 32;

/// Number of blocks after which submitted work is considered stale.
///
/// A solution for block `n` is still accepted while the newest work is for a
/// block below `n + STALE_THRESHOLD`.
pub const STALE_THRESHOLD: u64 = 7;

/// Returns the epoch a block number belongs to.
///
/// # Examples
///
/// ```
/// use hmhash_core::constants::epoch;
/// assert_eq!(epoch(0), 0);
/// assert_eq!(epoch(29_999), 0);
/// assert_eq!(epoch(30_000), 1);
/// ```
pub fn epoch(block: u64) -> u64 {
    block / EPOCH_LENGTH
}
