//! Seed derivation and the hash primitive.
//!
//! The mixing function here is a stand-in: [`hashimoto`] XORs the header
//! digest with the nonce digest. The real cache/dataset based algorithm is a
//! separate component. Whatever replaces it must keep the light and full entry
//! points bit-for-bit identical, which the tests in this module pin down.
//!
//! # Hashing contexts
//!
//! [`Hasher`] wraps a reusable digest context that is reset between runs
//! instead of allocating a new one each time. It is not `Sync`; callers must
//! not share one context across concurrent hashing calls.

use std::convert::Infallible;
use std::fmt;

use sha3::digest::DynDigest;
use sha3::{Digest, Keccak256};

use crate::constants::{epoch, HASH_LEN};
use crate::error::AlgorithmError;
use crate::types::Hash256;

/// A repetitive hasher reusing one digest context between runs.
pub struct Hasher {
    ctx: Box<dyn DynDigest + Send>,
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("output_size", &self.ctx.output_size())
            .finish_non_exhaustive()
    }
}

impl Hasher {
    /// Wrap a digest context.
    ///
    /// # Errors
    ///
    /// Returns [`AlgorithmError::UnsupportedHashContext`] if the context cannot
    /// drain exactly one 32-byte digest per reset. Treat this as a fatal
    /// configuration error at startup.
    pub fn new(ctx: Box<dyn DynDigest + Send>) -> Result<Self, AlgorithmError> {
        let output_size = ctx.output_size();
        if output_size != HASH_LEN {
            return Err(AlgorithmError::UnsupportedHashContext {
                output_size,
                required: HASH_LEN,
            });
        }
        Ok(Self { ctx })
    }

    /// Keccak-256 hasher, the context used for seeds and seal hashes.
    pub fn keccak256() -> Result<Self, AlgorithmError> {
        Self::new(Box::new(Keccak256::default()))
    }

    /// Hash `data` into `dest`, resetting the context first.
    pub fn hash_into(&mut self, dest: &mut Hash256, data: &[u8]) -> Result<(), AlgorithmError> {
        self.ctx.reset();
        self.ctx.update(data);
        self.ctx
            .finalize_into_reset(&mut dest.0)
            .map_err(|_| AlgorithmError::UnsupportedHashContext {
                output_size: self.ctx.output_size(),
                required: HASH_LEN,
            })
    }
}

/// Seed used to generate the verification cache and the mining dataset for
/// the epoch containing `block`.
///
/// Zero for the first epoch; otherwise keccak-256 iterated once per epoch,
/// starting from 32 zero bytes. The cost is linear in the epoch number, so a
/// block number near `u64::MAX` takes hundreds of trillions of rounds.
pub fn seed_hash(block: u64) -> Hash256 {
    let mut keccak = Keccak256::new();
    let seed = fold_epochs(block, |seed| {
        Digest::update(&mut keccak, seed.as_bytes());
        Ok::<_, Infallible>(Hash256(Digest::finalize_reset(&mut keccak).into()))
    });
    seed.unwrap_or_else(|never| match never {})
}

/// [`seed_hash`] computed with a caller-owned reusable hasher.
pub fn seed_hash_with(hasher: &mut Hasher, block: u64) -> Result<Hash256, AlgorithmError> {
    fold_epochs(block, |seed| {
        let mut next = Hash256::ZERO;
        hasher.hash_into(&mut next, seed.as_bytes())?;
        Ok(next)
    })
}

fn fold_epochs<E>(block: u64, mut step: impl FnMut(&Hash256) -> Result<Hash256, E>) -> Result<Hash256, E> {
    let mut seed = Hash256::ZERO;
    for _ in 0..epoch(block) {
        seed = step(&seed)?;
    }
    Ok(seed)
}

/// Final value for a header digest and nonce digest.
pub fn hashimoto(hash: &Hash256, nonce_hash: &Hash256) -> Hash256 {
    let mut result = [0u8; 32];
    for (i, out) in result.iter_mut().enumerate() {
        *out = hash.0[i] ^ nonce_hash.0[i];
    }
    Hash256(result)
}

/// Hash using only the small verification cache.
pub fn hashimoto_light(hash: &Hash256, nonce_hash: &Hash256) -> Hash256 {
    hashimoto(hash, nonce_hash)
}

/// Hash using the full mining dataset.
pub fn hashimoto_full(hash: &Hash256, nonce_hash: &Hash256) -> Hash256 {
    hashimoto(hash, nonce_hash)
}

/// Proof-of-work boundary `2^256 / difficulty` as a big-endian 256-bit value.
///
/// A difficulty of 1 saturates to [`Hash256::MAX`]. A difficulty of 0 yields
/// [`Hash256::ZERO`]; verification rejects it before comparing.
pub fn difficulty_to_target(difficulty: u64) -> Hash256 {
    match difficulty {
        0 => Hash256::ZERO,
        1 => Hash256::MAX,
        d => {
            // long division of 2^256 (a one followed by 32 zero bytes)
            let divisor = u128::from(d);
            let mut rem = 1u128;
            let mut target = [0u8; 32];
            for byte in target.iter_mut() {
                rem <<= 8;
                *byte = (rem / divisor) as u8;
                rem %= divisor;
            }
            Hash256(target)
        }
    }
}
