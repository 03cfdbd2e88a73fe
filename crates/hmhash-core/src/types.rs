//! Core types: digests, nonces and the sealable header view.
//!
//! Full block and header structures live with the chain. The engine only needs
//! the fields that bind a proof-of-work, which [`SealHeader`] carries.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// A 32-byte hash value.
///
/// Used for seal hashes, seeds, nonce digests, mix digests and targets. The
/// derived ordering is lexicographic over the bytes, which equals numeric
/// ordering of the big-endian 256-bit integer.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; 32]);

    /// The largest 256-bit value.
    pub const MAX: Self = Self([0xff; 32]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// 0x-prefixed lowercase hex, the form used on the miner protocol.
    pub fn to_prefixed_hex(&self) -> String {
        format!("0x{self}")
    }

    /// Keccak-256 of arbitrary data.
    pub fn keccak(data: &[u8]) -> Self {
        Self(Keccak256::digest(data).into())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 64-bit proof-of-work nonce, stored big-endian.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BlockNonce(pub [u8; 8]);

impl BlockNonce {
    /// Encode an integer nonce.
    pub fn new(nonce: u64) -> Self {
        Self(nonce.to_be_bytes())
    }

    /// The nonce as an integer.
    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Nonce-derived digest fed into the hash primitive: keccak-256 of the
    /// eight big-endian nonce bytes.
    pub fn hash(&self) -> Hash256 {
        Hash256::keccak(&self.0)
    }
}

impl From<u64> for BlockNonce {
    fn from(nonce: u64) -> Self {
        Self::new(nonce)
    }
}

impl fmt::Display for BlockNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// The header fields that a seal commits to, plus the seal itself.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct SealHeader {
    /// Hash of the parent block.
    pub parent_hash: Hash256,
    /// Block number (height).
    pub number: u64,
    /// Proof-of-work difficulty. Zero is never valid.
    pub difficulty: u64,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Proof-of-work nonce.
    pub nonce: BlockNonce,
    /// Digest produced by the hash primitive for `nonce`.
    pub mix_digest: Hash256,
}

impl SealHeader {
    /// Size of the byte layout hashed by [`seal_hash`](Self::seal_hash).
    const SEAL_SIZE: usize = 32 + 3 * 8;

    /// Hash of the header without its seal: keccak-256 over
    /// parent_hash || number || difficulty || timestamp, integers big-endian.
    ///
    /// This is the header digest miners combine with their nonce digest.
    pub fn seal_hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::SEAL_SIZE);
        data.extend_from_slice(self.parent_hash.as_bytes());
        data.extend_from_slice(&self.number.to_be_bytes());
        data.extend_from_slice(&self.difficulty.to_be_bytes());
        data.extend_from_slice(&self.timestamp.to_be_bytes());
        Hash256::keccak(&data)
    }

    /// Copy of this header carrying the given seal.
    pub fn with_seal(&self, nonce: BlockNonce, mix_digest: Hash256) -> Self {
        Self {
            nonce,
            mix_digest,
            ..self.clone()
        }
    }
}
