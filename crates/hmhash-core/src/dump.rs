//! Cache and dataset dump encoding.
//!
//! A dump is a stream of native-endian `u32` words prefixed with
//! [`DUMP_MAGIC`]. Dumps are only portable between hosts of the same byte
//! order, so file names carry a `.be` suffix on big-endian hosts. Reading and
//! writing the files themselves is left to the caller.

use std::fmt;

use crate::constants::{ALGORITHM_REVISION, DUMP_MAGIC};
use crate::error::AlgorithmError;
use crate::types::Hash256;

const WORD: usize = 4;

/// Which structure a dump holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    /// Verification cache.
    Cache,
    /// Full mining dataset.
    Full,
}

impl fmt::Display for DumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Whether the host stores integers little-endian.
pub fn is_little_endian() -> bool {
    0x0102_0304u32.to_ne_bytes()[0] == 0x04
}

/// File name for a dump of `kind` generated from `seed`.
///
/// # Examples
///
/// ```
/// use hmhash_core::dump::{dump_file_name, DumpKind};
/// use hmhash_core::types::Hash256;
/// let name = dump_file_name(DumpKind::Cache, &Hash256([0xAB; 32]));
/// assert!(name.starts_with("cache-R23-abababababababab"));
/// ```
pub fn dump_file_name(kind: DumpKind, seed: &Hash256) -> String {
    let endian = if is_little_endian() { "" } else { ".be" };
    format!(
        "{kind}-R{ALGORITHM_REVISION}-{}{endian}",
        hex::encode(&seed.as_bytes()[..8])
    )
}

/// Serialize words into a dump, magic first.
pub fn encode(words: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity((DUMP_MAGIC.len() + words.len()) * WORD);
    for word in DUMP_MAGIC.iter().chain(words) {
        out.extend_from_slice(&word.to_ne_bytes());
    }
    out
}

/// Parse a dump back into its payload words.
///
/// # Errors
///
/// - [`AlgorithmError::MalformedDump`] if the stream is shorter than the magic
///   or not a whole number of words.
/// - [`AlgorithmError::InvalidDumpMagic`] if the leading two words are not
///   [`DUMP_MAGIC`]; the dump is corrupt or from another byte order.
pub fn decode(bytes: &[u8]) -> Result<Vec<u32>, AlgorithmError> {
    let header = DUMP_MAGIC.len() * WORD;
    if bytes.len() < header || bytes.len() % WORD != 0 {
        return Err(AlgorithmError::MalformedDump { len: bytes.len() });
    }
    let mut words = bytes
        .chunks_exact(WORD)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));

    let magic = [words.next(), words.next()];
    if magic != [Some(DUMP_MAGIC[0]), Some(DUMP_MAGIC[1])] {
        return Err(AlgorithmError::InvalidDumpMagic);
    }
    Ok(words.collect())
}
