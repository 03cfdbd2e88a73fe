//! Error types for the hmhash primitives.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgorithmError {
    #[error("invalid dump magic")] InvalidDumpMagic,
    #[error("malformed dump: {len} bytes is not a whole number of words after the magic")] MalformedDump { len: usize },
    #[error("unsupported hashing context: produces {output_size} bytes, need {required}")] UnsupportedHashContext { output_size: usize, required: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealError {
    #[error("non-positive difficulty")] InvalidDifficulty,
    #[error("invalid mix digest")] InvalidMixDigest,
    #[error("invalid proof-of-work")] InvalidPoW,
}
