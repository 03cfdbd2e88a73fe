//! Error type for the hmhash engine.
use hmhash_core::error::{AlgorithmError, SealError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HmhashError {
    #[error("hmhash stopped")] Stopped,
    #[error("no mining work available yet")] NoMiningWork,
    #[error("not supported")] NotSupported,
    #[error("unknown pow mode: {0}")] UnknownMode(String),
    #[error(transparent)] Algorithm(#[from] AlgorithmError),
    #[error(transparent)] Seal(#[from] SealError),
    #[error("sealer runtime: {0}")] Runtime(#[from] std::io::Error),
    #[error("notify client: {0}")] Http(#[from] reqwest::Error),
}
