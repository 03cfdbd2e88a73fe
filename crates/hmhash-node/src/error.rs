//! Node-level errors.
use hmhash_consensus::HmhashError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)] Engine(#[from] HmhashError),
    #[error("rpc server error: {0}")] Rpc(String),
}
