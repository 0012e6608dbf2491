use thiserror::Error;

use crate::store::StoreError;
use crate::transfer::types::TransferOutcome;

/// Why a file was not moved
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("ensure directory {path}: {source}")]
    EnsureDirectory { path: String, source: StoreError },

    #[error("stage: {source}")]
    Stage { source: StoreError },

    #[error("write {path}: {source}")]
    Write { path: String, source: StoreError },

    #[error("stat {path}: {source}")]
    Stat { path: String, source: StoreError },

    #[error("size never matched after {attempts} attempts (expected {expected}, last written {written})")]
    Exhausted {
        attempts: u32,
        expected: u64,
        written: u64,
    },

    #[error("delete: {source}")]
    Delete { source: StoreError },
}

impl TransferError {
    /// Retry exhaustion is the only soft failure; everything else aborted the transfer
    pub fn outcome(&self) -> TransferOutcome {
        match self {
            TransferError::Exhausted { .. } => TransferOutcome::Exhausted,
            _ => TransferOutcome::Aborted,
        }
    }
}
