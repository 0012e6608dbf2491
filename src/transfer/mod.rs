//! Transfer module - main module file
//!
//! This module provides the move protocol: the poller drives the
//! orchestrator, which stages each file and retries write+verify under a
//! bounded retry policy.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod retry;
pub mod staging;
pub mod types;

// Re-export commonly used types
pub use context::TransferContext;
pub use error::TransferError;
pub use orchestrator::TransferOrchestrator;
pub use poller::{CycleReport, Poller, DEFAULT_POLLING_INTERVAL};
pub use retry::{RecordingSleeper, RetryError, RetryPolicy, Sleeper, TokioSleeper};
pub use staging::StagedFile;
pub use types::{TransferAttempt, TransferOutcome};
