//! Process-wide transfer context
//!
//! Holds the connected stores and the transfer settings for the lifetime of
//! the process. Owned by the poller and lent to each transfer.

use std::path::PathBuf;
use std::sync::Arc;

use crate::store::{DestinationStore, SourceStore};
use crate::transfer::retry::{RetryPolicy, Sleeper, TokioSleeper};

pub struct TransferContext {
    pub source: Arc<dyn SourceStore>,
    pub destination: Arc<dyn DestinationStore>,
    /// Folder on the destination receiving the files
    pub destination_folder: String,
    /// Where staged copies are written, OS temp dir when unset
    pub staging_dir: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub sleeper: Arc<dyn Sleeper>,
}

impl TransferContext {
    pub fn new(
        source: Arc<dyn SourceStore>,
        destination: Arc<dyn DestinationStore>,
        destination_folder: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            destination_folder: destination_folder.into(),
            staging_dir: None,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = dir;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}
