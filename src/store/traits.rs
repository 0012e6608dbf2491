//! Store traits
//!
//! Defines the capabilities the transfer core consumes from each side.
//! Connection setup and authentication happen before a store is handed over.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWrite;

use super::error::StoreError;

/// One entry of the source root listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub is_directory: bool,
}

impl SourceEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
        }
    }
}

/// Polled origin of files
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// List the entries at the source root, in listing order
    async fn list_root(&self) -> Result<Vec<SourceEntry>, StoreError>;

    /// Copy the full content of `name` into `writer`
    ///
    /// The source stream is consumed once; callers that need the bytes again
    /// must keep their own copy.
    async fn retrieve_into(
        &self,
        name: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), StoreError>;

    /// Remove `name` from the source
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Startup connectivity check
    async fn probe(&self) -> Result<(), StoreError> {
        self.list_root().await.map(|_| ())
    }

    /// Get store name for logging
    fn name(&self) -> &str;
}

/// Target of verified copies
///
/// Writes are length-known only: `write_full` receives the whole content up
/// front so the backend can announce its size. Backends must not fall back to
/// an unknown-length (chunked) upload.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Create `path` and its parents if absent
    async fn ensure_directory(&self, path: &str) -> Result<(), StoreError>;

    /// Write `content` to `path`, replacing whatever is there
    async fn write_full(&self, path: &str, content: Bytes) -> Result<(), StoreError>;

    /// Size in bytes of the object at `path`
    async fn stat(&self, path: &str) -> Result<u64, StoreError>;

    /// Startup connectivity check
    async fn probe(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Get store name for logging
    fn name(&self) -> &str;
}
