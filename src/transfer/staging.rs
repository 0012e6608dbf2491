//! Local staging of a source file
//!
//! The source stream can only be read once, so each transfer copies it into
//! a temporary file first. Every write attempt reuses that copy.

use std::io;
use std::path::Path;

use bytes::Bytes;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::store::{SourceStore, StoreError};

const STAGING_PREFIX: &str = "ferry-";

/// Temporary local copy of one source file
///
/// The backing file is removed when the value is dropped, whatever the
/// outcome of the transfer.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
}

impl StagedFile {
    /// Create a temporary file and retrieve `name` from `source` into it
    ///
    /// On failure the partially written file is removed before returning.
    pub async fn stage(
        source: &dyn SourceStore,
        name: &str,
        staging_dir: Option<&Path>,
    ) -> Result<Self, StoreError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let file = match staging_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let mut writer = fs::File::from_std(file.reopen()?);
        source.retrieve_into(name, &mut writer).await?;
        writer.flush().await?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Whole staged content as one immutable buffer
    pub async fn read_all(&self) -> io::Result<Bytes> {
        fs::read(self.path()).await.map(Bytes::from)
    }

    /// Current size of the staged file on disk
    pub async fn size(&self) -> io::Result<u64> {
        Ok(fs::metadata(self.path()).await?.len())
    }
}
