//! Local directory store
//!
//! Serves a directory of the local filesystem as either side of a transfer,
//! e.g. a mounted drop share as source or a mounted archive as destination.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

use super::error::StoreError;
use super::traits::{DestinationStore, SourceEntry, SourceStore};

pub struct LocalStore {
    root: PathBuf,
    name: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = format!("local:{}", root.display());
        Self { root, name }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a store path (`/folder/file`) below the root directory
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl SourceStore for LocalStore {
    async fn list_root(&self) -> Result<Vec<SourceEntry>, StoreError> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(SourceEntry {
                name,
                is_directory: file_type.is_dir(),
            });
        }
        // read_dir order is platform dependent
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn retrieve_into(
        &self,
        name: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), StoreError> {
        let path = self.resolve(name);
        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        io::copy(&mut file, writer).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        fs::remove_file(self.resolve(name)).await?;
        Ok(())
    }

    async fn probe(&self) -> Result<(), StoreError> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StoreError::Other(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl DestinationStore for LocalStore {
    async fn ensure_directory(&self, path: &str) -> Result<(), StoreError> {
        fs::create_dir_all(self.resolve(path)).await?;
        Ok(())
    }

    async fn write_full(&self, path: &str, content: Bytes) -> Result<(), StoreError> {
        fs::write(self.resolve(path), &content).await?;
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<u64, StoreError> {
        match fs::metadata(self.resolve(path)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn probe(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
