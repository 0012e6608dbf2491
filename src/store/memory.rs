//! In-memory store for testing
//!
//! Implements both sides and allows injecting failures and truncated writes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::error::StoreError;
use super::traits::{DestinationStore, SourceEntry, SourceStore};

/// Store operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Op {
    List,
    Retrieve,
    Delete,
    EnsureDirectory,
    Write,
    Stat,
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, Bytes>,
    directories: BTreeSet<String>,
    /// Remaining injected failures per operation
    failures: BTreeMap<Op, u32>,
    /// Fail every call of these operations
    always_fail: BTreeSet<Op>,
    /// Fail exactly the n-th call (1-based) of an operation
    fail_calls: BTreeSet<(Op, u32)>,
    /// Keep only this many bytes of each write
    truncate_writes_to: Option<usize>,
    calls: BTreeMap<Op, u32>,
    writes: Vec<(String, usize)>,
}

/// Mock store
pub struct MemoryStore {
    name: String,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn insert(&self, name: &str, content: impl Into<Bytes>) {
        self.lock().files.insert(name.to_string(), content.into());
    }

    pub fn add_directory(&self, name: &str) {
        self.lock().directories.insert(name.to_string());
    }

    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.lock().files.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().files.contains_key(name)
    }

    pub fn has_directory(&self, name: &str) -> bool {
        self.lock().directories.contains(name)
    }

    /// Fail the next `count` calls of `op`
    pub fn fail_next(&self, op: Op, count: u32) {
        *self.lock().failures.entry(op).or_insert(0) += count;
    }

    /// Fail every call of `op`
    pub fn fail_always(&self, op: Op) {
        self.lock().always_fail.insert(op);
    }

    /// Fail only the `nth` call (1-based) of `op`
    pub fn fail_call(&self, op: Op, nth: u32) {
        self.lock().fail_calls.insert((op, nth));
    }

    /// Store at most `len` bytes of every subsequent write
    pub fn truncate_writes_to(&self, len: usize) {
        self.lock().truncate_writes_to = Some(len);
    }

    pub fn calls(&self, op: Op) -> u32 {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// (path, stored length) of every successful write, in order
    pub fn writes(&self) -> Vec<(String, usize)> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the call and consume an injected failure if one is pending
    fn enter(&self, op: Op, target: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let call = {
            let count = state.calls.entry(op).or_insert(0);
            *count += 1;
            *count
        };

        if state.always_fail.contains(&op) || state.fail_calls.contains(&(op, call)) {
            return Err(StoreError::Other(format!("[{}] injected {op:?} failure on {target}", self.name)));
        }
        if let Some(remaining) = state.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Other(format!("[{}] injected {op:?} failure on {target}", self.name)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn list_root(&self) -> Result<Vec<SourceEntry>, StoreError> {
        self.enter(Op::List, "/")?;
        let state = self.lock();
        let mut entries: Vec<SourceEntry> = state
            .files
            .keys()
            .filter(|k| !k.contains('/'))
            .map(SourceEntry::file)
            .chain(state.directories.iter().map(SourceEntry::directory))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn retrieve_into(
        &self,
        name: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), StoreError> {
        self.enter(Op::Retrieve, name)?;
        let content = self
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        log::debug!("[{}] retrieve({name}) {} bytes", self.name, content.len());
        writer.write_all(&content).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.enter(Op::Delete, name)?;
        log::debug!("[{}] delete({name})", self.name);
        self.lock()
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn ensure_directory(&self, path: &str) -> Result<(), StoreError> {
        self.enter(Op::EnsureDirectory, path)?;
        self.lock().directories.insert(path.to_string());
        Ok(())
    }

    async fn write_full(&self, path: &str, content: Bytes) -> Result<(), StoreError> {
        self.enter(Op::Write, path)?;
        let mut state = self.lock();
        let stored = match state.truncate_writes_to {
            Some(len) if len < content.len() => content.slice(..len),
            _ => content,
        };
        log::debug!("[{}] write_full({path}) {} bytes", self.name, stored.len());
        state.writes.push((path.to_string(), stored.len()));
        state.files.insert(path.to_string(), stored);
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<u64, StoreError> {
        self.enter(Op::Stat, path)?;
        self.lock()
            .files
            .get(path)
            .map(|c| c.len() as u64)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fail_next_then_recover() {
        let mock = MemoryStore::new("test");
        mock.insert("a.jpg", vec![0u8; 10]);
        mock.fail_next(Op::List, 1);

        assert!(mock.list_root().await.is_err());
        assert_eq!(mock.list_root().await.unwrap(), vec![SourceEntry::file("a.jpg")]);
        assert_eq!(mock.calls(Op::List), 2);
    }

    #[tokio::test]
    async fn test_mock_truncated_write() {
        let mock = MemoryStore::new("test");
        mock.truncate_writes_to(900);

        mock.write_full("/dst/b.jpg", Bytes::from(vec![1u8; 1000])).await.unwrap();
        assert_eq!(mock.stat("/dst/b.jpg").await.unwrap(), 900);
        assert_eq!(mock.writes(), vec![("/dst/b.jpg".to_string(), 900)]);
    }

    #[tokio::test]
    async fn test_mock_listing_hides_nested_paths() {
        let mock = MemoryStore::new("test");
        mock.insert("a.jpg", "a");
        mock.insert("/dst/a.jpg", "a");
        mock.add_directory("archive");

        let entries = mock.list_root().await.unwrap();
        assert_eq!(
            entries,
            vec![SourceEntry::file("a.jpg"), SourceEntry::directory("archive")]
        );
    }
}
