//! Core types for the transfer protocol

use std::fmt;

/// Result of one write-then-verify attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    /// Size reported by the destination after the write
    pub written_size: u64,
    /// Size of the staged local copy
    pub expected_size: u64,
    pub matched: bool,
}

impl TransferAttempt {
    pub fn new(attempt: u32, written_size: u64, expected_size: u64) -> Self {
        Self {
            attempt,
            written_size,
            expected_size,
            matched: written_size == expected_size,
        }
    }
}

/// How a transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Copy verified, source removed
    Deleted,
    /// Size never matched within the retry bound, source kept
    Exhausted,
    /// Hard I/O error at some step, source kept
    Aborted,
}

impl TransferOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOutcome::Deleted => "deleted",
            TransferOutcome::Exhausted => "exhausted",
            TransferOutcome::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join a destination folder and a file name the way `path.Join` would
pub fn remote_path(folder: &str, filename: &str) -> String {
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        format!("/{}", filename)
    } else {
        format!("{}/{}", folder, filename)
    }
}
