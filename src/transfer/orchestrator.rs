//! Transfer Orchestrator
//!
//! Moves one file with delete-after-verify semantics:
//! stage locally, write to the destination, compare sizes, delete the source
//! on a match. Only the write+verify step is retried.

use bytes::Bytes;

use crate::transfer::context::TransferContext;
use crate::transfer::error::TransferError;
use crate::transfer::retry::RetryError;
use crate::transfer::staging::StagedFile;
use crate::transfer::types::{remote_path, TransferAttempt};

pub struct TransferOrchestrator<'a> {
    ctx: &'a TransferContext,
}

impl<'a> TransferOrchestrator<'a> {
    pub fn new(ctx: &'a TransferContext) -> Self {
        Self { ctx }
    }

    /// Move `filename` from the source root into the destination folder
    ///
    /// The source file is deleted only after an attempt whose destination size
    /// equals the staged size. Returns that matching attempt.
    pub async fn transfer(&self, filename: &str) -> Result<TransferAttempt, TransferError> {
        let folder = self.ctx.destination_folder.as_str();
        self.ctx
            .destination
            .ensure_directory(folder)
            .await
            .map_err(|source| TransferError::EnsureDirectory {
                path: folder.to_string(),
                source,
            })?;

        let staged = StagedFile::stage(
            self.ctx.source.as_ref(),
            filename,
            self.ctx.staging_dir.as_deref(),
        )
        .await
        .map_err(|source| TransferError::Stage { source })?;

        // Destinations need the length up front, so the upload is one buffer
        let content = staged
            .read_all()
            .await
            .map_err(|e| TransferError::Stage { source: e.into() })?;

        let path = remote_path(folder, filename);
        let path = path.as_str();
        let content = &content;
        let staged_ref = &staged;

        let result = self
            .ctx
            .retry
            .execute(
                self.ctx.sleeper.as_ref(),
                move |attempt| self.write_and_verify(attempt, filename, path, content, staged_ref),
                |attempt| attempt.matched,
            )
            .await;

        match result {
            Ok(attempt) => {
                log::info!("Deleting {}...", filename);
                self.ctx
                    .source
                    .delete(filename)
                    .await
                    .map_err(|source| TransferError::Delete { source })?;
                Ok(attempt)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                // the poller reports the failure itself
                log::warn!("{}: keeping source file after {} attempts", filename, attempts);
                Err(TransferError::Exhausted {
                    attempts,
                    expected: last.expected_size,
                    written: last.written_size,
                })
            }
            Err(RetryError::Hard(e)) => Err(e),
        }
        // `staged` is dropped here on every path, removing the local copy
    }

    async fn write_and_verify(
        &self,
        attempt: u32,
        filename: &str,
        path: &str,
        content: &Bytes,
        staged: &StagedFile,
    ) -> Result<TransferAttempt, TransferError> {
        self.ctx
            .destination
            .write_full(path, content.clone())
            .await
            .map_err(|source| TransferError::Write {
                path: path.to_string(),
                source,
            })?;

        let written_size = self
            .ctx
            .destination
            .stat(path)
            .await
            .map_err(|source| TransferError::Stat {
                path: path.to_string(),
                source,
            })?;

        let expected_size = staged.size().await.map_err(|e| TransferError::Stat {
            path: staged.path().display().to_string(),
            source: e.into(),
        })?;

        let result = TransferAttempt::new(attempt, written_size, expected_size);
        if !result.matched {
            log::warn!(
                "{}: file size mismatch ({} != {}) on attempt {}/{}",
                filename,
                expected_size,
                written_size,
                attempt,
                self.ctx.retry.max_attempts()
            );
        }
        Ok(result)
    }
}
