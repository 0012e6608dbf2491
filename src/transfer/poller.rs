//! Poller
//!
//! Lists the source root, transfers every file one at a time, sleeps, repeats.
//! Nothing that happens during a cycle stops the loop.

use std::time::Duration;

use crate::transfer::context::TransferContext;
use crate::transfer::orchestrator::TransferOrchestrator;
use crate::transfer::types::TransferOutcome;

/// Default sleep between poll cycles
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// What one poll cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries returned by the listing, directories included
    pub listed: usize,
    pub directories_skipped: usize,
    pub deleted: usize,
    pub exhausted: usize,
    pub aborted: usize,
    /// Listing failed, nothing was transferred
    pub list_failed: bool,
}

impl CycleReport {
    fn record(&mut self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Deleted => self.deleted += 1,
            TransferOutcome::Exhausted => self.exhausted += 1,
            TransferOutcome::Aborted => self.aborted += 1,
        }
    }

    /// Files that remain at the source after this cycle
    pub fn left(&self) -> usize {
        self.exhausted + self.aborted
    }
}

pub struct Poller {
    ctx: TransferContext,
    interval: Duration,
}

impl Poller {
    pub fn new(ctx: TransferContext, interval: Duration) -> Self {
        Self { ctx, interval }
    }

    pub fn context(&self) -> &TransferContext {
        &self.ctx
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one listing-and-transfer pass
    pub async fn poll_once(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let entries = match self.ctx.source.list_root().await {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("list {}: {}", self.ctx.source.name(), e);
                report.list_failed = true;
                return report;
            }
        };
        report.listed = entries.len();

        let orchestrator = TransferOrchestrator::new(&self.ctx);
        for entry in entries {
            if entry.is_directory {
                report.directories_skipped += 1;
                continue;
            }
            log::info!("Found a new file: {}", entry.name);

            match orchestrator.transfer(&entry.name).await {
                Ok(attempt) => {
                    log::info!(
                        "{}: moved {} bytes on attempt {}",
                        entry.name,
                        attempt.written_size,
                        attempt.attempt
                    );
                    report.record(TransferOutcome::Deleted);
                }
                Err(e) => {
                    log::error!("{}: {}", entry.name, e);
                    report.record(e.outcome());
                }
            }
        }

        if report.deleted + report.left() > 0 {
            log::info!(
                "Poll cycle done: {} listed, {} deleted, {} left at source",
                report.listed,
                report.deleted,
                report.left()
            );
        }
        report
    }

    /// Poll forever
    pub async fn run(&self) {
        log::info!(
            "Poller started ({} -> {}{}, interval={:?}, max_attempts={}, retry_delay={:?})",
            self.ctx.source.name(),
            self.ctx.destination.name(),
            self.ctx.destination_folder,
            self.interval,
            self.ctx.retry.max_attempts(),
            self.ctx.retry.delay()
        );

        loop {
            self.poll_once().await;
            self.ctx.sleeper.sleep(self.interval).await;
        }
    }
}
