use std::time::Duration;

use serde::Serialize;
use storage::dto::common::{ChunkWindow, DEFAULT_CHUNK_SIZE};
use storage::dto::sync::SyncResult;
use storage::error::StorageError;
use storage::services::chunking::ChunkCoordinator;
use storage::traits::{AttendanceStore, RegistrationSource};
use tracing::{info, warn};

use crate::error::{Result, SyncerError};

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub chunk_size: i64,
    /// Offset of the first window to process; resumes an interrupted run.
    pub start_offset: i64,
    /// Extra attempts per chunk after the first failure.
    pub max_retries: u32,
    /// Multiplied by the attempt number before each retry.
    pub retry_delay: Duration,
    /// Pause between consecutive chunks.
    pub chunk_delay: Duration,
    /// Stop at the first chunk that exhausts its retries.
    pub fail_fast: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            start_offset: 0,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            chunk_delay: Duration::from_millis(100),
            fail_fast: false,
        }
    }
}

/// Outcome of a full count-then-chunk run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveReport {
    pub total_teams: i64,
    pub total_chunks: i64,
    pub completed_chunks: i64,
    /// Offsets of chunks that still failed after every retry.
    pub failed_offsets: Vec<i64>,
    pub retries: u32,
    pub results: SyncResult,
}

impl DriveReport {
    pub fn is_complete(&self) -> bool {
        self.failed_offsets.is_empty()
    }
}

/// Plays the caller's side of the chunked sync protocol: one `count`, then
/// every window in order, retrying a failed window at the same offset.
pub struct ChunkDriver<'a, R: ?Sized, S: ?Sized> {
    coordinator: ChunkCoordinator<'a, R, S>,
    options: DriverOptions,
}

impl<'a, R, S> ChunkDriver<'a, R, S>
where
    R: RegistrationSource + ?Sized,
    S: AttendanceStore + ?Sized,
{
    pub fn new(source: &'a R, store: &'a S, options: DriverOptions) -> Self {
        Self {
            coordinator: ChunkCoordinator::new(source, store),
            options,
        }
    }

    pub async fn run(&self, event_id: i32) -> Result<DriveReport> {
        let plan = self
            .coordinator
            .count(event_id, self.options.chunk_size)
            .await?;

        info!(
            event_id,
            total_teams = plan.total_teams,
            total_chunks = plan.total_chunks,
            "Starting chunked attendance sync"
        );

        let mut report = DriveReport {
            total_teams: plan.total_teams,
            total_chunks: plan.total_chunks,
            ..DriveReport::default()
        };

        let mut window = ChunkWindow::new(plan.chunk_size, self.options.start_offset.max(0));
        while window.offset < plan.total_teams {
            let chunk_number = window.offset / window.limit + 1;

            match self.run_chunk(event_id, window, &mut report).await {
                Ok(result) => {
                    info!(
                        event_id,
                        chunk = chunk_number,
                        total_chunks = plan.total_chunks,
                        processed = result.processed_teams,
                        errors = result.error_count,
                        "Chunk {}/{} done",
                        chunk_number,
                        plan.total_chunks
                    );
                    report.results.merge(result);
                    report.completed_chunks += 1;
                }
                Err(e) if e.is_permanent() || self.options.fail_fast => return Err(e),
                Err(e) => {
                    warn!(event_id, offset = window.offset, error = %e, "Giving up on chunk");
                    report
                        .results
                        .record_error(format!("Chunk {}: {}", chunk_number, e));
                    report.failed_offsets.push(window.offset);
                }
            }

            window = window.next();
            if window.offset < plan.total_teams && !self.options.chunk_delay.is_zero() {
                tokio::time::sleep(self.options.chunk_delay).await;
            }
        }

        Ok(report)
    }

    async fn run_chunk(
        &self,
        event_id: i32,
        window: ChunkWindow,
        report: &mut DriveReport,
    ) -> Result<SyncResult> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let failure = match self.coordinator.chunk(event_id, window).await {
                Ok(result) => return Ok(result),
                Err(failure) => failure,
            };

            if matches!(
                failure.source,
                StorageError::NotFound(_) | StorageError::InvalidInput(_)
            ) {
                return Err(SyncerError::SyncError(failure));
            }

            if attempt > self.options.max_retries {
                return Err(SyncerError::ChunkFailed {
                    offset: window.offset,
                    attempts: attempt,
                    failure,
                });
            }

            warn!(
                event_id,
                offset = window.offset,
                attempt,
                error = %failure,
                "Chunk failed, retrying at the same offset"
            );
            report.retries += 1;
            tokio::time::sleep(self.options.retry_delay * attempt).await;
        }
    }
}
