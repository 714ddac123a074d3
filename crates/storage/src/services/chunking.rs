use tracing::info;

use super::eligibility::filter_eligible;
use super::reconciler::{Reconciler, SyncContext};
use super::{SyncFailure, ensure_event};
use crate::dto::common::{ChunkPlan, ChunkWindow, validate_chunk_size};
use crate::dto::sync::SyncResult;
use crate::error::{Result, StorageError};
use crate::traits::{AttendanceStore, RegistrationSource, TeamScope};

/// Drives the two-phase `count` / `chunk` protocol for one event.
///
/// A caller asks for the plan once, then requests each window in turn. Every
/// chunk is an independent unit of work; retrying one at the same offset is
/// safe because all writes are keyed upserts.
pub struct ChunkCoordinator<'a, R: ?Sized, S: ?Sized> {
    source: &'a R,
    store: &'a S,
}

impl<'a, R, S> ChunkCoordinator<'a, R, S>
where
    R: RegistrationSource + ?Sized,
    S: AttendanceStore + ?Sized,
{
    pub fn new(source: &'a R, store: &'a S) -> Self {
        Self { source, store }
    }

    /// Upper bound of the work: accepted teams, before age filtering.
    pub async fn count(&self, event_id: i32, chunk_size: i64) -> Result<ChunkPlan> {
        validate_chunk_size(chunk_size).map_err(StorageError::InvalidInput)?;
        ensure_event(self.source, event_id).await?;

        let total_teams = self.source.count_accepted_teams(event_id).await?;
        let plan = ChunkPlan::new(total_teams, chunk_size);

        info!(
            event_id,
            total_teams = plan.total_teams,
            total_chunks = plan.total_chunks,
            "Counted teams for chunked sync"
        );

        Ok(plan)
    }

    pub async fn chunk(
        &self,
        event_id: i32,
        window: ChunkWindow,
    ) -> std::result::Result<SyncResult, SyncFailure> {
        window.validate().map_err(StorageError::InvalidInput)?;
        ensure_event(self.source, event_id).await?;

        info!(
            event_id,
            offset = window.offset,
            chunk_size = window.limit,
            "Processing chunk"
        );

        let teams = self
            .source
            .fetch_teams(event_id, TeamScope::Page(window))
            .await?;

        let mut ctx = SyncContext::new();
        let eligible = filter_eligible(teams, &mut ctx.result);

        if let Err(e) = Reconciler::new(self.store, event_id)
            .reconcile(&eligible, &mut ctx)
            .await
        {
            tracing::error!(event_id, offset = window.offset, error = %e, "Chunk failed");
            return Err(SyncFailure::new(e, ctx.into_result()));
        }

        let result = ctx.into_result();
        info!(
            event_id,
            offset = window.offset,
            read = result.read_teams,
            processed = result.processed_teams,
            errors = result.error_count,
            "Chunk completed"
        );

        Ok(result)
    }

    /// Runs every chunk of the event back to back.
    pub async fn run_all(
        &self,
        event_id: i32,
        chunk_size: i64,
    ) -> std::result::Result<SyncResult, SyncFailure> {
        let plan = self.count(event_id, chunk_size).await?;
        let mut total = SyncResult::default();

        for window in plan.windows() {
            match self.chunk(event_id, window).await {
                Ok(result) => total.merge(result),
                Err(mut failure) => {
                    total.merge(failure.partial);
                    failure.partial = total;
                    return Err(failure);
                }
            }
        }

        Ok(total)
    }
}
