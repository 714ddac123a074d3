use tracing::info;

use super::eligibility::filter_eligible;
use super::reconciler::{Reconciler, SyncContext, group_by_contingent};
use super::{SyncFailure, ensure_event};
use crate::dto::sync::SyncResult;
use crate::error::StorageError;
use crate::traits::{AttendanceStore, RegistrationSource, TeamScope};

/// Reconciles every accepted team of one contingent in a single call and
/// stamps the contingent's attendance row as `Synced`.
pub async fn sync_contingent<R, S>(
    source: &R,
    store: &S,
    event_id: i32,
    contingent_id: i32,
) -> Result<SyncResult, SyncFailure>
where
    R: RegistrationSource + ?Sized,
    S: AttendanceStore + ?Sized,
{
    if contingent_id <= 0 {
        return Err(StorageError::InvalidInput("Missing contingentId parameter".to_string()).into());
    }
    ensure_event(source, event_id).await?;
    if !source.contingent_exists(contingent_id).await? {
        return Err(StorageError::not_found(format!("Contingent with ID {}", contingent_id)).into());
    }

    let teams = source
        .fetch_teams(event_id, TeamScope::Contingent(contingent_id))
        .await?;

    if teams.is_empty() {
        info!(event_id, contingent_id, "No accepted teams for contingent");
        return Ok(SyncResult::default());
    }

    let mut ctx = SyncContext::new();
    let read = teams.len();
    let eligible = filter_eligible(teams, &mut ctx.result);

    // A contingent only gets a row once one of its teams is eligible.
    let Some(contingent) = eligible.first().map(|team| team.contingent.clone()) else {
        info!(event_id, contingent_id, teams = read, "No eligible teams for contingent");
        return Ok(ctx.into_result());
    };

    info!(
        event_id,
        contingent_id,
        teams = read,
        eligible = eligible.len(),
        "Syncing contingent {}",
        contingent.name
    );

    let reconciler = Reconciler::new(store, event_id);

    let outcome = async {
        for group in group_by_contingent(&eligible) {
            reconciler.reconcile_teams(&group, &mut ctx).await?;
        }
        reconciler.mark_synced(&contingent, &mut ctx).await
    }
    .await;

    if let Err(e) = outcome {
        tracing::error!(event_id, contingent_id, error = %e, "Contingent sync failed");
        return Err(SyncFailure::new(e, ctx.into_result()));
    }

    let result = ctx.into_result();
    info!(
        event_id,
        contingent_id,
        processed = result.processed_teams,
        errors = result.error_count,
        "Contingent sync completed"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::common::ChunkWindow;
    use crate::models::AttendanceStatus;
    use crate::services::chunking::ChunkCoordinator;
    use crate::testing::{MemoryAttendance, MemoryRegistry, team, with_managers};

    fn registry() -> MemoryRegistry {
        MemoryRegistry::new(42)
            .with_team(with_managers(team(1, 10, &[Some(8), Some(9)]), &[100]))
            .with_team(with_managers(team(2, 10, &[Some(10)]), &[100, 101]))
            .with_team(with_managers(team(3, 11, &[Some(11), Some(12)]), &[102]))
            .with_contingent(12)
    }

    #[tokio::test]
    async fn test_new_contingent_is_created_synced() {
        let registry = registry();
        let store = MemoryAttendance::default();

        let result = sync_contingent(&registry, &store, 42, 10).await.unwrap();

        assert_eq!(result.new_contingents, 1);
        assert_eq!(result.new_teams, 2);
        assert_eq!(result.new_contestants, 3);
        assert_eq!(result.new_managers, 2);
        assert_eq!(result.processed_teams, 2);
        assert_eq!(store.contingent(10, 42).unwrap().status, AttendanceStatus::Synced);
        assert!(store.contingent(11, 42).is_none());
    }

    #[tokio::test]
    async fn test_existing_contingent_is_stamped_synced() {
        let registry = registry();
        let store = MemoryAttendance::default();
        ChunkCoordinator::new(&registry, &store)
            .chunk(42, ChunkWindow::new(50, 0))
            .await
            .unwrap();
        assert_eq!(store.contingent(10, 42).unwrap().status, AttendanceStatus::NotPresent);

        let result = sync_contingent(&registry, &store, 42, 10).await.unwrap();

        assert_eq!(result.created(), 0);
        assert_eq!(result.updated_contingents, 1);
        assert_eq!(store.contingent(10, 42).unwrap().status, AttendanceStatus::Synced);
    }

    #[tokio::test]
    async fn test_checked_in_contingent_stays_present() {
        let registry = registry();
        let store = MemoryAttendance::default();
        sync_contingent(&registry, &store, 42, 10).await.unwrap();
        store.check_in_contingent(10, 42);

        sync_contingent(&registry, &store, 42, 10).await.unwrap();

        assert_eq!(store.contingent(10, 42).unwrap().status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn test_matches_the_chunked_roster() {
        let registry = registry();
        let chunked = MemoryAttendance::default();
        ChunkCoordinator::new(&registry, &chunked)
            .run_all(42, 2)
            .await
            .unwrap();

        let per_contingent = MemoryAttendance::default();
        sync_contingent(&registry, &per_contingent, 42, 10).await.unwrap();
        sync_contingent(&registry, &per_contingent, 42, 11).await.unwrap();

        assert_eq!(chunked.team_ids(42), per_contingent.team_ids(42));
        assert_eq!(chunked.manager_ids(42), per_contingent.manager_ids(42));
        assert_eq!(chunked.contestant_count(42), per_contingent.contestant_count(42));
        assert_eq!(chunked.row_count(), per_contingent.row_count());
    }

    #[tokio::test]
    async fn test_second_run_only_updates() {
        let registry = registry();
        let store = MemoryAttendance::default();
        sync_contingent(&registry, &store, 42, 10).await.unwrap();

        let rerun = sync_contingent(&registry, &store, 42, 10).await.unwrap();

        assert_eq!(rerun.created(), 0);
        assert_eq!(rerun.updated_teams, 2);
        assert_eq!(rerun.updated_managers, 2);
    }

    #[tokio::test]
    async fn test_contingent_without_teams_writes_nothing() {
        let registry = registry();
        let store = MemoryAttendance::default();

        let result = sync_contingent(&registry, &store, 42, 12).await.unwrap();

        assert_eq!(result, SyncResult::default());
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_contingent_with_only_ineligible_teams_writes_nothing() {
        let registry = MemoryRegistry::new(42)
            .with_team(team(1, 10, &[Some(8)]))
            .with_team(team(2, 11, &[Some(40)]));
        let store = MemoryAttendance::default();
        ChunkCoordinator::new(&registry, &store)
            .run_all(42, 50)
            .await
            .unwrap();

        let result = sync_contingent(&registry, &store, 42, 11).await.unwrap();

        assert_eq!(result.processed_teams, 0);
        assert_eq!(result.skipped_teams, 1);
        assert_eq!(result.created(), 0);
        assert!(store.contingent(11, 42).is_none());

        let status = crate::services::sync_status::sync_status(&registry, &store, 42)
            .await
            .unwrap();
        assert!(status.is_synced);
    }

    #[tokio::test]
    async fn test_unknown_ids_do_no_work() {
        let registry = registry();
        let store = MemoryAttendance::default();

        let failure = sync_contingent(&registry, &store, 42, 99).await.unwrap_err();
        assert!(matches!(failure.source, StorageError::NotFound(_)));

        let failure = sync_contingent(&registry, &store, 7, 10).await.unwrap_err();
        assert!(matches!(failure.source, StorageError::NotFound(_)));

        let failure = sync_contingent(&registry, &store, 42, 0).await.unwrap_err();
        assert!(matches!(failure.source, StorageError::InvalidInput(_)));

        assert_eq!(store.row_count(), 0);
    }
}
