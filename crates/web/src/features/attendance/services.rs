use sqlx::PgPool;
use storage::{
    dto::common::{ChunkPlan, ChunkWindow},
    dto::sync::{SyncResult, SyncStatus},
    error::Result,
    repository::{AttendanceRepository, RegistrationRepository},
    services::{SyncFailure, chunking::ChunkCoordinator, contingent_sync, sync_status},
};

/// Size the chunked sync of an event
pub async fn count_chunks(pool: &PgPool, event_id: i32, chunk_size: i64) -> Result<ChunkPlan> {
    let source = RegistrationRepository::new(pool);
    let store = AttendanceRepository::new(pool);

    ChunkCoordinator::new(&source, &store)
        .count(event_id, chunk_size)
        .await
}

/// Reconcile one window of an event's accepted teams
pub async fn sync_chunk(
    pool: &PgPool,
    event_id: i32,
    window: ChunkWindow,
) -> std::result::Result<SyncResult, SyncFailure> {
    let source = RegistrationRepository::new(pool);
    let store = AttendanceRepository::new(pool);

    ChunkCoordinator::new(&source, &store)
        .chunk(event_id, window)
        .await
}

/// Reconcile every team of one contingent immediately
pub async fn sync_contingent(
    pool: &PgPool,
    event_id: i32,
    contingent_id: i32,
) -> std::result::Result<SyncResult, SyncFailure> {
    let source = RegistrationRepository::new(pool);
    let store = AttendanceRepository::new(pool);

    contingent_sync::sync_contingent(&source, &store, event_id, contingent_id).await
}

pub async fn sync_status(pool: &PgPool, event_id: i32) -> Result<SyncStatus> {
    let source = RegistrationRepository::new(pool);
    let store = AttendanceRepository::new(pool);

    sync_status::sync_status(&source, &store, event_id).await
}

pub fn chunk_message(result: &SyncResult) -> String {
    if result.read_teams == 0 {
        return "No teams to process in this chunk".to_string();
    }

    with_error_suffix(
        format!("Chunk processed: {} teams", result.processed_teams),
        result.error_count,
    )
}

pub fn contingent_message(contingent_id: i32, result: &SyncResult) -> String {
    if result.read_teams == 0 {
        return "No teams found for this contingent in the event".to_string();
    }

    with_error_suffix(
        format!(
            "Attendance sync completed for contingent {}: {} teams",
            contingent_id, result.processed_teams
        ),
        result.error_count,
    )
}

fn with_error_suffix(message: String, error_count: u32) -> String {
    if error_count == 0 {
        message
    } else {
        format!("{} with {} errors", message, error_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_message() {
        assert_eq!(chunk_message(&SyncResult::default()), "No teams to process in this chunk");

        let mut result = SyncResult {
            read_teams: 5,
            processed_teams: 4,
            ..SyncResult::default()
        };
        assert_eq!(chunk_message(&result), "Chunk processed: 4 teams");

        result.record_error("Manager 3: duplicate key");
        assert_eq!(chunk_message(&result), "Chunk processed: 4 teams with 1 errors");
    }

    #[test]
    fn test_contingent_message() {
        let result = SyncResult {
            read_teams: 2,
            processed_teams: 2,
            ..SyncResult::default()
        };
        assert_eq!(
            contingent_message(9, &result),
            "Attendance sync completed for contingent 9: 2 teams"
        );
        assert_eq!(
            contingent_message(9, &SyncResult::default()),
            "No teams found for this contingent in the event"
        );
    }
}
