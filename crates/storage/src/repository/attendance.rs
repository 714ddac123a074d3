use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;

use crate::dto::sync::RosterCounts;
use crate::error::Result;
use crate::models::{
    ContestantRecord, ContingentRecord, EMAIL_STATUS_PENDING, ManagerRecord, TeamRecord,
    UpsertOutcome,
};
use crate::traits::AttendanceStore;

pub struct AttendanceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AttendanceRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for AttendanceRepository<'_> {
    async fn upsert_contingent(&self, record: &ContingentRecord) -> Result<UpsertOutcome> {
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO attendance_contingent
                (hashcode, contingent_id, event_id, attendance_status, state_id, zone_id, state)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (contingent_id, event_id)
            DO UPDATE SET
                state_id = EXCLUDED.state_id,
                zone_id = EXCLUDED.zone_id,
                state = EXCLUDED.state,
                updated_at = CURRENT_TIMESTAMP
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.hashcode)
        .bind(record.contingent_id)
        .bind(record.event_id)
        .bind(record.status.as_str())
        .bind(record.geography.state_id)
        .bind(record.geography.zone_id)
        .bind(&record.geography.state_name)
        .fetch_one(self.pool)
        .await?;

        Ok(UpsertOutcome::from_inserted(inserted))
    }

    async fn mark_contingent_synced(&self, record: &ContingentRecord) -> Result<UpsertOutcome> {
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO attendance_contingent
                (hashcode, contingent_id, event_id, attendance_status, state_id, zone_id, state)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (contingent_id, event_id)
            DO UPDATE SET
                attendance_status = CASE
                    WHEN attendance_contingent.attendance_status = 'Present'
                        THEN attendance_contingent.attendance_status
                    ELSE EXCLUDED.attendance_status
                END,
                state_id = EXCLUDED.state_id,
                zone_id = EXCLUDED.zone_id,
                state = EXCLUDED.state,
                updated_at = CURRENT_TIMESTAMP
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.hashcode)
        .bind(record.contingent_id)
        .bind(record.event_id)
        .bind(record.status.as_str())
        .bind(record.geography.state_id)
        .bind(record.geography.zone_id)
        .bind(&record.geography.state_name)
        .fetch_one(self.pool)
        .await?;

        Ok(UpsertOutcome::from_inserted(inserted))
    }

    async fn upsert_team(&self, record: &TeamRecord) -> Result<UpsertOutcome> {
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO attendance_team
                (hashcode, contingent_id, team_id, event_id, state_id, zone_id, state, contest_group)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (team_id, event_id)
            DO UPDATE SET
                contingent_id = EXCLUDED.contingent_id,
                state_id = EXCLUDED.state_id,
                zone_id = EXCLUDED.zone_id,
                state = EXCLUDED.state,
                contest_group = EXCLUDED.contest_group,
                updated_at = CURRENT_TIMESTAMP
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.hashcode)
        .bind(record.contingent_id)
        .bind(record.team_id)
        .bind(record.event_id)
        .bind(record.geography.state_id)
        .bind(record.geography.zone_id)
        .bind(&record.geography.state_name)
        .bind(&record.contest_group)
        .fetch_one(self.pool)
        .await?;

        Ok(UpsertOutcome::from_inserted(inserted))
    }

    async fn upsert_contestant(&self, record: &ContestantRecord) -> Result<UpsertOutcome> {
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO attendance_contestant
                (hashcode, contingent_id, team_id, contestant_id, event_id, ic,
                 state_id, zone_id, state, contest_group, contest_id, contest_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (contestant_id, event_id)
            DO UPDATE SET
                contingent_id = EXCLUDED.contingent_id,
                team_id = EXCLUDED.team_id,
                ic = EXCLUDED.ic,
                state_id = EXCLUDED.state_id,
                zone_id = EXCLUDED.zone_id,
                state = EXCLUDED.state,
                contest_group = EXCLUDED.contest_group,
                contest_id = EXCLUDED.contest_id,
                contest_name = EXCLUDED.contest_name,
                updated_at = CURRENT_TIMESTAMP
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.hashcode)
        .bind(record.contingent_id)
        .bind(record.team_id)
        .bind(record.contestant_id)
        .bind(record.event_id)
        .bind(&record.ic)
        .bind(record.geography.state_id)
        .bind(record.geography.zone_id)
        .bind(&record.geography.state_name)
        .bind(&record.contest_group)
        .bind(record.contest_id)
        .bind(&record.contest_name)
        .fetch_one(self.pool)
        .await?;

        Ok(UpsertOutcome::from_inserted(inserted))
    }

    async fn upsert_manager(&self, record: &ManagerRecord) -> Result<UpsertOutcome> {
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO attendance_manager
                (hashcode, contingent_id, manager_id, event_id, state_id, zone_id, state,
                 contest_group, email, email_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (manager_id, event_id)
            DO UPDATE SET
                contingent_id = EXCLUDED.contingent_id,
                state_id = EXCLUDED.state_id,
                zone_id = EXCLUDED.zone_id,
                state = EXCLUDED.state,
                contest_group = EXCLUDED.contest_group,
                email = EXCLUDED.email,
                updated_at = CURRENT_TIMESTAMP
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.hashcode)
        .bind(record.contingent_id)
        .bind(record.manager_id)
        .bind(record.event_id)
        .bind(record.geography.state_id)
        .bind(record.geography.zone_id)
        .bind(&record.geography.state_name)
        .bind(&record.contest_group)
        .bind(&record.email)
        .bind(EMAIL_STATUS_PENDING)
        .fetch_one(self.pool)
        .await?;

        Ok(UpsertOutcome::from_inserted(inserted))
    }

    async fn attendance_counts(&self, event_id: i32) -> Result<RosterCounts> {
        let counts = sqlx::query_as::<_, RosterCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM attendance_contingent WHERE event_id = $1) AS contingents,
                (SELECT COUNT(*) FROM attendance_team WHERE event_id = $1) AS teams,
                (SELECT COUNT(*) FROM attendance_contestant WHERE event_id = $1) AS contestants,
                (SELECT COUNT(*) FROM attendance_manager WHERE event_id = $1) AS managers
            "#,
        )
        .bind(event_id)
        .fetch_one(self.pool)
        .await?;

        Ok(counts)
    }

    async fn last_synced_at(&self, event_id: i32) -> Result<Option<NaiveDateTime>> {
        let last = sqlx::query_scalar::<_, Option<NaiveDateTime>>(
            r#"
            SELECT MAX(updated_at) FROM (
                SELECT updated_at FROM attendance_contingent WHERE event_id = $1
                UNION ALL
                SELECT updated_at FROM attendance_team WHERE event_id = $1
                UNION ALL
                SELECT updated_at FROM attendance_contestant WHERE event_id = $1
                UNION ALL
                SELECT updated_at FROM attendance_manager WHERE event_id = $1
            ) AS stamps
            "#,
        )
        .bind(event_id)
        .fetch_one(self.pool)
        .await?;

        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, Geography};
    use crate::repository::RegistrationRepository;
    use crate::services::chunking::ChunkCoordinator;
    use crate::services::contingent_sync::sync_contingent;
    use crate::services::hashcode::contingent_hashcode;
    use crate::services::sync_status::sync_status;

    fn contingent(contingent_id: i32, status: AttendanceStatus, state: &str) -> ContingentRecord {
        ContingentRecord {
            event_id: 42,
            contingent_id,
            hashcode: contingent_hashcode(contingent_id, 42),
            status,
            geography: Geography {
                state_id: Some(1),
                zone_id: Some(1),
                state_name: Some(state.to_string()),
            },
        }
    }

    async fn contingent_row(pool: &PgPool, contingent_id: i32) -> (String, Option<String>) {
        sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT attendance_status, state FROM attendance_contingent WHERE contingent_id = $1 AND event_id = 42",
        )
        .bind(contingent_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_upsert_tells_inserts_from_updates(pool: PgPool) {
        let repo = AttendanceRepository::new(&pool);

        let first = repo
            .upsert_contingent(&contingent(10, AttendanceStatus::NotPresent, "Selangor"))
            .await
            .unwrap();
        let second = repo
            .upsert_contingent(&contingent(10, AttendanceStatus::Synced, "Johor"))
            .await
            .unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Updated);
        let (status, state) = contingent_row(&pool, 10).await;
        assert_eq!(status, "Not Present");
        assert_eq!(state.as_deref(), Some("Johor"));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_mark_synced_keeps_present(pool: PgPool) {
        let repo = AttendanceRepository::new(&pool);

        let created = repo
            .mark_contingent_synced(&contingent(10, AttendanceStatus::Synced, "Selangor"))
            .await
            .unwrap();
        assert_eq!(created, UpsertOutcome::Inserted);
        assert_eq!(contingent_row(&pool, 10).await.0, "Synced");

        repo.upsert_contingent(&contingent(11, AttendanceStatus::NotPresent, "Selangor"))
            .await
            .unwrap();
        let stamped = repo
            .mark_contingent_synced(&contingent(11, AttendanceStatus::Synced, "Selangor"))
            .await
            .unwrap();
        assert_eq!(stamped, UpsertOutcome::Updated);
        assert_eq!(contingent_row(&pool, 11).await.0, "Synced");

        sqlx::query("UPDATE attendance_contingent SET attendance_status = 'Present' WHERE contingent_id = 10")
            .execute(&pool)
            .await
            .unwrap();
        repo.mark_contingent_synced(&contingent(10, AttendanceStatus::Synced, "Johor"))
            .await
            .unwrap();
        assert_eq!(
            contingent_row(&pool, 10).await,
            ("Present".to_string(), Some("Johor".to_string()))
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_empty_event_has_no_rows(pool: PgPool) {
        let repo = AttendanceRepository::new(&pool);

        assert_eq!(repo.attendance_counts(42).await.unwrap(), RosterCounts::default());
        assert_eq!(repo.last_synced_at(42).await.unwrap(), None);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("registry"))]
    #[ignore = "requires DATABASE_URL"]
    async fn test_full_sync_against_postgres(pool: PgPool) {
        let source = RegistrationRepository::new(&pool);
        let store = AttendanceRepository::new(&pool);
        let coordinator = ChunkCoordinator::new(&source, &store);

        let first = coordinator.run_all(42, 3).await.unwrap();
        assert_eq!(first.processed_teams, 4);
        assert_eq!(first.new_contingents, 4);
        assert_eq!(first.new_teams, 4);
        assert_eq!(first.new_contestants, 5);
        assert_eq!(first.new_managers, 2);
        assert_eq!(first.error_count, 0);

        let second = coordinator.run_all(42, 3).await.unwrap();
        assert_eq!(second.created(), 0);
        assert_eq!(second.updated_teams, 4);
        assert_eq!(second.updated_contestants, 5);

        let counts = store.attendance_counts(42).await.unwrap();
        assert_eq!(
            counts,
            RosterCounts {
                contingents: 4,
                teams: 4,
                contestants: 5,
                managers: 2,
            }
        );
        assert!(store.last_synced_at(42).await.unwrap().is_some());
        assert!(sync_status(&source, &store, 42).await.unwrap().is_synced);

        let email_status = sqlx::query_scalar::<_, String>(
            "SELECT email_status FROM attendance_manager WHERE manager_id = 900",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(email_status, EMAIL_STATUS_PENDING);

        let result = sync_contingent(&source, &store, 42, 10).await.unwrap();
        assert_eq!(result.updated_contingents, 1);
        assert_eq!(contingent_row(&pool, 10).await.0, "Synced");
    }
}
