use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::Result;
use crate::models::{
    ManagerRow, ManagerSnapshot, MemberRow, MemberSnapshot, RegistrationStatus, TeamRow,
    TeamSnapshot,
};
use crate::traits::{RegistrationSource, TeamScope};

/// Accepted teams of an event, one row per team, with contingent name and
/// state resolved through whichever institution the contingent belongs to.
/// The event id and status filter are bound between the two halves.
const ACCEPTED_TEAMS: &str = r#"
    WITH accepted AS (
        SELECT
            t.id AS team_id,
            t.name AS team_name,
            t.contingent_id,
            tc.id AS contest_id,
            tc.code AS contest_code,
            tc.name AS contest_name,
            MAX(ect.status) AS status,
            MAX(tg.min_age) AS min_age,
            MAX(tg.max_age) AS max_age,
            MAX(CASE
                WHEN tg.school_level = 'Primary' THEN 'Kids'
                WHEN tg.school_level = 'Secondary' THEN 'Teens'
                WHEN tg.school_level = 'Higher Education' THEN 'Youth'
                ELSE tg.school_level
            END) AS contest_group
        FROM event_contest_team ect
        INNER JOIN event_contest ec ON ect.event_contest_id = ec.id
        INNER JOIN team t ON ect.team_id = t.id
        INNER JOIN contest tc ON t.contest_id = tc.id
        LEFT JOIN contest_target_group ctg ON ctg.contest_id = ec.contest_id
        LEFT JOIN target_group tg ON tg.id = ctg.target_group_id
        WHERE ec.event_id = "#;

const ROSTER_SELECT: &str = r#"
        GROUP BY t.id, t.name, t.contingent_id, tc.id, tc.code, tc.name
    )
    SELECT
        a.team_id,
        a.team_name,
        a.contingent_id,
        COALESCE(CASE c.contingent_type
            WHEN 'SCHOOL' THEN s.name
            WHEN 'HIGHER_INSTITUTION' THEN hi.name
            WHEN 'INDEPENDENT' THEN i.name
        END, 'Unknown') AS contingent_name,
        c.contingent_type,
        a.contest_id,
        a.contest_code,
        a.contest_name,
        a.status,
        a.contest_group,
        a.min_age,
        a.max_age,
        st.id AS state_id,
        st.zone_id,
        COALESCE(st.name, 'Unknown State') AS state_name
    FROM accepted a
    INNER JOIN contingent c ON c.id = a.contingent_id
    LEFT JOIN school s ON c.school_id = s.id
    LEFT JOIN higher_institution hi ON c.higher_inst_id = hi.id
    LEFT JOIN independent i ON c.independent_id = i.id
    LEFT JOIN state st ON st.id = CASE c.contingent_type
        WHEN 'SCHOOL' THEN s.state_id
        WHEN 'HIGHER_INSTITUTION' THEN hi.state_id
        WHEN 'INDEPENDENT' THEN i.state_id
    END
    WHERE 1=1
"#;

pub struct RegistrationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RegistrationRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_team_rows(&self, event_id: i32, scope: TeamScope) -> Result<Vec<TeamRow>> {
        let mut query = QueryBuilder::<Postgres>::new(ACCEPTED_TEAMS);
        query.push_bind(event_id);
        query.push(" AND ect.status = ANY(");
        query.push_bind(RegistrationStatus::accepted_labels());
        query.push(")");
        query.push(ROSTER_SELECT);

        if let TeamScope::Contingent(contingent_id) = scope {
            query.push(" AND a.contingent_id = ");
            query.push_bind(contingent_id);
        }

        query.push(
            r#"
            ORDER BY contest_group ASC NULLS FIRST, state_name, contingent_name, a.team_name, a.team_id
            "#,
        );

        if let TeamScope::Page(window) = scope {
            query.push(" LIMIT ");
            query.push_bind(window.limit);
            query.push(" OFFSET ");
            query.push_bind(window.offset);
        }

        let rows: Vec<TeamRow> = query.build_query_as().fetch_all(self.pool).await?;

        Ok(rows)
    }

    async fn fetch_members(&self, team_ids: &[i32]) -> Result<HashMap<i32, Vec<MemberSnapshot>>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT tm.team_id, con.id AS contestant_id, con.name, con.ic, con.age::TEXT AS age
            FROM team_member tm
            INNER JOIN contestant con ON con.id = tm.contestant_id
            WHERE tm.team_id = ANY($1)
            ORDER BY tm.team_id, con.name, con.id
            "#,
        )
        .bind(team_ids)
        .fetch_all(self.pool)
        .await?;

        let mut members: HashMap<i32, Vec<MemberSnapshot>> = HashMap::new();
        for row in rows {
            members.entry(row.team_id).or_default().push(row.into());
        }
        Ok(members)
    }

    async fn fetch_managers(&self, team_ids: &[i32]) -> Result<HashMap<i32, Vec<ManagerSnapshot>>> {
        let rows = sqlx::query_as::<_, ManagerRow>(
            r#"
            SELECT mt.team_id, m.id AS manager_id, m.name, m.ic, m.email
            FROM manager_team mt
            INNER JOIN manager m ON m.id = mt.manager_id
            WHERE mt.team_id = ANY($1)
            ORDER BY mt.team_id, m.id
            "#,
        )
        .bind(team_ids)
        .fetch_all(self.pool)
        .await?;

        let mut managers: HashMap<i32, Vec<ManagerSnapshot>> = HashMap::new();
        for row in rows {
            managers.entry(row.team_id).or_default().push(row.into());
        }
        Ok(managers)
    }
}

#[async_trait]
impl RegistrationSource for RegistrationRepository<'_> {
    async fn event_exists(&self, event_id: i32) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM event WHERE id = $1)")
            .bind(event_id)
            .fetch_one(self.pool)
            .await?;

        Ok(exists)
    }

    async fn contingent_exists(&self, contingent_id: i32) -> Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM contingent WHERE id = $1)")
                .bind(contingent_id)
                .fetch_one(self.pool)
                .await?;

        Ok(exists)
    }

    async fn count_accepted_teams(&self, event_id: i32) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT t.id)
            FROM event_contest_team ect
            INNER JOIN event_contest ec ON ect.event_contest_id = ec.id
            INNER JOIN team t ON ect.team_id = t.id
            WHERE ec.event_id = $1 AND ect.status = ANY($2)
            "#,
        )
        .bind(event_id)
        .bind(RegistrationStatus::accepted_labels())
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    async fn fetch_teams(&self, event_id: i32, scope: TeamScope) -> Result<Vec<TeamSnapshot>> {
        let rows = self.fetch_team_rows(event_id, scope).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let team_ids: Vec<i32> = rows.iter().map(|row| row.team_id).collect();
        let mut members = self.fetch_members(&team_ids).await?;
        let mut managers = self.fetch_managers(&team_ids).await?;

        let teams = rows
            .into_iter()
            .map(|row| {
                let team_members = members.remove(&row.team_id).unwrap_or_default();
                let team_managers = managers.remove(&row.team_id).unwrap_or_default();
                row.into_snapshot(team_members, team_managers)
            })
            .collect();

        Ok(teams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::common::ChunkWindow;
    use crate::models::AgeRange;

    fn ids(teams: &[TeamSnapshot]) -> Vec<i32> {
        teams.iter().map(|team| team.team_id).collect()
    }

    #[sqlx::test(migrations = "./migrations", fixtures("registry"))]
    #[ignore = "requires DATABASE_URL"]
    async fn test_only_accepted_statuses_are_counted(pool: PgPool) {
        let repo = RegistrationRepository::new(&pool);

        assert_eq!(repo.count_accepted_teams(42).await.unwrap(), 4);
        assert_eq!(repo.count_accepted_teams(7).await.unwrap(), 0);
        assert!(repo.event_exists(42).await.unwrap());
        assert!(!repo.event_exists(7).await.unwrap());
        assert!(repo.contingent_exists(13).await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations", fixtures("registry"))]
    #[ignore = "requires DATABASE_URL"]
    async fn test_roster_order_is_stable_across_pages(pool: PgPool) {
        let repo = RegistrationRepository::new(&pool);

        let all = repo.fetch_teams(42, TeamScope::All).await.unwrap();
        assert_eq!(ids(&all), vec![4, 2, 1, 5]);

        let first = repo
            .fetch_teams(42, TeamScope::Page(ChunkWindow::new(2, 0)))
            .await
            .unwrap();
        let second = repo
            .fetch_teams(42, TeamScope::Page(ChunkWindow::new(2, 2)))
            .await
            .unwrap();
        assert_eq!(ids(&first), vec![4, 2]);
        assert_eq!(ids(&second), vec![1, 5]);

        let past_end = repo
            .fetch_teams(42, TeamScope::Page(ChunkWindow::new(2, 4)))
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[sqlx::test(migrations = "./migrations", fixtures("registry"))]
    #[ignore = "requires DATABASE_URL"]
    async fn test_contingent_scope_skips_pending_teams(pool: PgPool) {
        let repo = RegistrationRepository::new(&pool);

        let teams = repo.fetch_teams(42, TeamScope::Contingent(10)).await.unwrap();

        assert_eq!(ids(&teams), vec![1]);
        let team = &teams[0];
        assert_eq!(team.status, RegistrationStatus::Approved);
        assert_eq!(team.contest_name, "RB1 Robotics");
        assert_eq!(team.contest_group.as_deref(), Some("Kids"));
        assert_eq!(team.age_range, AgeRange { min: 7, max: 12 });
        assert_eq!(team.contingent.name, "SK Alpha");
        assert_eq!(team.contingent.geography.state_name.as_deref(), Some("Selangor"));
        assert_eq!(team.contingent.geography.zone_id, Some(1));

        let members: Vec<i32> = team.members.iter().map(|m| m.contestant_id).collect();
        assert_eq!(members, vec![101, 102]);
        assert_eq!(team.members[0].ic.as_deref(), Some("120304-10-5566"));
        assert_eq!(team.members[0].age.as_deref(), Some("8"));
        assert_eq!(team.managers.len(), 1);
        assert_eq!(team.managers[0].manager_id, 900);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("registry"))]
    #[ignore = "requires DATABASE_URL"]
    async fn test_missing_institution_and_state_fall_back(pool: PgPool) {
        let repo = RegistrationRepository::new(&pool);

        let all = repo.fetch_teams(42, TeamScope::All).await.unwrap();

        let independent = &all[0];
        assert_eq!(independent.team_id, 4);
        assert_eq!(independent.contingent.name, "Rakan Sains");
        assert_eq!(
            independent.contingent.geography.state_name.as_deref(),
            Some("Unknown State")
        );
        assert_eq!(independent.contest_name, "Quiz");
        assert_eq!(independent.contest_group, None);
        assert_eq!(
            independent.age_range,
            AgeRange::from_bounds(None, None)
        );
        assert_eq!(independent.status, RegistrationStatus::ApprovedSpecial);

        let orphan = &all[3];
        assert_eq!(orphan.team_id, 5);
        assert_eq!(orphan.contingent.name, "Unknown");
        assert_eq!(orphan.contingent.geography.state_id, None);
        assert_eq!(
            orphan.contingent.geography.state_name.as_deref(),
            Some("Unknown State")
        );
    }
}
