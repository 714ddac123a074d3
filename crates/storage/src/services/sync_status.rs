use std::collections::HashSet;

use tracing::debug;

use super::ensure_event;
use super::eligibility::is_eligible;
use crate::dto::sync::{RosterCounts, SyncStatus};
use crate::error::Result;
use crate::models::TeamSnapshot;
use crate::traits::{AttendanceStore, RegistrationSource, TeamScope};

/// Roster sizes a complete sync of `teams` would produce.
pub fn expected_counts(teams: &[TeamSnapshot]) -> RosterCounts {
    let mut contingents = HashSet::new();
    let mut team_ids = HashSet::new();
    let mut contestants = HashSet::new();
    let mut managers = HashSet::new();

    for team in teams.iter().filter(|team| is_eligible(team)) {
        contingents.insert(team.contingent.contingent_id);
        team_ids.insert(team.team_id);
        contestants.extend(team.members.iter().map(|m| m.contestant_id));
        managers.extend(team.managers.iter().map(|m| m.manager_id));
    }

    RosterCounts {
        contingents: contingents.len() as i64,
        teams: team_ids.len() as i64,
        contestants: contestants.len() as i64,
        managers: managers.len() as i64,
    }
}

pub async fn sync_status<R, S>(source: &R, store: &S, event_id: i32) -> Result<SyncStatus>
where
    R: RegistrationSource + ?Sized,
    S: AttendanceStore + ?Sized,
{
    ensure_event(source, event_id).await?;

    let teams = source.fetch_teams(event_id, TeamScope::All).await?;
    let expected_counts = expected_counts(&teams);
    let actual_counts = store.attendance_counts(event_id).await?;
    let last_sync_date = store.last_synced_at(event_id).await?;
    let differences = expected_counts.difference(&actual_counts);

    debug!(event_id, ?expected_counts, ?actual_counts, "Computed sync status");

    Ok(SyncStatus {
        is_synced: differences.is_zero(),
        last_sync_date,
        actual_counts,
        expected_counts,
        differences,
    })
}
