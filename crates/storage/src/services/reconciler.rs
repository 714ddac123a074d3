use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use super::hashcode::{contingent_hashcode, person_hashcode, team_hashcode};
use crate::dto::sync::{RecordKind, SyncResult};
use crate::error::Result;
use crate::models::{
    AttendanceStatus, ContestantRecord, ContingentInfo, ContingentRecord, ManagerRecord,
    ManagerSnapshot, MemberSnapshot, TeamRecord, TeamSnapshot, UpsertOutcome,
};
use crate::traits::AttendanceStore;

/// State of one reconciliation call. Never shared between calls.
#[derive(Debug, Default)]
pub struct SyncContext {
    pub result: SyncResult,
    processed_manager_ids: HashSet<i32>,
}

impl SyncContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_result(self) -> SyncResult {
        self.result
    }

    /// Returns false when the manager was already handled in this call.
    fn claim_manager(&mut self, manager_id: i32) -> bool {
        self.processed_manager_ids.insert(manager_id)
    }
}

/// Teams of one contingent, in reader order.
#[derive(Debug)]
pub struct ContingentGroup<'t> {
    pub contingent: &'t ContingentInfo,
    pub teams: Vec<&'t TeamSnapshot>,
}

/// Groups teams by contingent, keeping the order in which contingents first
/// appear so the reader's sort carries through.
pub fn group_by_contingent(teams: &[TeamSnapshot]) -> Vec<ContingentGroup<'_>> {
    let mut groups: Vec<ContingentGroup<'_>> = Vec::new();
    let mut positions: HashMap<i32, usize> = HashMap::new();

    for team in teams {
        let id = team.contingent.contingent_id;
        let position = *positions.entry(id).or_insert_with(|| {
            groups.push(ContingentGroup {
                contingent: &team.contingent,
                teams: Vec::new(),
            });
            groups.len() - 1
        });
        groups[position].teams.push(team);
    }

    groups
}

/// Writes attendance rows for already-filtered teams of one event.
pub struct Reconciler<'a, S: ?Sized> {
    store: &'a S,
    event_id: i32,
}

impl<'a, S> Reconciler<'a, S>
where
    S: AttendanceStore + ?Sized,
{
    pub fn new(store: &'a S, event_id: i32) -> Self {
        Self { store, event_id }
    }

    /// Upserts contingent, team, contestant and manager rows for `teams`.
    ///
    /// Row-level failures are recorded on the context and skipped. Any other
    /// storage error stops the call; the context keeps what was done so far.
    pub async fn reconcile(&self, teams: &[TeamSnapshot], ctx: &mut SyncContext) -> Result<()> {
        for group in group_by_contingent(teams) {
            info!(
                event_id = self.event_id,
                contingent_id = group.contingent.contingent_id,
                teams = group.teams.len(),
                "Processing contingent {}",
                group.contingent.name
            );

            let record = self.contingent_record(group.contingent, AttendanceStatus::NotPresent);
            let outcome = self.store.upsert_contingent(&record).await;
            settle(ctx, RecordKind::Contingent, record.contingent_id, outcome)?;

            self.reconcile_teams(&group, ctx).await?;
        }

        Ok(())
    }

    /// Team, contestant and manager rows of one contingent group. The
    /// contingent row itself is left to the caller.
    pub async fn reconcile_teams(
        &self,
        group: &ContingentGroup<'_>,
        ctx: &mut SyncContext,
    ) -> Result<()> {
        for team in &group.teams {
            self.reconcile_team(group.contingent, team, ctx).await?;
        }
        Ok(())
    }

    /// Creates the contingent row as `Synced`, or stamps an existing one.
    pub async fn mark_synced(
        &self,
        contingent: &ContingentInfo,
        ctx: &mut SyncContext,
    ) -> Result<()> {
        let record = self.contingent_record(contingent, AttendanceStatus::Synced);
        let outcome = self.store.mark_contingent_synced(&record).await;
        settle(ctx, RecordKind::Contingent, record.contingent_id, outcome).map(|_| ())
    }

    async fn reconcile_team(
        &self,
        contingent: &ContingentInfo,
        team: &TeamSnapshot,
        ctx: &mut SyncContext,
    ) -> Result<()> {
        debug!(team_id = team.team_id, "Processing team {}", team.team_name);

        let record = TeamRecord {
            event_id: self.event_id,
            team_id: team.team_id,
            contingent_id: contingent.contingent_id,
            hashcode: team_hashcode(team.team_id, self.event_id, contingent.contingent_id),
            contest_group: team.contest_group.clone(),
            geography: contingent.geography.clone(),
        };
        let outcome = self.store.upsert_team(&record).await;
        if !settle(ctx, RecordKind::Team, team.team_id, outcome)? {
            return Ok(());
        }

        for member in &team.members {
            let record = self.contestant_record(contingent, team, member);
            let outcome = self.store.upsert_contestant(&record).await;
            settle(ctx, RecordKind::Contestant, member.contestant_id, outcome)?;
        }

        for manager in &team.managers {
            if !ctx.claim_manager(manager.manager_id) {
                continue;
            }

            let record = self.manager_record(contingent, team, manager);
            match self.store.upsert_manager(&record).await {
                Ok(outcome) => ctx.result.tally(RecordKind::Manager, outcome),
                Err(e) => {
                    warn!(manager_id = manager.manager_id, error = %e, "Failed to upsert manager");
                    ctx.result
                        .record_error(format!("Manager {}: {}", manager.manager_id, e));
                }
            }
        }

        ctx.result.processed_teams += 1;
        Ok(())
    }

    fn contingent_record(
        &self,
        contingent: &ContingentInfo,
        status: AttendanceStatus,
    ) -> ContingentRecord {
        ContingentRecord {
            event_id: self.event_id,
            contingent_id: contingent.contingent_id,
            hashcode: contingent_hashcode(contingent.contingent_id, self.event_id),
            status,
            geography: contingent.geography.clone(),
        }
    }

    fn contestant_record(
        &self,
        contingent: &ContingentInfo,
        team: &TeamSnapshot,
        member: &MemberSnapshot,
    ) -> ContestantRecord {
        ContestantRecord {
            event_id: self.event_id,
            contestant_id: member.contestant_id,
            contingent_id: contingent.contingent_id,
            team_id: team.team_id,
            hashcode: person_hashcode(
                member.ic.as_deref(),
                member.contestant_id,
                self.event_id,
                contingent.contingent_id,
            ),
            ic: member.ic.clone(),
            contest_id: team.contest_id,
            contest_name: team.contest_name.clone(),
            contest_group: team.contest_group.clone(),
            geography: contingent.geography.clone(),
        }
    }

    fn manager_record(
        &self,
        contingent: &ContingentInfo,
        team: &TeamSnapshot,
        manager: &ManagerSnapshot,
    ) -> ManagerRecord {
        ManagerRecord {
            event_id: self.event_id,
            manager_id: manager.manager_id,
            contingent_id: contingent.contingent_id,
            hashcode: person_hashcode(
                manager.ic.as_deref(),
                manager.manager_id,
                self.event_id,
                contingent.contingent_id,
            ),
            email: manager.email.clone(),
            contest_group: team.contest_group.clone(),
            geography: contingent.geography.clone(),
        }
    }
}

/// Tallies an upsert. Returns whether the row was written; a row-level
/// failure is recorded and yields `false`.
fn settle(
    ctx: &mut SyncContext,
    kind: RecordKind,
    id: i32,
    outcome: Result<UpsertOutcome>,
) -> Result<bool> {
    match outcome {
        Ok(outcome) => {
            ctx.result.tally(kind, outcome);
            Ok(true)
        }
        Err(e) if e.is_record_level() => {
            warn!(?kind, id, error = %e, "Skipping attendance row");
            ctx.result.record_error(format!("{:?} {}: {}", kind, id, e));
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
