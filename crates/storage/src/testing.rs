//! In-memory registration and attendance stores for exercising the sync
//! services without a database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};

use crate::dto::sync::RosterCounts;
use crate::error::{Result, StorageError};
use crate::models::{
    AgeRange, AttendanceStatus, ContestantRecord, ContingentInfo, ContingentRecord, Geography,
    ManagerRecord, ManagerSnapshot, MemberSnapshot, RegistrationStatus, TeamRecord, TeamSnapshot,
    UpsertOutcome,
};
use crate::traits::{AttendanceStore, RegistrationSource, TeamScope};

/// An approved Kids team of `contingent_id` targeting ages 7..=12, one member
/// per entry in `ages`. Contestant ids are `team_id * 100 + n`.
pub fn team(team_id: i32, contingent_id: i32, ages: &[Option<i32>]) -> TeamSnapshot {
    let members = ages
        .iter()
        .enumerate()
        .map(|(n, age)| {
            let contestant_id = team_id * 100 + n as i32;
            MemberSnapshot {
                contestant_id,
                name: format!("Contestant {}", contestant_id),
                ic: None,
                age: age.map(|a| a.to_string()),
            }
        })
        .collect();

    TeamSnapshot {
        team_id,
        team_name: format!("Team {}", team_id),
        status: RegistrationStatus::Approved,
        contingent: ContingentInfo {
            contingent_id,
            name: format!("Contingent {}", contingent_id),
            contingent_type: "SCHOOL".to_string(),
            geography: Geography {
                state_id: Some(1),
                zone_id: Some(1),
                state_name: Some("Selangor".to_string()),
            },
        },
        contest_id: 1,
        contest_name: "RB1 Robotics".to_string(),
        contest_group: Some("Kids".to_string()),
        age_range: AgeRange { min: 7, max: 12 },
        members,
        managers: Vec::new(),
    }
}

pub fn with_status(mut team: TeamSnapshot, status: RegistrationStatus) -> TeamSnapshot {
    team.status = status;
    team
}

pub fn with_managers(mut team: TeamSnapshot, manager_ids: &[i32]) -> TeamSnapshot {
    team.managers = manager_ids
        .iter()
        .map(|&manager_id| ManagerSnapshot {
            manager_id,
            name: format!("Manager {}", manager_id),
            ic: None,
            email: Some(format!("manager{}@example.com", manager_id)),
        })
        .collect();
    team
}

fn unavailable() -> StorageError {
    StorageError::Database(sqlx::Error::PoolTimedOut)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registration data for a handful of events, sorted the way the SQL reader
/// sorts it.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    primary_event: i32,
    events: HashSet<i32>,
    contingents: HashSet<i32>,
    teams: Vec<(i32, TeamSnapshot)>,
    failing_reads: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new(event_id: i32) -> Self {
        Self {
            primary_event: event_id,
            events: HashSet::from([event_id]),
            ..Self::default()
        }
    }

    /// A contingent that exists upstream but may have no teams.
    pub fn with_contingent(mut self, contingent_id: i32) -> Self {
        self.contingents.insert(contingent_id);
        self
    }

    pub fn with_team(self, team: TeamSnapshot) -> Self {
        let event_id = self.primary_event;
        self.with_event_team(event_id, team)
    }

    pub fn with_event_team(mut self, event_id: i32, team: TeamSnapshot) -> Self {
        self.events.insert(event_id);
        self.contingents.insert(team.contingent.contingent_id);
        self.teams.push((event_id, team));
        self
    }

    /// Every team read fails with a connection error.
    pub fn failing_reads(self) -> Self {
        self.fail_next_reads(usize::MAX)
    }

    /// The next `count` team reads fail with a connection error.
    pub fn fail_next_reads(self, count: usize) -> Self {
        self.failing_reads.store(count, Ordering::SeqCst);
        self
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    fn accepted(&self, event_id: i32) -> Vec<&TeamSnapshot> {
        let mut teams: Vec<&TeamSnapshot> = self
            .teams
            .iter()
            .filter(|(event, team)| *event == event_id && team.status.is_accepted())
            .map(|(_, team)| team)
            .collect();

        teams.sort_by(|a, b| {
            (
                &a.contest_group,
                &a.contingent.geography.state_name,
                &a.contingent.name,
                &a.team_name,
                a.team_id,
            )
                .cmp(&(
                    &b.contest_group,
                    &b.contingent.geography.state_name,
                    &b.contingent.name,
                    &b.team_name,
                    b.team_id,
                ))
        });
        teams
    }

    fn take_read_failure(&self) -> bool {
        self.failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RegistrationSource for MemoryRegistry {
    async fn event_exists(&self, event_id: i32) -> Result<bool> {
        Ok(self.events.contains(&event_id))
    }

    async fn contingent_exists(&self, contingent_id: i32) -> Result<bool> {
        Ok(self.contingents.contains(&contingent_id))
    }

    async fn count_accepted_teams(&self, event_id: i32) -> Result<i64> {
        Ok(self.accepted(event_id).len() as i64)
    }

    async fn fetch_teams(&self, event_id: i32, scope: TeamScope) -> Result<Vec<TeamSnapshot>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_read_failure() {
            return Err(unavailable());
        }

        let teams = self.accepted(event_id).into_iter();
        let selected: Vec<&TeamSnapshot> = match scope {
            TeamScope::Page(window) => teams
                .skip(window.offset.max(0) as usize)
                .take(window.limit.max(0) as usize)
                .collect(),
            TeamScope::Contingent(contingent_id) => teams
                .filter(|team| team.contingent.contingent_id == contingent_id)
                .collect(),
            TeamScope::All => teams.collect(),
        };

        Ok(selected.into_iter().cloned().collect())
    }
}

#[derive(Debug, Default)]
struct Tables {
    contingents: HashMap<(i32, i32), ContingentRecord>,
    teams: HashMap<(i32, i32), TeamRecord>,
    contestants: HashMap<(i32, i32), ContestantRecord>,
    managers: HashMap<(i32, i32), ManagerRecord>,
    last_write: HashMap<i32, NaiveDateTime>,
    writes: usize,
    manager_upserts: usize,
}

impl Tables {
    fn touch(&mut self, event_id: i32) {
        self.last_write.insert(event_id, Utc::now().naive_utc());
    }
}

fn rows_for_event<V>(table: &HashMap<(i32, i32), V>, event_id: i32) -> i64 {
    table.keys().filter(|(_, event)| *event == event_id).count() as i64
}

/// Attendance tables keyed by `(entity_id, event_id)`, with switches for
/// injecting row-level and connection failures.
#[derive(Debug, Default)]
pub struct MemoryAttendance {
    tables: Mutex<Tables>,
    failing_teams: HashSet<i32>,
    failing_managers: HashSet<i32>,
    write_limit: Option<usize>,
}

impl MemoryAttendance {
    /// Upserts of this team fail with a constraint violation.
    pub fn failing_team(mut self, team_id: i32) -> Self {
        self.failing_teams.insert(team_id);
        self
    }

    /// Upserts of this manager fail with a constraint violation.
    pub fn failing_manager(mut self, manager_id: i32) -> Self {
        self.failing_managers.insert(manager_id);
        self
    }

    /// After `writes` successful upserts every write fails with a connection
    /// error.
    pub fn unavailable_after(mut self, writes: usize) -> Self {
        self.write_limit = Some(writes);
        self
    }

    pub fn contingent(&self, contingent_id: i32, event_id: i32) -> Option<ContingentRecord> {
        lock(&self.tables)
            .contingents
            .get(&(contingent_id, event_id))
            .cloned()
    }

    pub fn contestant(&self, contestant_id: i32, event_id: i32) -> Option<ContestantRecord> {
        lock(&self.tables)
            .contestants
            .get(&(contestant_id, event_id))
            .cloned()
    }

    pub fn team_ids(&self, event_id: i32) -> Vec<i32> {
        let tables = lock(&self.tables);
        let mut ids: Vec<i32> = tables
            .teams
            .keys()
            .filter(|(_, event)| *event == event_id)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn manager_ids(&self, event_id: i32) -> Vec<i32> {
        let tables = lock(&self.tables);
        let mut ids: Vec<i32> = tables
            .managers
            .keys()
            .filter(|(_, event)| *event == event_id)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn contestant_count(&self, event_id: i32) -> usize {
        lock(&self.tables)
            .contestants
            .keys()
            .filter(|(_, event)| *event == event_id)
            .count()
    }

    /// Rows across all four tables and all events.
    pub fn row_count(&self) -> usize {
        let tables = lock(&self.tables);
        tables.contingents.len() + tables.teams.len() + tables.contestants.len() + tables.managers.len()
    }

    pub fn manager_upserts(&self) -> usize {
        lock(&self.tables).manager_upserts
    }

    /// Simulates the on-site check-in flow marking a contingent present.
    pub fn check_in_contingent(&self, contingent_id: i32, event_id: i32) {
        if let Some(row) = lock(&self.tables)
            .contingents
            .get_mut(&(contingent_id, event_id))
        {
            row.status = AttendanceStatus::Present;
        }
    }

    fn begin_write(&self) -> Result<MutexGuard<'_, Tables>> {
        let mut tables = lock(&self.tables);
        if self.write_limit.is_some_and(|limit| tables.writes >= limit) {
            return Err(unavailable());
        }
        tables.writes += 1;
        Ok(tables)
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendance {
    async fn upsert_contingent(&self, record: &ContingentRecord) -> Result<UpsertOutcome> {
        let mut tables = self.begin_write()?;
        tables.touch(record.event_id);

        let key = (record.contingent_id, record.event_id);
        match tables.contingents.get_mut(&key) {
            Some(row) => {
                row.geography = record.geography.clone();
                Ok(UpsertOutcome::Updated)
            }
            None => {
                tables.contingents.insert(key, record.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn mark_contingent_synced(&self, record: &ContingentRecord) -> Result<UpsertOutcome> {
        let mut tables = self.begin_write()?;
        tables.touch(record.event_id);

        let key = (record.contingent_id, record.event_id);
        match tables.contingents.get_mut(&key) {
            Some(row) => {
                row.geography = record.geography.clone();
                if row.status != AttendanceStatus::Present {
                    row.status = record.status;
                }
                Ok(UpsertOutcome::Updated)
            }
            None => {
                tables.contingents.insert(key, record.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn upsert_team(&self, record: &TeamRecord) -> Result<UpsertOutcome> {
        let mut tables = self.begin_write()?;
        if self.failing_teams.contains(&record.team_id) {
            return Err(StorageError::ConstraintViolation(format!(
                "duplicate hashcode for team {}",
                record.team_id
            )));
        }
        tables.touch(record.event_id);

        let key = (record.team_id, record.event_id);
        match tables.teams.get_mut(&key) {
            Some(row) => {
                row.contingent_id = record.contingent_id;
                row.contest_group = record.contest_group.clone();
                row.geography = record.geography.clone();
                Ok(UpsertOutcome::Updated)
            }
            None => {
                tables.teams.insert(key, record.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn upsert_contestant(&self, record: &ContestantRecord) -> Result<UpsertOutcome> {
        let mut tables = self.begin_write()?;
        tables.touch(record.event_id);

        let key = (record.contestant_id, record.event_id);
        match tables.contestants.get_mut(&key) {
            Some(row) => {
                let hashcode = row.hashcode.clone();
                *row = ContestantRecord {
                    hashcode,
                    ..record.clone()
                };
                Ok(UpsertOutcome::Updated)
            }
            None => {
                tables.contestants.insert(key, record.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn upsert_manager(&self, record: &ManagerRecord) -> Result<UpsertOutcome> {
        let mut tables = self.begin_write()?;
        tables.manager_upserts += 1;

        if self.failing_managers.contains(&record.manager_id) {
            return Err(StorageError::ConstraintViolation(format!(
                "duplicate hashcode for manager {}",
                record.manager_id
            )));
        }
        tables.touch(record.event_id);

        let key = (record.manager_id, record.event_id);
        match tables.managers.get_mut(&key) {
            Some(row) => {
                let hashcode = row.hashcode.clone();
                *row = ManagerRecord {
                    hashcode,
                    ..record.clone()
                };
                Ok(UpsertOutcome::Updated)
            }
            None => {
                tables.managers.insert(key, record.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn attendance_counts(&self, event_id: i32) -> Result<RosterCounts> {
        let tables = lock(&self.tables);

        Ok(RosterCounts {
            contingents: rows_for_event(&tables.contingents, event_id),
            teams: rows_for_event(&tables.teams, event_id),
            contestants: rows_for_event(&tables.contestants, event_id),
            managers: rows_for_event(&tables.managers, event_id),
        })
    }

    async fn last_synced_at(&self, event_id: i32) -> Result<Option<NaiveDateTime>> {
        Ok(lock(&self.tables).last_write.get(&event_id).copied())
    }
}
