use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::dto::common::ChunkWindow;
use crate::dto::sync::RosterCounts;
use crate::error::Result;
use crate::models::{
    ContestantRecord, ContingentRecord, ManagerRecord, TeamRecord, TeamSnapshot, UpsertOutcome,
};

/// Which accepted teams of an event to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamScope {
    /// One page of the event in roster order.
    Page(ChunkWindow),
    /// Every team of one contingent.
    Contingent(i32),
    /// The whole event.
    All,
}

/// Read-only view of the registration data.
#[async_trait]
pub trait RegistrationSource: Send + Sync {
    async fn event_exists(&self, event_id: i32) -> Result<bool>;

    async fn contingent_exists(&self, contingent_id: i32) -> Result<bool>;

    /// Distinct teams with an accepted status. No age or membership filtering.
    async fn count_accepted_teams(&self, event_id: i32) -> Result<i64>;

    async fn fetch_teams(&self, event_id: i32, scope: TeamScope) -> Result<Vec<TeamSnapshot>>;
}

/// Write side of the attendance roster. Every upsert is keyed by
/// `(entity_id, event_id)` and reports whether it created the row.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Creates the row with the record's status, or refreshes geography only.
    async fn upsert_contingent(&self, record: &ContingentRecord) -> Result<UpsertOutcome>;

    /// Like [`AttendanceStore::upsert_contingent`] but also moves an existing
    /// row to the record's status unless it is already `Present`.
    async fn mark_contingent_synced(&self, record: &ContingentRecord) -> Result<UpsertOutcome>;

    async fn upsert_team(&self, record: &TeamRecord) -> Result<UpsertOutcome>;

    async fn upsert_contestant(&self, record: &ContestantRecord) -> Result<UpsertOutcome>;

    /// New rows start with email status `PENDING`; updates leave it alone.
    async fn upsert_manager(&self, record: &ManagerRecord) -> Result<UpsertOutcome>;

    async fn attendance_counts(&self, event_id: i32) -> Result<RosterCounts>;

    async fn last_synced_at(&self, event_id: i32) -> Result<Option<NaiveDateTime>>;
}
