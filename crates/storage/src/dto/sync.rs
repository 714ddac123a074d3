use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::common::{ChunkWindow, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::models::UpsertOutcome;
use crate::services::eligibility::Ineligibility;

/// The two phases of the chunked sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Count,
    Chunk,
}

impl SyncAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "count" => Some(Self::Count),
            "chunk" => Some(Self::Chunk),
            _ => None,
        }
    }
}

/// Request body for `POST /sync-chunked`
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncChunkedRequest {
    /// `count` or `chunk`
    pub action: String,

    #[serde(default = "default_chunk_size")]
    #[validate(range(min = 1, max = 500, message = "chunkSize must be between 1 and 500"))]
    pub chunk_size: i64,

    #[serde(default)]
    #[validate(range(min = 0, message = "offset must be >= 0"))]
    pub offset: i64,
}

fn default_chunk_size() -> i64 {
    DEFAULT_CHUNK_SIZE
}

impl SyncChunkedRequest {
    pub fn action(&self) -> Result<SyncAction, String> {
        SyncAction::parse(&self.action)
            .ok_or_else(|| "Invalid action. Use \"count\" or \"chunk\".".to_string())
    }

    pub fn window(&self) -> ChunkWindow {
        ChunkWindow::new(self.chunk_size.min(MAX_CHUNK_SIZE), self.offset)
    }
}

/// Request body for `POST /sync-contingent`
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncContingentRequest {
    #[validate(required(message = "Missing contingentId parameter"))]
    pub contingent_id: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTeamsReason {
    pub no_members: u32,
    pub missing_age: u32,
    pub age_out_of_range: u32,
}

/// Attendance row kinds written by a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Contingent,
    Team,
    Contestant,
    Manager,
}

/// Tallies of one reconciliation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Teams returned by the registration reader
    pub read_teams: u32,
    /// Teams that passed eligibility and were reconciled
    pub processed_teams: u32,
    pub skipped_teams: u32,
    pub skipped_teams_reason: SkippedTeamsReason,
    pub new_contingents: u32,
    pub updated_contingents: u32,
    pub new_teams: u32,
    pub updated_teams: u32,
    pub new_contestants: u32,
    pub updated_contestants: u32,
    pub new_managers: u32,
    pub updated_managers: u32,
    pub error_count: u32,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn tally(&mut self, kind: RecordKind, outcome: UpsertOutcome) {
        let counter = match (kind, outcome) {
            (RecordKind::Contingent, UpsertOutcome::Inserted) => &mut self.new_contingents,
            (RecordKind::Contingent, UpsertOutcome::Updated) => &mut self.updated_contingents,
            (RecordKind::Team, UpsertOutcome::Inserted) => &mut self.new_teams,
            (RecordKind::Team, UpsertOutcome::Updated) => &mut self.updated_teams,
            (RecordKind::Contestant, UpsertOutcome::Inserted) => &mut self.new_contestants,
            (RecordKind::Contestant, UpsertOutcome::Updated) => &mut self.updated_contestants,
            (RecordKind::Manager, UpsertOutcome::Inserted) => &mut self.new_managers,
            (RecordKind::Manager, UpsertOutcome::Updated) => &mut self.updated_managers,
        };
        *counter += 1;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error_count += 1;
        self.errors.push(message.into());
    }

    pub fn record_skip(&mut self, reason: Ineligibility) {
        self.skipped_teams += 1;
        match reason {
            Ineligibility::NoMembers => self.skipped_teams_reason.no_members += 1,
            Ineligibility::MissingAge => self.skipped_teams_reason.missing_age += 1,
            Ineligibility::AgeOutOfRange => self.skipped_teams_reason.age_out_of_range += 1,
        }
    }

    pub fn created(&self) -> u32 {
        self.new_contingents + self.new_teams + self.new_contestants + self.new_managers
    }

    pub fn refreshed(&self) -> u32 {
        self.updated_contingents + self.updated_teams + self.updated_contestants + self.updated_managers
    }

    /// Fold another call's tallies into this one (used when summing chunks).
    pub fn merge(&mut self, other: SyncResult) {
        self.read_teams += other.read_teams;
        self.processed_teams += other.processed_teams;
        self.skipped_teams += other.skipped_teams;
        self.skipped_teams_reason.no_members += other.skipped_teams_reason.no_members;
        self.skipped_teams_reason.missing_age += other.skipped_teams_reason.missing_age;
        self.skipped_teams_reason.age_out_of_range += other.skipped_teams_reason.age_out_of_range;
        self.new_contingents += other.new_contingents;
        self.updated_contingents += other.updated_contingents;
        self.new_teams += other.new_teams;
        self.updated_teams += other.updated_teams;
        self.new_contestants += other.new_contestants;
        self.updated_contestants += other.updated_contestants;
        self.new_managers += other.new_managers;
        self.updated_managers += other.updated_managers;
        self.error_count += other.error_count;
        self.errors.extend(other.errors);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkCountResponse {
    pub success: bool,
    pub total_teams: i64,
    pub chunk_size: i64,
    pub total_chunks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub sync_results: SyncResult,
}

/// Body of a failed sync call; carries whatever was written before the failure.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorResponse {
    pub success: bool,
    pub error: String,
    pub sync_results: SyncResult,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RosterCounts {
    pub contingents: i64,
    pub teams: i64,
    pub contestants: i64,
    pub managers: i64,
}

impl RosterCounts {
    pub fn difference(&self, actual: &RosterCounts) -> RosterCounts {
        RosterCounts {
            contingents: self.contingents - actual.contingents,
            teams: self.teams - actual.teams,
            contestants: self.contestants - actual.contestants,
            managers: self.managers - actual.managers,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == RosterCounts::default()
    }
}

/// Expected roster versus stored attendance rows for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_synced: bool,
    pub last_sync_date: Option<NaiveDateTime>,
    pub actual_counts: RosterCounts,
    pub expected_counts: RosterCounts,
    pub differences: RosterCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunked_request_defaults() {
        let req: SyncChunkedRequest = serde_json::from_str(r#"{"action":"count"}"#).unwrap();
        assert_eq!(req.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(req.offset, 0);
        assert_eq!(req.action(), Ok(SyncAction::Count));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_chunked_request_rejects_bad_input() {
        let req: SyncChunkedRequest =
            serde_json::from_str(r#"{"action":"chunk","chunkSize":0,"offset":-5}"#).unwrap();
        let errors = req.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 2);

        let req: SyncChunkedRequest = serde_json::from_str(r#"{"action":"purge"}"#).unwrap();
        assert!(req.action().is_err());
    }

    #[test]
    fn test_contingent_request_requires_id() {
        let req: SyncContingentRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_err());

        let req: SyncContingentRequest = serde_json::from_str(r#"{"contingentId":7}"#).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.contingent_id, Some(7));
    }

    #[test]
    fn test_tally_and_merge() {
        let mut first = SyncResult::default();
        first.tally(RecordKind::Team, UpsertOutcome::Inserted);
        first.tally(RecordKind::Manager, UpsertOutcome::Updated);
        first.record_skip(Ineligibility::AgeOutOfRange);

        let mut second = SyncResult::default();
        second.tally(RecordKind::Team, UpsertOutcome::Updated);
        second.record_error("Manager 9: duplicate key");

        first.merge(second);
        assert_eq!(first.new_teams, 1);
        assert_eq!(first.updated_teams, 1);
        assert_eq!(first.updated_managers, 1);
        assert_eq!(first.skipped_teams, 1);
        assert_eq!(first.skipped_teams_reason.age_out_of_range, 1);
        assert_eq!(first.error_count, 1);
        assert_eq!(first.errors, vec!["Manager 9: duplicate key".to_string()]);
        assert_eq!(first.created(), 1);
        assert_eq!(first.refreshed(), 2);
    }

    #[test]
    fn test_sync_result_wire_names() {
        let json = serde_json::to_value(SyncResult::default()).unwrap();
        assert!(json.get("newContingents").is_some());
        assert!(json.get("errorCount").is_some());
        assert!(json["skippedTeamsReason"].get("ageOutOfRange").is_some());
    }

    #[test]
    fn test_roster_difference() {
        let expected = RosterCounts { contingents: 2, teams: 3, contestants: 9, managers: 2 };
        let actual = RosterCounts { contingents: 2, teams: 2, contestants: 6, managers: 2 };
        let diff = expected.difference(&actual);
        assert_eq!(diff.teams, 1);
        assert_eq!(diff.contestants, 3);
        assert!(!diff.is_zero());
        assert!(expected.difference(&expected).is_zero());
    }
}
