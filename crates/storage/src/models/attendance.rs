use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::registration::Geography;

/// Email status stamped on newly created manager rows; the notification
/// workflow moves it forward from here.
pub const EMAIL_STATUS_PENDING: &str = "PENDING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AttendanceStatus {
    #[serde(rename = "Not Present")]
    NotPresent,
    Present,
    /// Contingent-level marker written by an on-demand contingent sync.
    Synced,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotPresent => "Not Present",
            Self::Present => "Present",
            Self::Synced => "Synced",
        }
    }
}

/// Whether an upsert created a row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl UpsertOutcome {
    pub fn from_inserted(inserted: bool) -> Self {
        if inserted { Self::Inserted } else { Self::Updated }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContingentRecord {
    pub event_id: i32,
    pub contingent_id: i32,
    pub hashcode: String,
    /// Status used when the row is created.
    pub status: AttendanceStatus,
    pub geography: Geography,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRecord {
    pub event_id: i32,
    pub team_id: i32,
    pub contingent_id: i32,
    pub hashcode: String,
    pub contest_group: Option<String>,
    pub geography: Geography,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestantRecord {
    pub event_id: i32,
    pub contestant_id: i32,
    pub contingent_id: i32,
    pub team_id: i32,
    pub hashcode: String,
    pub ic: Option<String>,
    pub contest_id: i32,
    pub contest_name: String,
    pub contest_group: Option<String>,
    pub geography: Geography,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerRecord {
    pub event_id: i32,
    pub manager_id: i32,
    pub contingent_id: i32,
    pub hashcode: String,
    pub email: Option<String>,
    pub contest_group: Option<String>,
    pub geography: Geography,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels_match_stored_values() {
        assert_eq!(AttendanceStatus::NotPresent.as_str(), "Not Present");
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::NotPresent).unwrap(),
            "\"Not Present\""
        );
        assert_eq!(serde_json::to_string(&AttendanceStatus::Synced).unwrap(), "\"Synced\"");
    }
}
