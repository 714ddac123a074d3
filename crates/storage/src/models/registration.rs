use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Registration status of a team for one event contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Accepted,
    ApprovedSpecial,
    Rejected,
}

impl RegistrationStatus {
    /// Statuses that put a team on the attendance roster.
    pub const ACCEPTED: [RegistrationStatus; 3] = [
        RegistrationStatus::Approved,
        RegistrationStatus::Accepted,
        RegistrationStatus::ApprovedSpecial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Accepted => "ACCEPTED",
            Self::ApprovedSpecial => "APPROVED_SPECIAL",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "ACCEPTED" => Some(Self::Accepted),
            "APPROVED_SPECIAL" => Some(Self::ApprovedSpecial),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        Self::ACCEPTED.contains(self)
    }

    /// Accepted statuses as bind values for `= ANY($n)` filters.
    pub fn accepted_labels() -> Vec<String> {
        Self::ACCEPTED.iter().map(|s| s.as_str().to_string()).collect()
    }
}

/// Lower and upper age bounds of a contest's target group, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgeRange {
    pub min: i32,
    pub max: i32,
}

impl AgeRange {
    pub const DEFAULT_MIN: i32 = 0;
    pub const DEFAULT_MAX: i32 = 100;

    pub fn from_bounds(min: Option<i32>, max: Option<i32>) -> Self {
        Self {
            min: min.unwrap_or(Self::DEFAULT_MIN),
            max: max.unwrap_or(Self::DEFAULT_MAX),
        }
    }

    pub fn contains(&self, age: i32) -> bool {
        age >= self.min && age <= self.max
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        Self::from_bounds(None, None)
    }
}

/// Denormalized location copied onto every attendance row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Geography {
    pub state_id: Option<i32>,
    pub zone_id: Option<i32>,
    pub state_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContingentInfo {
    pub contingent_id: i32,
    pub name: String,
    pub contingent_type: String,
    pub geography: Geography,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MemberSnapshot {
    pub contestant_id: i32,
    pub name: String,
    pub ic: Option<String>,
    /// Raw age as stored upstream; parsed during eligibility checks.
    pub age: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ManagerSnapshot {
    pub manager_id: i32,
    pub name: String,
    pub ic: Option<String>,
    pub email: Option<String>,
}

/// One accepted team with everything the reconciler needs to write its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TeamSnapshot {
    pub team_id: i32,
    pub team_name: String,
    pub status: RegistrationStatus,
    pub contingent: ContingentInfo,
    pub contest_id: i32,
    pub contest_name: String,
    /// Target group category (Kids / Teens / Youth).
    pub contest_group: Option<String>,
    pub age_range: AgeRange,
    pub members: Vec<MemberSnapshot>,
    pub managers: Vec<ManagerSnapshot>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TeamRow {
    pub team_id: i32,
    pub team_name: String,
    pub contingent_id: i32,
    pub contingent_name: String,
    pub contingent_type: String,
    pub contest_id: i32,
    pub contest_code: Option<String>,
    pub contest_name: String,
    pub status: String,
    pub contest_group: Option<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub state_id: Option<i32>,
    pub zone_id: Option<i32>,
    pub state_name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct MemberRow {
    pub team_id: i32,
    pub contestant_id: i32,
    pub name: String,
    pub ic: Option<String>,
    pub age: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ManagerRow {
    pub team_id: i32,
    pub manager_id: i32,
    pub name: String,
    pub ic: Option<String>,
    pub email: Option<String>,
}

impl From<MemberRow> for MemberSnapshot {
    fn from(row: MemberRow) -> Self {
        Self {
            contestant_id: row.contestant_id,
            name: row.name,
            ic: row.ic,
            age: row.age,
        }
    }
}

impl From<ManagerRow> for ManagerSnapshot {
    fn from(row: ManagerRow) -> Self {
        Self {
            manager_id: row.manager_id,
            name: row.name,
            ic: row.ic,
            email: row.email,
        }
    }
}

impl TeamRow {
    pub fn into_snapshot(
        self,
        members: Vec<MemberSnapshot>,
        managers: Vec<ManagerSnapshot>,
    ) -> TeamSnapshot {
        let contest_name = match self.contest_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => format!("{} {}", code, self.contest_name),
            _ => self.contest_name,
        };

        TeamSnapshot {
            team_id: self.team_id,
            team_name: self.team_name,
            // The reader only selects accepted statuses, so an unknown label
            // can only come from a newer upstream enum value.
            status: RegistrationStatus::parse(&self.status)
                .unwrap_or(RegistrationStatus::Accepted),
            contingent: ContingentInfo {
                contingent_id: self.contingent_id,
                name: self.contingent_name,
                contingent_type: self.contingent_type,
                geography: Geography {
                    state_id: self.state_id,
                    zone_id: self.zone_id,
                    state_name: Some(self.state_name),
                },
            },
            contest_id: self.contest_id,
            contest_name,
            contest_group: self.contest_group,
            age_range: AgeRange::from_bounds(self.min_age, self.max_age),
            members,
            managers,
        }
    }
}
