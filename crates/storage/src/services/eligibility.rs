use tracing::debug;

use crate::dto::sync::SyncResult;
use crate::models::{MemberSnapshot, RegistrationStatus, TeamSnapshot};

/// Why a team was kept off the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    NoMembers,
    MissingAge,
    AgeOutOfRange,
}

/// Every member must fall inside the target group's age range, unless the
/// registration carries the `APPROVED_SPECIAL` override.
pub fn check(team: &TeamSnapshot) -> Result<(), Ineligibility> {
    if team.status == RegistrationStatus::ApprovedSpecial {
        return Ok(());
    }

    if team.members.is_empty() {
        return Err(Ineligibility::NoMembers);
    }

    for member in &team.members {
        match parse_age(member) {
            None => return Err(Ineligibility::MissingAge),
            Some(age) if !team.age_range.contains(age) => {
                return Err(Ineligibility::AgeOutOfRange);
            }
            Some(_) => {}
        }
    }

    Ok(())
}

pub fn is_eligible(team: &TeamSnapshot) -> bool {
    check(team).is_ok()
}

/// Splits a freshly read page into the teams admitted to the roster, counting
/// reads and skips on `result`.
pub fn filter_eligible(teams: Vec<TeamSnapshot>, result: &mut SyncResult) -> Vec<TeamSnapshot> {
    result.read_teams += teams.len() as u32;

    teams
        .into_iter()
        .filter(|team| match check(team) {
            Ok(()) => true,
            Err(reason) => {
                debug!(team_id = team.team_id, ?reason, "Skipping ineligible team");
                result.record_skip(reason);
                false
            }
        })
        .collect()
}

fn parse_age(member: &MemberSnapshot) -> Option<i32> {
    member.age.as_deref()?.trim().parse().ok()
}
