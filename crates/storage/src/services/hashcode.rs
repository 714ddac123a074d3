//! Deterministic identity fingerprints for attendance rows.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `"{natural_key}-{event_id}-{contingent_id}"`.
pub fn hashcode(natural_key: &str, event_id: i32, contingent_id: i32) -> String {
    let input = format!("{}-{}-{}", natural_key, event_id, contingent_id);
    hex::encode(Sha256::digest(input.as_bytes()))
}

pub fn contingent_hashcode(contingent_id: i32, event_id: i32) -> String {
    hashcode(&format!("contingent-{}", contingent_id), event_id, contingent_id)
}

pub fn team_hashcode(team_id: i32, event_id: i32, contingent_id: i32) -> String {
    hashcode(&format!("team-{}", team_id), event_id, contingent_id)
}

/// Contestants and managers are keyed by IC, falling back to their own id.
pub fn person_hashcode(ic: Option<&str>, id: i32, event_id: i32, contingent_id: i32) -> String {
    match ic.map(str::trim).filter(|ic| !ic.is_empty()) {
        Some(ic) => hashcode(ic, event_id, contingent_id),
        None => hashcode(&id.to_string(), event_id, contingent_id),
    }
}
