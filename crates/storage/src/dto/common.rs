use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_CHUNK_SIZE: i64 = 50;
pub const MAX_CHUNK_SIZE: i64 = 500;

/// A bounded slice of the registrant population: `[offset, offset + limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct ChunkWindow {
    pub limit: i64,
    pub offset: i64,
}

impl ChunkWindow {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_chunk_size(self.limit)?;
        if self.offset < 0 {
            return Err("offset must be >= 0".to_string());
        }
        Ok(())
    }

    /// The window that follows this one.
    pub fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + self.limit,
        }
    }
}

pub fn validate_chunk_size(chunk_size: i64) -> Result<(), String> {
    if !(1..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        return Err(format!("chunkSize must be between 1 and {}", MAX_CHUNK_SIZE));
    }
    Ok(())
}

/// Work size reported by the `count` phase of a chunked sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPlan {
    pub total_teams: i64,
    pub chunk_size: i64,
    pub total_chunks: i64,
}

impl ChunkPlan {
    pub fn new(total_teams: i64, chunk_size: i64) -> Self {
        let total_chunks = if chunk_size > 0 {
            (total_teams + chunk_size - 1) / chunk_size
        } else {
            0
        };
        Self {
            total_teams,
            chunk_size,
            total_chunks,
        }
    }

    /// Every window a caller has to request to cover the event once.
    pub fn windows(&self) -> impl Iterator<Item = ChunkWindow> + '_ {
        (0..self.total_chunks).map(|i| ChunkWindow::new(self.chunk_size, i * self.chunk_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_rounds_up() {
        let plan = ChunkPlan::new(3, 2);
        assert_eq!(plan.total_chunks, 2);

        let offsets: Vec<i64> = plan.windows().map(|w| w.offset).collect();
        assert_eq!(offsets, vec![0, 2]);
    }

    #[test]
    fn test_plan_for_empty_event() {
        let plan = ChunkPlan::new(0, 50);
        assert_eq!(plan.total_chunks, 0);
        assert_eq!(plan.windows().count(), 0);
    }

    #[test]
    fn test_exact_multiple() {
        assert_eq!(ChunkPlan::new(100, 50).total_chunks, 2);
        assert_eq!(ChunkPlan::new(101, 50).total_chunks, 3);
    }

    #[test]
    fn test_window_validation() {
        assert!(ChunkWindow::new(50, 0).validate().is_ok());
        assert!(ChunkWindow::new(0, 0).validate().is_err());
        assert!(ChunkWindow::new(MAX_CHUNK_SIZE + 1, 0).validate().is_err());
        assert!(ChunkWindow::new(10, -1).validate().is_err());
        assert_eq!(ChunkWindow::new(10, 20).next(), ChunkWindow::new(10, 30));
    }

    #[test]
    fn test_plan_serializes_camel_case() {
        let json = serde_json::to_value(ChunkPlan::new(3, 2)).unwrap();
        assert_eq!(json["totalTeams"], 3);
        assert_eq!(json["totalChunks"], 2);
    }
}
