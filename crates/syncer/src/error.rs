use storage::error::StorageError;
use storage::services::SyncFailure;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncerError>;

#[derive(Error, Debug)]
pub enum SyncerError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Sync error: {0}")]
    SyncError(#[from] SyncFailure),

    #[error("Chunk at offset {offset} failed after {attempts} attempts: {failure}")]
    ChunkFailed {
        offset: i64,
        attempts: u32,
        failure: SyncFailure,
    },
}

impl SyncerError {
    /// Bad arguments or a missing event: retrying cannot help.
    pub fn is_permanent(&self) -> bool {
        let source = match self {
            Self::StorageError(e) => e,
            Self::SyncError(failure) | Self::ChunkFailed { failure, .. } => &failure.source,
        };
        matches!(
            source,
            StorageError::NotFound(_) | StorageError::InvalidInput(_)
        )
    }
}
