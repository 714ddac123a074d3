pub mod chunking;
pub mod contingent_sync;
pub mod eligibility;
pub mod hashcode;
pub mod reconciler;
pub mod sync_status;

use thiserror::Error;

use crate::dto::sync::SyncResult;
use crate::error::{Result, StorageError};
use crate::traits::RegistrationSource;

/// A sync call that failed as a whole. `partial` holds the tallies of the
/// rows written before the failure so the caller can see how far it got.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SyncFailure {
    pub source: StorageError,
    pub partial: SyncResult,
}

impl SyncFailure {
    pub fn new(source: StorageError, mut partial: SyncResult) -> Self {
        partial.record_error(format!("Sync error: {}", source));
        Self { source, partial }
    }
}

impl From<StorageError> for SyncFailure {
    fn from(source: StorageError) -> Self {
        Self {
            source,
            partial: SyncResult::default(),
        }
    }
}

pub(crate) async fn ensure_event<R>(source: &R, event_id: i32) -> Result<()>
where
    R: RegistrationSource + ?Sized,
{
    if event_id <= 0 {
        return Err(StorageError::InvalidInput(
            "Invalid or missing eventId parameter".to_string(),
        ));
    }

    if !source.event_exists(event_id).await? {
        return Err(StorageError::not_found(format!("Event with ID {}", event_id)));
    }

    Ok(())
}
