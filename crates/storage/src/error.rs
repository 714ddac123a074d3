use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StorageError::NotFound(what.into())
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(sqlx::Error::Database(e))
                if e.code().as_deref() == Some("23505")
        )
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(sqlx::Error::Database(e))
                if e.code().as_deref() == Some("23503")
        )
    }

    /// Errors scoped to a single row. The sync loop records these and moves on;
    /// anything else aborts the current call.
    pub fn is_record_level(&self) -> bool {
        match self {
            StorageError::ConstraintViolation(_) => true,
            // 23xxx: integrity constraint violations (unique, fk, not-null, check)
            StorageError::Database(sqlx::Error::Database(e)) => e
                .code()
                .as_deref()
                .is_some_and(|code| code.starts_with("23")),
            _ => false,
        }
    }
}
