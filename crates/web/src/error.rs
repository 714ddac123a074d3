use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use storage::dto::sync::SyncErrorResponse;
use storage::error::StorageError;
use storage::services::SyncFailure;
use validator::ValidationErrors;

/// Web layer errors
#[derive(Debug)]
pub enum WebError {
    Storage(StorageError),
    /// A sync call that failed after (possibly) writing some rows.
    Sync(SyncFailure),
    Validation(ValidationErrors),
    BadRequest(String),
    Unauthorized,
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "Storage error: {}", e),
            Self::Sync(e) => write!(f, "Sync failed: {}", e),
            Self::Validation(e) => write!(f, "Validation error: {}", e),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::Unauthorized => write!(f, "Unauthorized"),
        }
    }
}

fn storage_status(error: &StorageError) -> StatusCode {
    match error {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        StorageError::ConstraintViolation(_) => StatusCode::CONFLICT,
        StorageError::Database(_) | StorageError::Migration(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn storage_body(error: &StorageError) -> serde_json::Value {
    match error {
        StorageError::NotFound(_)
        | StorageError::InvalidInput(_)
        | StorageError::ConstraintViolation(_) => {
            json!({
                "success": false,
                "error": error.to_string()
            })
        }
        StorageError::Database(_) | StorageError::Migration(_) => {
            tracing::error!("Storage error: {:?}", error);
            json!({
                "success": false,
                "error": "An internal error occurred"
            })
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            Self::Storage(e) => (storage_status(&e), Json(storage_body(&e))).into_response(),
            Self::Sync(failure) => {
                let status = storage_status(&failure.source);
                if status != StatusCode::INTERNAL_SERVER_ERROR {
                    return (status, Json(storage_body(&failure.source))).into_response();
                }

                tracing::error!("Sync failed: {:?}", failure.source);
                let body = SyncErrorResponse {
                    success: false,
                    error: format!("Failed to sync attendance data: {}", failure.source),
                    sync_results: failure.partial,
                };
                (status, Json(body)).into_response()
            }
            Self::Validation(errors) => {
                let field_errors: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, errors)| {
                        errors.iter().map(move |e| {
                            format!(
                                "{}: {}",
                                field,
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| e.code.to_string())
                            )
                        })
                    })
                    .collect();

                let body = json!({
                    "success": false,
                    "error": "Validation failed",
                    "details": field_errors
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            Self::BadRequest(msg) => {
                let body = json!({
                    "success": false,
                    "error": msg
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            Self::Unauthorized => {
                let body = json!({
                    "success": false,
                    "error": "Unauthorized. A valid operator API key is required."
                });
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
        }
    }
}

impl From<StorageError> for WebError {
    fn from(error: StorageError) -> Self {
        Self::Storage(error)
    }
}

impl From<SyncFailure> for WebError {
    fn from(failure: SyncFailure) -> Self {
        Self::Sync(failure)
    }
}

impl From<ValidationErrors> for WebError {
    fn from(error: ValidationErrors) -> Self {
        Self::Validation(error)
    }
}

impl From<PathRejection> for WebError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::dto::sync::SyncResult;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_maps_to_404() {
        let response =
            WebError::from(StorageError::not_found("Event with ID 7")).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Event with ID 7 not found");
    }

    #[tokio::test]
    async fn test_invalid_input_maps_to_400() {
        let response = WebError::from(StorageError::InvalidInput(
            "Invalid or missing eventId parameter".to_string(),
        ))
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_database_errors_are_hidden() {
        let response =
            WebError::from(StorageError::Database(sqlx::Error::PoolTimedOut)).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_sync_failure_carries_partial_results() {
        let mut partial = SyncResult::default();
        partial.new_teams = 4;
        partial.processed_teams = 4;
        let failure = SyncFailure::new(StorageError::Database(sqlx::Error::PoolTimedOut), partial);

        let response = WebError::from(failure).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["syncResults"]["newTeams"], 4);
        assert_eq!(body["syncResults"]["errorCount"], 1);
    }

    #[tokio::test]
    async fn test_sync_failure_before_any_work_keeps_its_status() {
        let failure = SyncFailure::from(StorageError::not_found("Contingent with ID 3"));

        let response = WebError::from(failure).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let response = WebError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
