use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    response::{IntoResponse, Response},
};
use storage::{
    Database,
    dto::sync::{
        ChunkCountResponse, SyncAction, SyncChunkedRequest, SyncContingentRequest,
        SyncErrorResponse, SyncResponse, SyncStatus,
    },
    error::StorageError,
};
use validator::Validate;

use crate::error::WebError;

use super::services;

#[utoipa::path(
    post,
    path = "/api/events/{event_id}/attendance/sync-chunked",
    params(
        ("event_id" = i32, Path, description = "Event ID")
    ),
    request_body = SyncChunkedRequest,
    responses(
        (status = 200, description = "`count` answers with a ChunkCountResponse, `chunk` with the window's tallies", body = SyncResponse),
        (status = 400, description = "Malformed event id or body, invalid action, chunk size or offset"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Event not found"),
        (status = 500, description = "Chunk failed; partial tallies included", body = SyncErrorResponse)
    ),
    tag = "attendance",
    security(("bearer_auth" = []))
)]
pub async fn sync_chunked(
    State(db): State<Database>,
    event_id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<SyncChunkedRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let Path(event_id) = event_id?;
    let Json(payload) = payload?;
    let action = payload.action().map_err(WebError::BadRequest)?;
    payload.validate()?;

    match action {
        SyncAction::Count => {
            let plan = services::count_chunks(db.pool(), event_id, payload.chunk_size).await?;

            Ok(Json(ChunkCountResponse {
                success: true,
                total_teams: plan.total_teams,
                chunk_size: plan.chunk_size,
                total_chunks: plan.total_chunks,
            })
            .into_response())
        }
        SyncAction::Chunk => {
            let result = services::sync_chunk(db.pool(), event_id, payload.window()).await?;

            Ok(Json(SyncResponse {
                success: true,
                message: services::chunk_message(&result),
                sync_results: result,
            })
            .into_response())
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/events/{event_id}/attendance/sync-contingent",
    params(
        ("event_id" = i32, Path, description = "Event ID")
    ),
    request_body = SyncContingentRequest,
    responses(
        (status = 200, description = "Contingent reconciled", body = SyncResponse),
        (status = 400, description = "Malformed event id or body, or missing contingentId"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Event or contingent not found"),
        (status = 500, description = "Sync failed; partial tallies included", body = SyncErrorResponse)
    ),
    tag = "attendance",
    security(("bearer_auth" = []))
)]
pub async fn sync_contingent(
    State(db): State<Database>,
    event_id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<SyncContingentRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let Path(event_id) = event_id?;
    let Json(payload) = payload?;
    payload.validate()?;
    let contingent_id = payload.contingent_id.ok_or_else(|| {
        WebError::Storage(StorageError::InvalidInput(
            "Missing contingentId parameter".to_string(),
        ))
    })?;

    let result = services::sync_contingent(db.pool(), event_id, contingent_id).await?;

    Ok(Json(SyncResponse {
        success: true,
        message: services::contingent_message(contingent_id, &result),
        sync_results: result,
    })
    .into_response())
}

#[utoipa::path(
    get,
    path = "/api/events/{event_id}/attendance/sync-status",
    params(
        ("event_id" = i32, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "Expected roster versus stored attendance rows", body = SyncStatus),
        (status = 400, description = "Malformed event id"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Event not found")
    ),
    tag = "attendance",
    security(("bearer_auth" = []))
)]
pub async fn sync_status(
    State(db): State<Database>,
    event_id: Result<Path<i32>, PathRejection>,
) -> Result<Response, WebError> {
    let Path(event_id) = event_id?;
    let status = services::sync_status(db.pool(), event_id).await?;

    Ok(Json(status).into_response())
}
