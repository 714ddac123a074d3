use anyhow::Context;
use axum::Router;
use storage::Database;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod features;
mod middleware;
mod state;

use config::Config;
use features::attendance;
use middleware::auth::ApiKeys;
use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        attendance::handlers::sync_chunked,
        attendance::handlers::sync_contingent,
        attendance::handlers::sync_status,
    ),
    components(
        schemas(
            storage::dto::sync::SyncChunkedRequest,
            storage::dto::sync::SyncContingentRequest,
            storage::dto::sync::ChunkCountResponse,
            storage::dto::sync::SyncResponse,
            storage::dto::sync::SyncErrorResponse,
            storage::dto::sync::SyncResult,
            storage::dto::sync::SkippedTeamsReason,
            storage::dto::sync::SyncStatus,
            storage::dto::sync::RosterCounts,
        )
    ),
    tags(
        (name = "attendance", description = "Attendance roster synchronization (operator API key required)"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("API Key")
                        .build(),
                ),
            )
        }
    }
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest(
            "/api/events/:event_id/attendance",
            attendance::routes::routes(state.clone()),
        )
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting attendance sync API");

    let config = Config::from_env().context("Failed to load API configuration")?;
    tracing::info!("Configuration loaded successfully");

    tracing::info!(
        "Connecting to database at: {}",
        config
            .database_url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    );
    let db = Database::with_max_connections(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations");
    db.run_migrations()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations completed successfully");

    let api_keys = ApiKeys::from_comma_separated(&config.api_keys);
    if api_keys.is_empty() {
        tracing::warn!("API_KEYS is empty; every sync request will be rejected");
    }

    let state = AppState { db, api_keys };

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("Starting server at http://{}", bind_address);
    tracing::info!(
        "Swagger UI available at http://{}/swagger-ui/",
        bind_address
    );

    axum::serve(listener, app(state))
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{self, StatusCode, header},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    /// The pool never connects; every request below is rejected before a
    /// query would run.
    fn test_app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/attendance")
            .unwrap();
        app(AppState {
            db: Database::from_pool(pool),
            api_keys: ApiKeys::from_comma_separated("operator-key"),
        })
    }

    async fn send(method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer operator-key");
        if body.is_some() {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        let request = request
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_non_numeric_event_id_is_a_json_400() {
        let (status, body) = send(
            "POST",
            "/api/events/abc/attendance/sync-chunked",
            Some(r#"{"action":"count"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid path parameter"));

        let (status, body) = send("GET", "/api/events/abc/attendance/sync-status", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_mistyped_body_is_a_json_400() {
        let (status, body) = send(
            "POST",
            "/api/events/42/attendance/sync-chunked",
            Some(r#"{"action":"chunk","chunkSize":"ten"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));

        let (status, _) = send(
            "POST",
            "/api/events/42/attendance/sync-contingent",
            Some("not json"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_action_is_rejected_before_any_query() {
        let (status, body) = send(
            "POST",
            "/api/events/42/attendance/sync-chunked",
            Some(r#"{"action":"purge"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action. Use \"count\" or \"chunk\".");
    }

    #[test]
    fn test_openapi_lists_attendance_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        assert!(paths.iter().any(|p| p.ends_with("/attendance/sync-chunked")));
        assert!(paths.iter().any(|p| p.ends_with("/attendance/sync-contingent")));
        assert!(paths.iter().any(|p| p.ends_with("/attendance/sync-status")));
    }
}
