//! Sync HTTP service.
//!
//! Lists targets and their top-level collections so a front-end can pick
//! what to compare.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check with crate version |
//! | `GET`  | `/targets` | `emulator` followed by every project key |
//! | `GET`  | `/collections?target=<t>` | Top-level collection ids for a target |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Missing query param: target" }
//! ```
//!
//! Missing `target` is 400, an unknown target 404, and any backend failure
//! 500 with the backend's message.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use folio_core::StoreError;

use crate::config::Config;
use crate::registry::ClientRegistry;

#[derive(Clone)]
struct AppState {
    registry: Arc<ClientRegistry>,
}

/// Start the service on `[server].bind` with a registry built from `config`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let registry = Arc::new(ClientRegistry::from_config(config.clone())?);
    serve(&bind_addr, registry).await
}

/// Start the service with an existing registry. Runs until the process ends.
pub async fn serve(bind_addr: &str, registry: Arc<ClientRegistry>) -> anyhow::Result<()> {
    let app = router(registry.clone());
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(
        bind = %bind_addr,
        provider = registry.provider_name(),
        "sync service listening on http://{}",
        bind_addr
    );
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(registry: Arc<ClientRegistry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/targets", get(handle_targets))
        .route("/collections", get(handle_collections))
        .layer(cors)
        .with_state(AppState { registry })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct TargetsResponse {
    targets: Vec<String>,
}

async fn handle_targets(State(state): State<AppState>) -> Json<TargetsResponse> {
    Json(TargetsResponse {
        targets: state.registry.targets(),
    })
}

#[derive(Deserialize)]
struct CollectionsQuery {
    target: Option<String>,
}

#[derive(Serialize)]
struct CollectionsResponse {
    target: String,
    collections: Vec<String>,
}

async fn handle_collections(
    State(state): State<AppState>,
    Query(query): Query<CollectionsQuery>,
) -> Result<Json<CollectionsResponse>, AppError> {
    let target = match query.target.filter(|t| !t.is_empty()) {
        Some(target) => target,
        None => return Err(bad_request("Missing query param: target")),
    };

    let (project, environment) = state
        .registry
        .resolve_target(&target)?
        .ok_or_else(|| not_found(format!("Unknown target: {}", target)))?;

    let adapter = state.registry.adapter(Some(&project), environment)?;
    let collections = adapter.list_collection_ids().await.map_err(|err| {
        tracing::error!(%target, "listing collections failed: {}", err);
        AppError::from(err)
    })?;

    Ok(Json(CollectionsResponse {
        target,
        collections,
    }))
}
