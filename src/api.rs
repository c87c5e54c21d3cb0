//! Read-only HTTP API over stored summaries
//!
//! Serves the persisted sentiment history by topic slug. The API never
//! touches the pipeline: it consumes only the store's lookup methods.
//!
//! Routes:
//! - `GET /` - hostname banner
//! - `GET /health` - liveness check
//! - `GET /sentiments/{slug}` - summary history, most recent first, with
//!   optional `count`, `before`, `after` and `id` query filters

use crate::slug::is_valid_slug;
use crate::store::{SentimentRecord, SentimentStore, StoreError};
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Longest slug the API accepts, in code points.
const MAX_SLUG_LENGTH: usize = 100;

/// Default history window when no `count` filter is given.
const DEFAULT_COUNT: u32 = 10;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn SentimentStore>,
    pub hostname: String,
}

/// API-level errors, rendered as a JSON envelope with a matching status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "not found: {}", msg),
            ApiError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("no results found".to_string()),
            StoreError::InvalidSlug(s) => {
                ApiError::BadRequest(format!("{} is not a valid URL slug", s))
            }
            StoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("❌ API error: {}", self);
        }

        let body = json!({
            "code": status.as_u16(),
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

/// Optional filters on the sentiment history endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SentimentQuery {
    /// Maximum number of records to return (default 10)
    pub count: Option<u32>,
    /// Only records fetched strictly before this RFC 3339 timestamp
    pub before: Option<DateTime<Utc>>,
    /// Only records fetched strictly after this RFC 3339 timestamp
    pub after: Option<DateTime<Utc>>,
    /// Fetch one specific record by store id
    pub id: Option<i64>,
}

/// Build the API router with all routes and middleware attached.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/sentiments/{slug}", get(sentiments_by_slug))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Serve the API until the token fires; in-flight requests finish first.
pub async fn serve(
    state: ApiState,
    listen_address: &str,
    token: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(listen_address).await?;
    log::info!("🌐 API listening on {}", listen_address);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    Ok(())
}

async fn index(State(state): State<ApiState>) -> String {
    format!("{}\n", state.hostname)
}

async fn health() -> &'static str {
    "OK\n"
}

async fn sentiments_by_slug(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
    Query(filters): Query<SentimentQuery>,
) -> Result<Json<Vec<SentimentRecord>>, ApiError> {
    if !is_valid_slug(&slug) {
        return Err(ApiError::BadRequest(format!(
            "not a valid topic format: {} is not slugified",
            slug
        )));
    }

    let length = slug.chars().count();
    if length > MAX_SLUG_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "topic too long: {} character limit (got {})",
            MAX_SLUG_LENGTH, length
        )));
    }

    // An explicit id bypasses the history window but must still belong to
    // the addressed topic.
    if let Some(id) = filters.id {
        let record = state
            .store
            .get_by_id(id)
            .await?
            .filter(|r| r.slug == slug)
            .ok_or_else(|| ApiError::NotFound(format!("no record {} for topic {}", id, slug)))?;
        return Ok(Json(vec![record]));
    }

    let count = filters.count.unwrap_or(DEFAULT_COUNT);
    let mut records = state.store.get_by_slug(&slug, count).await?;

    if let Some(before) = filters.before {
        records.retain(|r| r.fetched_at < before);
    }
    if let Some(after) = filters.after {
        records.retain(|r| r.fetched_at > after);
    }

    if records.is_empty() {
        return Err(ApiError::NotFound("no results found".to_string()));
    }

    Ok(Json(records))
}

/// Log every request with its outcome and duration.
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "🌐 {} {} -> {} ({}ms)",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );

    response
}
