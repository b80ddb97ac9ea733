//! Dictionary HTTP Service
//!
//! ## Endpoints
//! - `GET /entries/:language/:word` - Lookup
//! - `GET /health` - Provider and cache status
//! - `GET /suggest/:word?limit=` - Headwords from the primary dictionary
//! - `GET /cache/:language/:word` - Inspect a cache entry
//! - `DELETE /cache/:language/:word` - Drop a cache entry
//! - `PUT /admin/cache-ttl` - Set the runtime cache TTL (days)

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::DictionaryError;
use super::service::DictionaryService;

pub const CACHE_HEADER: &str = "x-cache";
pub const CACHE_HIT_COUNT_HEADER: &str = "x-cache-hit-count";

// ============================================================================
// Errors
// ============================================================================

/// Error body shared by every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub title: String,
    pub message: String,
    pub resolution: String,
}

impl ErrorBody {
    fn new(title: &str, message: &str, resolution: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            resolution: resolution.to_string(),
        }
    }

    fn internal() -> Self {
        Self::new(
            "Something Went Wrong",
            "An unexpected error occurred while processing your request.",
            "Please try again later.",
        )
    }
}

/// Wraps a [`DictionaryError`] for the HTTP boundary.
#[derive(Debug)]
pub struct ApiError(DictionaryError);

impl From<DictionaryError> for ApiError {
    fn from(e: DictionaryError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            DictionaryError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                ErrorBody::new(
                    "No Definitions Found",
                    "Sorry pal, we couldn't find definitions for the word you were looking for.",
                    "You can try the search again at later time or head to the web instead.",
                ),
            ),
            DictionaryError::Config(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("Invalid Request", msg, "Check the request and try again."),
            ),
            DictionaryError::Cache(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::new(
                    "Cache Unavailable",
                    "The cache backend is not reachable right now.",
                    "Try again once the cache is back.",
                ),
            ),
            other => {
                tracing::error!(error = %other, "Unhandled error in request");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal())
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Turns a panic inside a handler into the generic 500 body.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::internal())).into_response()
}

// ============================================================================
// Router
// ============================================================================

pub fn router(service: Arc<DictionaryService>) -> Router {
    Router::new()
        .route("/entries/:language/:word", get(lookup_entry))
        .route("/health", get(health_check))
        .route("/suggest/:word", get(suggest))
        .route("/cache/:language/:word", get(cache_info).delete(delete_cache))
        .route("/admin/cache-ttl", put(set_cache_ttl))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods(cors::Any)
                .allow_headers(cors::Any),
        )
        .with_state(service)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(service: Arc<DictionaryService>, addr: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Dictionary service listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

// ============================================================================
// HTTP Handlers
// ============================================================================

async fn lookup_entry(
    State(service): State<Arc<DictionaryService>>,
    Path((language, word)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let outcome = service.lookup(&word, &language).await?;

    let mut response = Json(&outcome.response).into_response();
    let headers = response.headers_mut();
    match outcome.cache_stats {
        Some(stats) => {
            headers.insert(CACHE_HEADER, HeaderValue::from_static("HIT"));
            headers.insert(CACHE_HIT_COUNT_HEADER, HeaderValue::from(stats.hit_count));
        }
        None => {
            headers.insert(CACHE_HEADER, HeaderValue::from_static("MISS"));
        }
    }
    Ok(response)
}

async fn health_check(State(service): State<Arc<DictionaryService>>) -> impl IntoResponse {
    Json(service.health().await)
}

#[derive(Debug, Deserialize)]
struct SuggestParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SuggestResponse {
    word: String,
    suggestions: Vec<String>,
}

async fn suggest(
    State(service): State<Arc<DictionaryService>>,
    Path(word): Path<String>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let suggestions = service.suggest(&word, params.limit).await?;
    Ok(Json(SuggestResponse { word, suggestions }))
}

async fn cache_info(
    State(service): State<Arc<DictionaryService>>,
    Path((language, word)): Path<(String, String)>,
) -> Response {
    match service.cache_info(&word, &language).await {
        Some(info) => Json(info).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(
                "No Cache Entry",
                "Nothing is cached for this word.",
                "Look the word up first.",
            )),
        )
            .into_response(),
    }
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn delete_cache(
    State(service): State<Arc<DictionaryService>>,
    Path((language, word)): Path<(String, String)>,
) -> Json<DeleteResponse> {
    let deleted = service.delete_cached(&word, &language).await;
    Json(DeleteResponse { deleted })
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheTtlBody {
    days: u64,
}

async fn set_cache_ttl(
    State(service): State<Arc<DictionaryService>>,
    Json(body): Json<CacheTtlBody>,
) -> Result<Json<CacheTtlBody>, ApiError> {
    service.set_cache_ttl_days(body.days).await?;
    Ok(Json(body))
}
