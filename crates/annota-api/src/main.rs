//! annota-api - HTTP API server for annota

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use annota_core::defaults::{MAX_NOTES_PER_COURSE, MAX_PAGE_SIZE, NOTES_PAGE_SIZE};
use annota_core::{
    CreateNoteRequest, Error, ListNotesRequest, Note, NoteIndex, NoteRepository, SearchBackend,
    SearchParams, TranslatedQuery, UpdateNoteRequest,
};
use annota_db::{Database, DatabaseSearch, PgNoteRepository};
use annota_search::{build_search, translate, BackendSelector, SearchConfig};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation and debugging production incidents.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    /// Per-query strategy selection over the configured engines.
    selector: Arc<BackendSelector>,
    /// Index mirror for the active engine (no-op when none is active).
    index: Arc<dyn NoteIndex>,
    /// Per-course note ceiling for a single user.
    quota: i64,
    /// Default page size for paginated responses.
    page_size: u32,
}

// =============================================================================
// CORS CONFIGURATION HELPER
// =============================================================================

/// Parse allowed origins from the comma-separated `ALLOWED_ORIGINS`
/// environment variable. Unset or empty falls back to the local LMS and
/// frontend development origins.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:18000,http://localhost:3000".to_string());

    if origins_str.trim().is_empty() {
        return vec![
            HeaderValue::from_static("http://localhost:18000"),
            HeaderValue::from_static("http://localhost:3000"),
        ];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "annota_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "annota_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("annota-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/annota".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8120".to_string())
        .parse()
        .unwrap_or(8120);

    let quota: i64 = std::env::var("MAX_NOTES_PER_COURSE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(MAX_NOTES_PER_COURSE);
    let page_size: u32 = std::env::var("DEFAULT_NOTES_PAGE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(NOTES_PAGE_SIZE);

    // An unknown SEARCH_ENGINE value is a startup error, not a fallback.
    let search_config = SearchConfig::from_env()?;

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Wire the search strategies and the index mirror
    let repository: Arc<dyn NoteRepository> = Arc::new(PgNoteRepository::new(db.pool().clone()));
    let db_strategy: Arc<dyn SearchBackend> = Arc::new(DatabaseSearch::new(db.pool().clone()));
    let (selector, index) = build_search(search_config, db_strategy, repository).await?;

    let state = AppState {
        db,
        selector: Arc::new(selector),
        index,
        quota,
        page_size,
    };

    // Build router
    let app = Router::new()
        .route("/", get(root))
        .route("/heartbeat", get(heartbeat))
        .route("/selftest", get(selftest))
        .route("/api/v1/search", get(search_annotations))
        .route(
            "/api/v1/annotations",
            get(list_annotations).post(create_annotation),
        )
        .route(
            "/api/v1/annotations/:id",
            get(get_annotation)
                .put(update_annotation)
                .delete(delete_annotation),
        )
        .route("/api/v1/retire_annotations", post(retire_annotations))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(CatchPanicLayer::new())
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static("x-annotator-user"),
                ])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600))
        })
        // Annotation payloads are small; anything bigger is a client bug
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)) // 2 MB
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// ROOT + OPERATIONAL HANDLERS
// =============================================================================

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "annota",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness of the store and the active engine. The engine is probed first,
/// so a response names the component that failed, not just "unhealthy".
async fn heartbeat(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(engine) = state.selector.probe() {
        if let Err(e) = engine.check().await {
            warn!(
                subsystem = "api",
                op = "heartbeat",
                engine = engine.name(),
                "Engine check failed: {}",
                e
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "OK": false, "check": engine.name() })),
            );
        }
    }
    if let Err(e) = state.db.search.check().await {
        warn!(subsystem = "api", op = "heartbeat", "Store check failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "OK": false, "check": "db" })),
        );
    }
    (StatusCode::OK, Json(json!({ "OK": true })))
}

/// Deeper diagnostics: the engine's info payload, a store round trip, and
/// the elapsed wall time. A failing component turns its key into
/// `{name}_error` and the response into a 500.
async fn selftest(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let mut body = serde_json::Map::new();

    if let Some(engine) = state.selector.probe() {
        match engine.info().await {
            Ok(Value::Object(payload)) => body.extend(payload),
            Ok(other) => {
                body.insert(engine.name().to_string(), other);
            }
            Err(e) => {
                let mut failure = serde_json::Map::new();
                failure.insert(format!("{}_error", engine.name()), json!(e.to_string()));
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(Value::Object(failure)),
                );
            }
        }
    }

    match state.db.search.count(&TranslatedQuery::default()).await {
        Ok(_) => {
            body.insert("db".to_string(), json!("OK"));
        }
        Err(e) => {
            let mut failure = serde_json::Map::new();
            failure.insert("db_error".to_string(), json!(e.to_string()));
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Value::Object(failure)),
            );
        }
    }

    body.insert(
        "time_elapsed".to_string(),
        json!(start.elapsed().as_secs_f64()),
    );
    (StatusCode::OK, Json(Value::Object(body)))
}

// =============================================================================
// QUERY PARSING
// =============================================================================

/// Decode one query-string component. `+` means space in form encoding, and
/// undecodable percent sequences fall back to the raw text rather than
/// failing the request.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Split a raw query string into decoded key/value pairs, preserving order
/// and repeated keys.
fn parse_query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// Build search parameters from decoded query pairs. A present-but-empty
/// `text` still counts as a text criterion; `usage_id` may repeat.
fn search_params_from(pairs: &[(String, String)]) -> SearchParams {
    let mut params = SearchParams::default();
    for (key, value) in pairs {
        match key.as_str() {
            "user" => params.user = Some(value.clone()),
            "course_id" => params.course_id = Some(value.clone()),
            "usage_id" => params.usage_ids.push(value.clone()),
            "text" => params.text = Some(value.clone()),
            "highlight" => {
                params.highlight = value.eq_ignore_ascii_case("true") || value == "1";
            }
            _ => {}
        }
    }
    params
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageParams {
    page: u32,
    page_size: u32,
}

/// Parse `page`/`page_size`, applying the configured default size and the
/// hard cap. Non-numeric or non-positive values are client errors.
fn parse_pagination(
    pairs: &[(String, String)],
    default_page_size: u32,
) -> Result<PageParams, ApiError> {
    let mut page: u32 = 1;
    let mut page_size: u32 = default_page_size;

    for (key, value) in pairs {
        match key.as_str() {
            "page" => {
                page = value
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid page: {}", value)))?;
            }
            "page_size" => {
                page_size = value
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid page_size: {}", value)))?;
            }
            _ => {}
        }
    }

    if page == 0 {
        return Err(ApiError::BadRequest("page must be >= 1".to_string()));
    }
    if page_size == 0 {
        return Err(ApiError::BadRequest("page_size must be >= 1".to_string()));
    }

    Ok(PageParams {
        page,
        page_size: page_size.min(MAX_PAGE_SIZE),
    })
}

// =============================================================================
// PAGINATION ENVELOPE
// =============================================================================

/// Rebuild the request URL (absolute-path form) with the `page` parameter
/// replaced, re-encoding every component.
fn page_link(path: &str, pairs: &[(String, String)], page: u32) -> String {
    let mut params = Vec::with_capacity(pairs.len() + 1);
    let mut replaced = false;

    for (key, value) in pairs {
        if key == "page" {
            params.push(format!("page={}", page));
            replaced = true;
        } else {
            params.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            ));
        }
    }
    if !replaced {
        params.push(format!("page={}", page));
    }

    format!("{}?{}", path, params.join("&"))
}

/// Wrap one page of rows in the pagination envelope. An empty result is one
/// empty page, not zero pages.
fn paginated_envelope(
    path: &str,
    pairs: &[(String, String)],
    page: u32,
    page_size: u32,
    total: i64,
    rows: &[Note],
) -> Value {
    let page_size_i = i64::from(page_size);
    let page_i = i64::from(page);
    let num_pages = std::cmp::max(1, (total + page_size_i - 1) / page_size_i);

    let next = if page_i < num_pages {
        json!(page_link(path, pairs, page + 1))
    } else {
        Value::Null
    };
    let previous = if page > 1 && page_i <= num_pages {
        json!(page_link(path, pairs, page - 1))
    } else {
        Value::Null
    };

    json!({
        "total": total,
        "num_pages": num_pages,
        "current_page": page,
        "start": (page_i - 1) * page_size_i,
        "next": next,
        "previous": previous,
        "rows": rows,
    })
}

fn quota_message(limit: i64) -> String {
    format!(
        "You can create up to {} notes. You must remove some notes before you can add new ones.",
        limit
    )
}

// =============================================================================
// ANNOTATION HANDLERS
// =============================================================================

/// Parse a note id from the path. Malformed ids behave like unknown ids.
fn parse_note_id(raw: &str, missing: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(missing.to_string()))
}

async fn search_annotations(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Response, ApiError> {
    let pairs = parse_query_pairs(uri.query().unwrap_or(""));
    let params = search_params_from(&pairs);
    let query = translate(&params);
    let backend = state.selector.choose(&params);

    // Usage-scoped requests return the bare rows, most recent first.
    if !params.usage_ids.is_empty() {
        let rows = backend.search_all(&query).await?;
        return Ok(Json(rows).into_response());
    }

    let paging = parse_pagination(&pairs, state.page_size)?;
    let result = backend
        .search(&query, paging.page, paging.page_size)
        .await?;

    Ok(Json(paginated_envelope(
        uri.path(),
        &pairs,
        paging.page,
        paging.page_size,
        result.total,
        &result.rows,
    ))
    .into_response())
}

async fn list_annotations(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Json<Value>, ApiError> {
    let pairs = parse_query_pairs(uri.query().unwrap_or(""));
    let params = search_params_from(&pairs);

    let (user, course_id) = match (params.user, params.course_id) {
        (Some(user), Some(course_id)) => (user, course_id),
        _ => {
            return Err(ApiError::BadRequest(
                "Both user and course_id must be provided".to_string(),
            ));
        }
    };

    let paging = parse_pagination(&pairs, state.page_size)?;
    let response = state
        .db
        .notes
        .list(ListNotesRequest {
            user_id: user,
            course_id,
            page: paging.page,
            page_size: paging.page_size,
        })
        .await?;

    Ok(Json(paginated_envelope(
        uri.path(),
        &pairs,
        paging.page,
        paging.page_size,
        response.total,
        &response.rows,
    )))
}

async fn create_annotation(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = match body.as_object() {
        Some(object) if !object.is_empty() => object,
        _ => {
            debug!(subsystem = "api", op = "create", "Rejected empty annotation payload");
            return Err(ApiError::BadRequest("No annotation payload sent".to_string()));
        }
    };
    if payload.contains_key("id") {
        debug!(
            subsystem = "api",
            op = "create",
            "Rejected annotation payload with a client-supplied id"
        );
        return Err(ApiError::BadRequest(
            "Annotations cannot be created with a custom id".to_string(),
        ));
    }

    let request: CreateNoteRequest = serde_json::from_value(body).map_err(|e| {
        debug!(subsystem = "api", op = "create", "Malformed annotation payload: {}", e);
        ApiError::BadRequest(format!("Malformed annotation payload: {}", e))
    })?;
    request.validate().map_err(|e| {
        debug!(subsystem = "api", op = "create", "Invalid annotation payload: {}", e);
        ApiError::from(e)
    })?;

    // Quota is counted in the store, never in the search index. The
    // read-then-insert race is accepted; there is no cross-request lock.
    let count = state
        .db
        .notes
        .count_for_course(&request.user, &request.course_id)
        .await?;
    if count >= state.quota {
        info!(
            subsystem = "api",
            op = "create",
            user_id = %request.user,
            course_id = %request.course_id,
            count,
            limit = state.quota,
            "Note quota reached"
        );
        return Err(ApiError::Quota { limit: state.quota });
    }

    let note = state.db.notes.create(request).await?;
    if let Err(e) = state.index.index_note(&note).await {
        warn!(
            subsystem = "api",
            op = "create",
            note_id = %note.id,
            "Failed to mirror new annotation into the search index: {}",
            e
        );
    }

    let location = format!("/api/v1/annotations/{}", note.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(note),
    ))
}

async fn get_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Note>, ApiError> {
    let id = parse_note_id(&id, "Annotation not found!")?;
    let note = state.db.notes.get(id).await.map_err(|err| match err {
        Error::NoteNotFound(_) => ApiError::NotFound("Annotation not found!".to_string()),
        other => other.into(),
    })?;
    Ok(Json(note))
}

async fn update_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Note>, ApiError> {
    const MISSING: &str = "Annotation not found! No update performed.";
    let id = parse_note_id(&id, MISSING)?;

    // Only text and tags are writable; anything else in the body (id, user,
    // course_id, timestamps) is ignored.
    let request: UpdateNoteRequest = serde_json::from_value(body).map_err(|e| {
        debug!(subsystem = "api", op = "update", note_id = %id, "Malformed update payload: {}", e);
        ApiError::BadRequest(format!("Both text and tags are required: {}", e))
    })?;

    let note = state
        .db
        .notes
        .update(id, request)
        .await
        .map_err(|err| match err {
            Error::NoteNotFound(_) => ApiError::NotFound(MISSING.to_string()),
            other => other.into(),
        })?;

    if let Err(e) = state.index.index_note(&note).await {
        warn!(
            subsystem = "api",
            op = "update",
            note_id = %note.id,
            "Failed to mirror updated annotation into the search index: {}",
            e
        );
    }
    Ok(Json(note))
}

async fn delete_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_note_id(&id, "Annotation not found!")?;
    state.db.notes.delete(id).await.map_err(|err| match err {
        Error::NoteNotFound(_) => ApiError::NotFound("Annotation not found!".to_string()),
        other => other.into(),
    })?;

    if let Err(e) = state.index.delete_note(id).await {
        warn!(
            subsystem = "api",
            op = "delete",
            note_id = %id,
            "Failed to remove annotation from the search index: {}",
            e
        );
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every annotation a user owns. Idempotent: retiring an unknown or
/// already-retired user is still a 204.
async fn retire_annotations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let user = body
        .get("user")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest("user is required".to_string()))?;

    // When the gateway forwards a caller identity, it must match the target.
    if let Some(caller) = headers
        .get("x-annotator-user")
        .and_then(|v| v.to_str().ok())
    {
        if caller != user {
            return Err(ApiError::Forbidden(
                "Cannot retire annotations for another user".to_string(),
            ));
        }
    }

    let deleted = state.db.notes.delete_for_user(user).await?;
    if let Err(e) = state.index.delete_for_user(user).await {
        warn!(
            subsystem = "api",
            op = "retire",
            user_id = %user,
            "Failed to remove retired annotations from the search index: {}",
            e
        );
    }

    info!(
        subsystem = "api",
        op = "retire",
        user_id = %user,
        deleted,
        "Retired user annotations"
    );
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Internal(Error),
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    Quota { limit: i64 },
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match &err {
            Error::NoteNotFound(_) => ApiError::NotFound("Annotation not found!".to_string()),
            Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            Error::Forbidden(msg) => ApiError::Forbidden(msg.clone()),
            Error::QuotaExceeded { limit } => ApiError::Quota { limit: *limit },
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Quota rejections and missing annotations carry the
            // user-displayable error_msg shape.
            ApiError::Quota { limit } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error_msg": quota_message(limit) })),
            )
                .into_response(),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error_msg": msg })),
            )
                .into_response(),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
