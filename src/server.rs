//! HTTP API server.
//!
//! Thin axum handlers over the [`CatalogService`] and [`Authenticator`].
//! All catalog semantics (cache bypass, invalidation, enrichment) live
//! in the service; handlers only translate HTTP to service calls.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/auth/register` | Create an account, returns a token |
//! | `POST` | `/auth/login` | Verify credentials, returns a token |
//! | `GET`  | `/auth/me` | Resolve the bearer token to an account |
//! | `POST` | `/documents` | Publish a document (academy only) |
//! | `GET`  | `/documents` | Search the catalog |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one envelope:
//!
//! ```json
//! { "error": { "code": "forbidden", "message": "only academy accounts can publish documents" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401),
//! `forbidden` (403), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based clients.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::Authenticator;
use crate::cache::MemoryCache;
use crate::catalog::{CatalogError, CatalogService, PublishRequest};
use crate::config::Config;
use crate::db;
use crate::models::{Account, Caller, ResultSource, Role, SearchHit, SearchResponse};
use crate::store::SqliteCatalog;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    catalog: Arc<CatalogService>,
    auth: Arc<Authenticator>,
}

/// Starts the HTTP server.
///
/// Opens the SQLite pool, wires the catalog service to a fresh
/// process-wide search cache, and serves until the process terminates.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteCatalog::new(pool));
    let cache = Arc::new(MemoryCache::new());
    let catalog = Arc::new(CatalogService::new(store, cache, &config.cache));
    let auth = Arc::new(Authenticator::new(&config.auth));

    let state = AppState { catalog, auth };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/auth/register", post(handle_register))
        .route("/auth/login", post(handle_login))
        .route("/auth/me", get(handle_me))
        .route("/documents", post(handle_publish).get(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    tracing::info!(bind = %bind_addr, "catalog API listening");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable
/// message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unauthorized(message) => unauthorized(message),
            CatalogError::Forbidden(message) => AppError {
                status: StatusCode::FORBIDDEN,
                code: "forbidden".to_string(),
                message,
            },
            CatalogError::InvalidInput(message) => bad_request(message),
            CatalogError::Store(source) => {
                tracing::error!(error = %source, "store failure");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal".to_string(),
                    message: "internal server error".to_string(),
                }
            }
        }
    }
}

// ============ Bearer auth ============

/// Pull the bearer token from the Authorization header and resolve it
/// to a caller.
async fn require_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| unauthorized("missing bearer token"))?;

    let caller = state
        .auth
        .verify(state.catalog.store().as_ref(), token)
        .await?;
    Ok(caller)
}

// ============ Account views ============

/// Public account representation (no credential material).
#[derive(Serialize)]
struct AccountView {
    id: String,
    display_name: String,
    email: String,
    role: Role,
}

impl From<&Account> for AccountView {
    fn from(a: &Account) -> Self {
        AccountView {
            id: a.id.clone(),
            display_name: a.display_name.clone(),
            email: a.email.clone(),
            role: a.role,
        }
    }
}

// ============ POST /auth/register ============

#[derive(Deserialize)]
struct RegisterBody {
    display_name: String,
    email: String,
    password: String,
    /// `"ACADEMY"` or `"STUDENT"`.
    role: String,
}

#[derive(Serialize)]
struct AuthResponse {
    token: String,
    account: AccountView,
}

async fn handle_register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let role = Role::parse(&body.role)
        .ok_or_else(|| bad_request(format!("unknown role: {}", body.role)))?;

    let account = state
        .auth
        .register(
            state.catalog.store().as_ref(),
            &body.display_name,
            &body.email,
            &body.password,
            role,
        )
        .await?;

    let token = state.auth.mint_token(&account.id);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            account: AccountView::from(&account),
        }),
    ))
}

// ============ POST /auth/login ============

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn handle_login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<AuthResponse>, AppError> {
    let (token, account) = state
        .auth
        .login(state.catalog.store().as_ref(), &body.email, &body.password)
        .await?;

    Ok(Json(AuthResponse {
        token,
        account: AccountView::from(&account),
    }))
}

// ============ GET /auth/me ============

#[derive(Serialize)]
struct MeResponse {
    id: String,
    display_name: String,
    email: String,
    role: Role,
}

async fn handle_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AppError> {
    let caller = require_caller(&state, &headers).await?;
    Ok(Json(MeResponse {
        id: caller.id,
        display_name: caller.display_name,
        email: caller.email,
        role: caller.role,
    }))
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct PublishBody {
    subject: String,
    class_name: String,
    school: String,
    file_url: String,
}

async fn handle_publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PublishBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let caller = require_caller(&state, &headers).await?;

    let document = state
        .catalog
        .publish(
            &caller,
            PublishRequest {
                subject: body.subject,
                class_name: body.class_name,
                school: body.school,
                file_url: body.file_url,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "publish successful", "data": document })),
    ))
}

// ============ GET /documents ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    subject: String,
    #[serde(default, rename = "class")]
    class_name: String,
    #[serde(default)]
    school: String,
    /// Restrict to the caller's own documents (academy callers only).
    #[serde(default)]
    mine: bool,
}

async fn handle_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchEnvelope>, AppError> {
    let caller = require_caller(&state, &headers).await?;

    let response = state
        .catalog
        .search(
            &caller,
            &params.subject,
            &params.class_name,
            &params.school,
            params.mine,
        )
        .await?;

    Ok(Json(SearchEnvelope::from(response)))
}

/// Wire shape of a search response: `data` plus provenance.
#[derive(Serialize)]
struct SearchEnvelope {
    data: Vec<SearchHit>,
    source: ResultSource,
}

impl From<SearchResponse> for SearchEnvelope {
    fn from(r: SearchResponse) -> Self {
        SearchEnvelope {
            data: r.hits,
            source: r.source,
        }
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
