//! HTTP server exposing a [`Connection`] as the catalog REST API.
//!
//! `bifrost serve` wraps the selected profile's direct store in this router;
//! [`RestClient`](crate::client::RestClient) is its counterpart.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/sections` | All sections |
//! | `GET`  | `/sections/{name}` | One section, or 404 |
//! | `POST` | `/sections` | Create a section; 201, or 409 if the name is taken |
//! | `GET`  | `/files?query=&section=` | One file by SHA-256, id or name, or 404 |
//! | `GET`  | `/index?section=&key=` | Projected values of every file |
//! | `GET`  | `/search?query=&section=&key=` | Projected values of matching files |
//! | `POST` | `/files/register` | Register a file after an existence check |
//! | `POST` | `/files/create` | Register a file relying on the store's uniqueness |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "type_mismatch", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `section_not_found` (404),
//! `section_exists` (409), `duplicate_location` (409), `type_mismatch` (422),
//! `internal` (500). `duplicate_location` also carries `location` and
//! `existing_sha`; `section_not_found` carries `section`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::connection::Connection;
use crate::error::CatalogError;
use crate::models::{CatalogFile, IndexKey, MediaType, Section};

type SharedConnection = Arc<dyn Connection>;

/// Body of `POST /sections`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSectionRequest {
    pub name: String,
    pub remote_path: String,
    pub section_type: MediaType,
}

/// Body of `POST /files/register` and `POST /files/create`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileRequest {
    pub file: CatalogFile,
    pub section: Section,
}

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. `"type_mismatch"`).
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    detail: ErrorDetail,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.detail })).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        detail: ErrorDetail {
            code: code.to_string(),
            message: message.into(),
            ..ErrorDetail::default()
        },
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::SectionNotFound { name } => {
                let mut e = app_error(StatusCode::NOT_FOUND, "section_not_found", message);
                e.detail.section = Some(name);
                e
            }
            CatalogError::DuplicateLocation {
                location,
                existing_sha,
            } => {
                let mut e = app_error(StatusCode::CONFLICT, "duplicate_location", message);
                e.detail.location = Some(location);
                e.detail.existing_sha = Some(existing_sha);
                e
            }
            CatalogError::TypeMismatch { .. } => {
                app_error(StatusCode::UNPROCESSABLE_ENTITY, "type_mismatch", message)
            }
            CatalogError::InvalidArgument { .. } | CatalogError::UnknownMediaType { .. } => {
                app_error(StatusCode::BAD_REQUEST, "bad_request", message)
            }
            other => {
                tracing::error!(error = %other, "request failed");
                app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

/// Build the API router over `connection`.
pub fn router(connection: SharedConnection) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sections", get(handle_sections).post(handle_create_section))
        .route("/sections/{name}", get(handle_section))
        .route("/files", get(handle_file))
        .route("/files/register", post(handle_register))
        .route("/files/create", post(handle_create))
        .route("/index", get(handle_index))
        .route("/search", get(handle_search))
        .layer(cors)
        .with_state(connection)
}

/// Serve the API on `bind_addr` until the process is stopped.
pub async fn run_server(connection: SharedConnection, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(connection);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "catalog server listening");
    println!("bifrost server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ GET /health ============

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

// ============ Sections ============

async fn handle_sections(
    State(conn): State<SharedConnection>,
) -> Result<Json<Vec<Section>>, AppError> {
    Ok(Json(conn.get_sections().await?))
}

async fn handle_section(
    State(conn): State<SharedConnection>,
    Path(name): Path<String>,
) -> Result<Json<Section>, AppError> {
    match conn.get_section(&name).await? {
        Some(section) => Ok(Json(section)),
        None => Err(app_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no section named '{}'", name),
        )),
    }
}

async fn handle_create_section(
    State(conn): State<SharedConnection>,
    Json(req): Json<CreateSectionRequest>,
) -> Result<(StatusCode, Json<Section>), AppError> {
    let created = conn
        .create_section(&req.name, &req.remote_path, req.section_type)
        .await?;
    match created {
        Some(section) => Ok((StatusCode::CREATED, Json(section))),
        None => Err(app_error(
            StatusCode::CONFLICT,
            "section_exists",
            format!("section '{}' already exists", req.name),
        )),
    }
}

/// Resolve an optional `section` query parameter.
async fn scoped_section(
    conn: &SharedConnection,
    name: Option<&str>,
) -> Result<Option<Section>, AppError> {
    match name {
        None => Ok(None),
        Some(name) => match conn.get_section(name).await? {
            Some(section) => Ok(Some(section)),
            None => Err(CatalogError::SectionNotFound {
                name: name.to_string(),
            }
            .into()),
        },
    }
}

// ============ Files ============

#[derive(Deserialize)]
struct FileParams {
    query: String,
    section: Option<String>,
}

async fn handle_file(
    State(conn): State<SharedConnection>,
    Query(params): Query<FileParams>,
) -> Result<Json<CatalogFile>, AppError> {
    let section = scoped_section(&conn, params.section.as_deref()).await?;
    match conn.get_file(&params.query, section.as_ref()).await? {
        Some(file) => Ok(Json(file)),
        None => Err(app_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no file matches '{}'", params.query),
        )),
    }
}

fn rejected(req: &FileRequest) -> AppError {
    CatalogError::type_mismatch(req.file.file_type(), req.section.section_type).into()
}

async fn handle_register(
    State(conn): State<SharedConnection>,
    Json(req): Json<FileRequest>,
) -> Result<Json<CatalogFile>, AppError> {
    match conn.register_file(&req.file, &req.section).await? {
        Some(file) => Ok(Json(file)),
        None => Err(rejected(&req)),
    }
}

async fn handle_create(
    State(conn): State<SharedConnection>,
    Json(req): Json<FileRequest>,
) -> Result<Json<CatalogFile>, AppError> {
    match conn.create_file(&req.file, &req.section).await? {
        Some(file) => Ok(Json(file)),
        None => Err(rejected(&req)),
    }
}

// ============ Index / search ============

#[derive(Deserialize)]
struct IndexParams {
    section: Option<String>,
    #[serde(default)]
    key: IndexKey,
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    section: Option<String>,
    #[serde(default)]
    key: IndexKey,
}

async fn handle_index(
    State(conn): State<SharedConnection>,
    Query(params): Query<IndexParams>,
) -> Result<Json<Vec<String>>, AppError> {
    let section = scoped_section(&conn, params.section.as_deref()).await?;
    Ok(Json(conn.index(section.as_ref(), params.key).await?))
}

async fn handle_search(
    State(conn): State<SharedConnection>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<String>>, AppError> {
    let section = scoped_section(&conn, params.section.as_deref()).await?;
    Ok(Json(
        conn.search(&params.query, section.as_ref(), params.key)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_and_code(err: CatalogError) -> (StatusCode, String) {
        let app: AppError = err.into();
        (app.status, app.detail.code)
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_and_code(CatalogError::type_mismatch("document", "video")),
            (StatusCode::UNPROCESSABLE_ENTITY, "type_mismatch".to_string())
        );
        assert_eq!(
            status_and_code(CatalogError::SectionNotFound {
                name: "movies".into()
            }),
            (StatusCode::NOT_FOUND, "section_not_found".to_string())
        );
        assert_eq!(
            status_and_code(CatalogError::invalid_argument("bad")),
            (StatusCode::BAD_REQUEST, "bad_request".to_string())
        );
        assert_eq!(
            status_and_code(CatalogError::NotConnected),
            (StatusCode::INTERNAL_SERVER_ERROR, "internal".to_string())
        );
    }

    #[test]
    fn test_duplicate_location_carries_details() {
        let app: AppError = CatalogError::DuplicateLocation {
            location: "/m/a.mp4".into(),
            existing_sha: "ab".into(),
        }
        .into();
        assert_eq!(app.status, StatusCode::CONFLICT);

        let json = serde_json::to_value(ErrorBody { error: app.detail }).unwrap();
        assert_eq!(json["error"]["code"], "duplicate_location");
        assert_eq!(json["error"]["location"], "/m/a.mp4");
        assert_eq!(json["error"]["existing_sha"], "ab");
        assert!(json["error"].get("section").is_none());
    }
}
