//! HTTP route layer
//!
//! Wires the book resource operations to their REST endpoints. Handlers
//! validate request shape before touching the service, so invalid input
//! never reaches the remote store, and forward every failure to the error
//! classifier for the stable `{"success": false, "error": ...}` contract.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::books::{messages, validate_book_fields, validate_status, Book, BookService};
use crate::error::ApiError;
use crate::store::RecordStore;

/// Shared application state: one service instance for every request.
pub struct AppState<S: RecordStore> {
    pub service: Arc<BookService<S>>,
}

impl<S: RecordStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: RecordStore> AppState<S> {
    /// Wrap a service for sharing across handlers.
    pub fn new(service: BookService<S>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Success body carrying a data payload.
#[derive(Debug, Serialize)]
struct DataResponse<T> {
    success: bool,
    data: T,
}

impl<T> DataResponse<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Success body carrying only a message (delete confirmation).
#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Build the gateway router.
pub fn create_router<S: RecordStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/books", get(list_books::<S>))
        .route("/api/books", post(create_book::<S>))
        .route("/api/books/{id}", get(get_book::<S>))
        .route("/api/books/{id}", put(update_book::<S>))
        .route("/api/books/{id}/status", patch(update_book_status::<S>))
        .route("/api/books/{id}", delete(delete_book::<S>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// GET /health
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "bookshelf-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/books
async fn list_books<S: RecordStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<DataResponse<Vec<Book>>>, ApiError> {
    let books = state.service.list().await?;
    Ok(Json(DataResponse::new(books)))
}

/// GET /api/books/{id}
async fn get_book<S: RecordStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Book>>, ApiError> {
    let id = require_id(&id)?;
    let book = state.service.get(id).await?;
    Ok(Json(DataResponse::new(book)))
}

/// POST /api/books
async fn create_book<S: RecordStore>(
    State(state): State<AppState<S>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DataResponse<Book>>, ApiError> {
    let fields = validate_book_fields(&require_body(body)?).map_err(ApiError::validation)?;
    info!(book_name = %fields.book_name, "creating book");
    let book = state.service.create(fields).await?;
    Ok(Json(DataResponse::new(book)))
}

/// PUT /api/books/{id}
async fn update_book<S: RecordStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DataResponse<Book>>, ApiError> {
    let id = require_id(&id)?;
    let fields = validate_book_fields(&require_body(body)?).map_err(ApiError::validation)?;
    let book = state.service.update(id, fields).await?;
    Ok(Json(DataResponse::new(book)))
}

/// PATCH /api/books/{id}/status
async fn update_book_status<S: RecordStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DataResponse<Book>>, ApiError> {
    let id = require_id(&id)?;
    let status = validate_status(&require_body(body)?).map_err(ApiError::validation)?;
    let book = state.service.update_status(id, status).await?;
    Ok(Json(DataResponse::new(book)))
}

/// DELETE /api/books/{id}
async fn delete_book<S: RecordStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = require_id(&id)?;
    state.service.delete(id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: messages::DELETED.to_string(),
    }))
}

/// Reject blank path ids with the gateway's own 400 shape.
fn require_id(id: &str) -> Result<&str, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::validation(messages::EMPTY_ID));
    }
    Ok(id)
}

/// Unwrap a JSON body, mapping extractor rejections (missing body, bad
/// content type, parse failures) to the gateway's own 400 shape.
fn require_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(_) => Err(ApiError::validation(messages::EMPTY_BODY)),
    }
}
