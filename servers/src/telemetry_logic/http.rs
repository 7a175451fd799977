//! CRUD surface over the record store.
//!
//! Create runs through the ingestion service so every stored record is also
//! fanned out to its agent's listeners; read, list, update, and delete talk
//! to the store directly and never touch the dispatcher.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use lib_common::core::ingest::IngestError;
use lib_common::core::model::{NewRecord, ProcessedRecord};
use lib_common::core::store::StoreError;

use crate::telemetry_logic::state::AppState;

/// Application-level error for the HTTP surface. Each variant maps to a
/// distinct, stable error signal the caller can branch on.
#[derive(Debug)]
pub enum AppError {
    /// The request was well-formed JSON but an item failed validation.
    Validation(String),
    /// No record exists under the requested id.
    NotFound(i32),
    /// The persistence engine failed.
    Store(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AppError::NotFound(id),
            StoreError::Backend(detail) => AppError::Store(detail),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Validation { .. } => AppError::Validation(e.to_string()),
            IngestError::Store { .. } => AppError::Store(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts an `AppError` into an `axum::response::Response`, providing
    /// appropriate HTTP status codes and JSON error bodies to the client.
    fn into_response(self) -> Response {
        let (status, error_json) = match self {
            AppError::Validation(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error_type": "ValidationError",
                    "message": message
                }),
            ),
            AppError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({
                    "error_type": "NotFoundError",
                    "message": format!("Processed agent data {} not found", id)
                }),
            ),
            AppError::Store(detail) => {
                log::error!("Store failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error_type": "StoreError",
                        "message": "Storage backend failure.",
                        "detail": detail
                    }),
                )
            }
        };

        (status, Json(error_json)).into_response()
    }
}

/// `POST /processed_agent_data/` - batch create.
///
/// Items are committed and broadcast one by one; a failure partway leaves
/// the earlier items committed, as reported by the error message's index.
pub async fn create_records(
    State(state): State<AppState>,
    Json(batch): Json<Vec<NewRecord>>,
) -> Result<Json<Vec<ProcessedRecord>>, AppError> {
    let stored = state.ingest.ingest(batch).await?;
    Ok(Json(stored))
}

/// `GET /processed_agent_data/{id}` - read one record.
pub async fn read_record(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProcessedRecord>, AppError> {
    Ok(Json(state.store.get(id).await?))
}

/// `GET /processed_agent_data/` - list all records.
pub async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProcessedRecord>>, AppError> {
    Ok(Json(state.store.list().await?))
}

/// `PUT /processed_agent_data/{id}` - full replace of all mutable fields.
///
/// Updates bypass the dispatcher: subscribers only ever see newly created
/// records.
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(item): Json<NewRecord>,
) -> Result<Json<ProcessedRecord>, AppError> {
    let draft = item.into_draft().map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(Json(state.store.update(id, &draft).await?))
}

/// `DELETE /processed_agent_data/{id}` - remove a record, returning it.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProcessedRecord>, AppError> {
    Ok(Json(state.store.delete(id).await?))
}

/// `GET /health` - liveness probe for monitors and load balancers.
pub async fn health_handler() -> &'static str {
    "OK"
}
