//! `/api/schemas` and `/api/stats`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use formgrid_core::Schema;
use serde_json::{json, Value};

use super::{AppState, ApiError};
use crate::traits::StoreStats;

pub async fn list_schemas(State(state): State<AppState>) -> Result<Json<Vec<Schema>>, ApiError> {
    Ok(Json(state.service.schemas().await?))
}

pub async fn get_schema(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Schema>, ApiError> {
    Ok(Json(state.service.schema(&name).await?))
}

pub async fn create_schema(
    State(state): State<AppState>,
    body: Result<Json<Schema>, JsonRejection>,
) -> Result<(StatusCode, Json<Schema>), ApiError> {
    let Json(schema) = body?;
    let created = state.service.create_schema(schema).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_schema(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.service.delete_schema(&name).await?;
    Ok(Json(json!({ "message": format!("business '{name}' deleted") })))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StoreStats>, ApiError> {
    Ok(Json(state.service.stats().await?))
}
