//! `/api/businesses/{name}/...`: form, import and view operations that run
//! the computation engine on the server.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use formgrid_core::{Record, RecordId, TableView};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AppState, ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    values: Record,
    /// Id of the record being edited; absent for a new record.
    #[serde(default)]
    editing_id: Option<RecordId>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    values: Record,
}

#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    field: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    field: String,
    value: String,
}

pub async fn submit(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let Path(name) = name?;
    let Json(request) = body?;
    let status = if request.editing_id.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let record = state
        .service
        .submit(&name, request.values, request.editing_id)
        .await?;
    Ok((status, Json(record)))
}

pub async fn preview(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
    body: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Json<Record>, ApiError> {
    let Path(name) = name?;
    let Json(request) = body?;
    Ok(Json(state.service.preview(&name, request.values).await?))
}

pub async fn normalize(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
    body: Result<Json<NormalizeRequest>, JsonRejection>,
) -> Result<Json<NormalizeResponse>, ApiError> {
    let Path(name) = name?;
    let Json(request) = body?;
    let value = state
        .service
        .normalize_input(&name, &request.field, &request.value)
        .await?;
    Ok(Json(NormalizeResponse {
        field: request.field,
        value,
    }))
}

/// The body is the JSON text pasted by the user, parsed by the import
/// validator so that syntax errors are reported like any other rejection.
pub async fn import(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
    body: String,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Path(name) = name?;
    let created = state.service.import(&name, &body).await?;
    let body = json!({
        "message": format!("{} record(s) imported", created.len()),
        "data": created,
    });
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn table(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
) -> Result<Json<TableView>, ApiError> {
    let Path(name) = name?;
    Ok(Json(state.service.table(&name).await?))
}

pub async fn export(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let Path(name) = name?;
    Ok(Json(state.service.export(&name).await?))
}

pub async fn template(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
) -> Result<Json<Record>, ApiError> {
    let Path(name) = name?;
    Ok(Json(state.service.template(&name).await?))
}
