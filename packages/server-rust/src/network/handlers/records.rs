//! `/api/data`: raw record CRUD for one business.
//!
//! The business is named by the `business` query parameter (`negocio` is
//! accepted as well).

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use formgrid_core::{Record, RecordId};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AppState, ApiError};

#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    #[serde(alias = "negocio")]
    business: Option<String>,
    /// Fill in missing computed values when listing.
    #[serde(default)]
    backfill: bool,
}

impl RecordQuery {
    fn business(self) -> Result<String, ApiError> {
        self.business
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("query parameter \"business\" is required"))
    }
}

fn no_data() -> ApiError {
    ApiError::bad_request("no data received")
}

pub async fn list_records(
    State(state): State<AppState>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let Query(query) = query?;
    let backfill = query.backfill;
    let business = query.business()?;
    let records = if backfill {
        state.service.records(&business).await?
    } else {
        state.service.list_records(&business).await?
    };
    Ok(Json(records))
}

pub async fn get_record(
    State(state): State<AppState>,
    id: Result<Path<RecordId>, PathRejection>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> Result<Json<Record>, ApiError> {
    let Path(id) = id?;
    let business = query?.0.business()?;
    Ok(Json(state.service.get_record(&business, id).await?))
}

/// Accepts one object (answered with the stored record) or an array of
/// objects (answered with a summary and the stored records). Either way the
/// write is all or nothing.
pub async fn create_records(
    State(state): State<AppState>,
    query: Result<Query<RecordQuery>, QueryRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let business = query?.0.business()?;
    let Json(body) = body?;

    match body {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(no_data());
            }
            let records = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(record) => Ok(record),
                    _ => Err(ApiError::bad_request(format!(
                        "object {}: expected a JSON object",
                        i + 1
                    ))),
                })
                .collect::<Result<Vec<Record>, ApiError>>()?;
            let created = state.service.create_records(&business, records).await?;
            let body = json!({
                "message": format!("{} record(s) created", created.len()),
                "data": created,
            });
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        Value::Object(record) if !record.is_empty() => {
            let mut created = state.service.create_records(&business, vec![record]).await?;
            let record = created.pop().ok_or_else(no_data)?;
            Ok((StatusCode::CREATED, Json(record)).into_response())
        }
        _ => Err(no_data()),
    }
}

pub async fn update_record(
    State(state): State<AppState>,
    id: Result<Path<RecordId>, PathRejection>,
    query: Result<Query<RecordQuery>, QueryRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Record>, ApiError> {
    let Path(id) = id?;
    let business = query?.0.business()?;
    let Json(body) = body?;
    let record = match body {
        Value::Object(record) if !record.is_empty() => record,
        _ => return Err(no_data()),
    };
    Ok(Json(state.service.update_record(&business, id, record).await?))
}

pub async fn delete_record(
    State(state): State<AppState>,
    id: Result<Path<RecordId>, PathRejection>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let business = query?.0.business()?;
    state.service.delete_record(&business, id).await?;
    Ok(Json(json!({ "message": format!("record {id} deleted") })))
}
