//! Generic resource routes: `/api/{resource}` and `/api/{resource}/{id}`.
//!
//! Handlers resolve the resource name against the registry, delegate to
//! `services::records`, and map service errors onto status codes.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::resources::{self, ResourceDef, Row};
use crate::services::records::{self, ResourceError};
use crate::state::AppState;
use crate::store::StoreError;

fn resolve(name: &str) -> Result<&'static ResourceDef, StatusCode> {
    resources::lookup(name).ok_or_else(|| resource_error_to_status(ResourceError::UnknownResource(name.to_owned())))
}

/// Fallback for verbs a resource path does not serve. An unknown resource
/// is still a 404.
pub async fn unsupported_method(Path(params): Path<HashMap<String, String>>) -> StatusCode {
    params
        .get("resource")
        .and_then(|name| resolve(name).err())
        .unwrap_or(StatusCode::METHOD_NOT_ALLOWED)
}

/// `GET /api/{resource}`: list records. Returns the paged envelope when
/// `page` or `limit` is given, a bare array otherwise.
pub async fn list(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, StatusCode> {
    let def = resolve(&resource)?;
    let query = records::parse_list_query(def, &params, state.page_limits).map_err(resource_error_to_status)?;

    if query.page.is_some() {
        let paged = records::list_page(state.store.as_ref(), def, &query, state.page_limits)
            .await
            .map_err(resource_error_to_status)?;
        return Ok(Json(paged).into_response());
    }

    let rows = records::list(state.store.as_ref(), def, &query)
        .await
        .map_err(resource_error_to_status)?;
    Ok(Json(rows).into_response())
}

/// `GET /api/{resource}/counts?by=field`: record counts per field value.
pub async fn counts(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let def = resolve(&resource)?;
    let query = records::parse_list_query(def, &params, state.page_limits).map_err(resource_error_to_status)?;
    let counts = records::stage_counts(state.store.as_ref(), def, params.get("by").map(String::as_str), &query)
        .await
        .map_err(resource_error_to_status)?;
    Ok(Json(serde_json::json!(counts)))
}

/// `GET /api/{resource}/{id}`: fetch one record.
pub async fn get_one(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Row>, StatusCode> {
    let def = resolve(&resource)?;
    let row = records::get(state.store.as_ref(), def, &id)
        .await
        .map_err(resource_error_to_status)?;
    Ok(Json(row))
}

/// `POST /api/{resource}`: create one record.
pub async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Row>), StatusCode> {
    let def = resolve(&resource)?;
    let row = records::create(state.store.as_ref(), def, body)
        .await
        .map_err(resource_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `PUT /api/{resource}/{id}`: update one record.
pub async fn update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Row>, StatusCode> {
    let def = resolve(&resource)?;
    let row = records::update(state.store.as_ref(), def, &id, body)
        .await
        .map_err(resource_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/{resource}/{id}`: delete one record.
pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let def = resolve(&resource)?;
    records::delete(state.store.as_ref(), def, &id)
        .await
        .map_err(resource_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ReorderBody {
    pub ids: Vec<String>,
}

/// `PUT /api/{resource}/reorder`: persist a manual ordering.
pub async fn reorder(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<ReorderBody>,
) -> Result<Json<Value>, StatusCode> {
    let def = resolve(&resource)?;
    let updated = records::reorder(state.store.as_ref(), def, &body.ids)
        .await
        .map_err(resource_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true, "updated": updated })))
}

/// Postgres SQLSTATE classes caused by the request payload:
/// 22 (data exception) and 23 (integrity constraint violation).
fn is_client_database_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().is_some_and(|code| code.starts_with("22") || code.starts_with("23")),
        _ => false,
    }
}

pub(crate) fn resource_error_to_status(err: ResourceError) -> StatusCode {
    match &err {
        ResourceError::UnknownResource(_) | ResourceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ResourceError::UnknownField(_)
        | ResourceError::InvalidBody(_)
        | ResourceError::InvalidQuery { .. }
        | ResourceError::NoStageColumn(_)
        | ResourceError::NotOrderable(_)
        | ResourceError::Store(StoreError::Invalid(_)) => {
            warn!(error = %err, "rejected resource request");
            StatusCode::BAD_REQUEST
        }
        ResourceError::Store(StoreError::Database(db)) if is_client_database_error(db) => {
            warn!(error = %err, "database rejected payload");
            StatusCode::BAD_REQUEST
        }
        ResourceError::Store(StoreError::Database(_)) => {
            error!(error = %err, "resource store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "resources_test.rs"]
mod tests;
