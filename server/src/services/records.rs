//! Record service: generic CRUD dispatch over the resource registry.
//!
//! DESIGN
//! ======
//! Handlers resolve a `ResourceDef`, then call into this module with the
//! shared store. Every function translates API field names to storage
//! columns on the way in and back on the way out; the store never sees a
//! camelCase key. There is no per-resource business logic here: ids and
//! creation timestamps are the only fields treated specially.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::config::PageLimits;
use crate::resources::{ResourceDef, Row, UnknownField};
use crate::store::{ListQuery, PageRequest, RecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },
    #[error(transparent)]
    UnknownField(#[from] UnknownField),
    #[error("invalid body: {0}")]
    InvalidBody(String),
    #[error("invalid query parameter {param}: {value}")]
    InvalidQuery { param: &'static str, value: String },
    #[error("{0} has no stage column")]
    NoStageColumn(&'static str),
    #[error("{0} does not support manual ordering")]
    NotOrderable(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_next: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagedRows {
    pub data: Vec<Row>,
    pub pagination: Pagination,
}

/// Parameters with a fixed meaning; every other query key is a field filter.
const RESERVED_PARAMS: &[&str] = &["page", "limit", "search", "by"];

fn parse_u32(params: &HashMap<String, String>, param: &'static str) -> Result<Option<u32>, ResourceError> {
    params
        .get(param)
        .map(|raw| {
            raw.trim()
                .parse::<u32>()
                .map_err(|_| ResourceError::InvalidQuery { param, value: raw.clone() })
        })
        .transpose()
}

/// Build a store query from raw query-string parameters.
///
/// Paging is only requested when `page` or `limit` is present.
///
/// # Errors
///
/// Returns `InvalidQuery` for non-numeric paging values and `UnknownField`
/// for filters naming a field the resource does not have.
pub fn parse_list_query(
    def: &ResourceDef,
    params: &HashMap<String, String>,
    limits: PageLimits,
) -> Result<ListQuery, ResourceError> {
    let page = parse_u32(params, "page")?;
    let limit = parse_u32(params, "limit")?;
    let page = (page.is_some() || limit.is_some())
        .then(|| PageRequest { page: page.unwrap_or(1).max(1), limit: limits.clamp(limit) });

    let search = params.get("search").map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());

    let mut filters = Vec::new();
    for (key, value) in params {
        if RESERVED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        let column = def
            .column_for(key)
            .ok_or_else(|| UnknownField { resource: def.name, field: key.clone() })?;
        filters.push((column, value.clone()));
    }
    filters.sort_unstable();

    Ok(ListQuery { filters, search, page, by_position: false })
}

fn body_object(body: Value) -> Result<Row, ResourceError> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(ResourceError::InvalidBody(format!("expected a JSON object, got {}", kind_of(&other)))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// List all matching records newest first, paging ignored.
///
/// # Errors
///
/// Propagates store failures.
pub async fn list(store: &dyn RecordStore, def: &ResourceDef, query: &ListQuery) -> Result<Vec<Row>, ResourceError> {
    let query = ListQuery { page: None, by_position: false, ..query.clone() };
    let page = store.list(def, &query).await?;
    Ok(page.rows.into_iter().map(|row| def.to_api(row)).collect())
}

/// List one page of matching records with its pagination envelope.
/// Manually positioned rows come first so board columns keep their order.
///
/// # Errors
///
/// Propagates store failures.
pub async fn list_page(
    store: &dyn RecordStore,
    def: &ResourceDef,
    query: &ListQuery,
    limits: PageLimits,
) -> Result<PagedRows, ResourceError> {
    let request = query.page.unwrap_or(PageRequest { page: 1, limit: limits.clamp(None) });
    let query = ListQuery { page: Some(request), by_position: true, ..query.clone() };
    let page = store.list(def, &query).await?;

    let shown = u64::from(request.page) * u64::from(request.limit);
    Ok(PagedRows {
        data: page.rows.into_iter().map(|row| def.to_api(row)).collect(),
        pagination: Pagination {
            page: request.page,
            limit: request.limit,
            total: page.total,
            has_next: shown < page.total,
        },
    })
}

/// Fetch one record by id.
///
/// # Errors
///
/// Returns `NotFound` when no record has the id.
pub async fn get(store: &dyn RecordStore, def: &ResourceDef, id: &str) -> Result<Row, ResourceError> {
    store
        .get(def, id)
        .await?
        .map(|row| def.to_api(row))
        .ok_or_else(|| ResourceError::NotFound { resource: def.name, id: id.to_owned() })
}

/// Create a record. Client ids are dropped for generated-id resources.
///
/// # Errors
///
/// Returns `InvalidBody` for non-object bodies, `UnknownField` for
/// unmapped fields, and propagates store failures.
pub async fn create(store: &dyn RecordStore, def: &ResourceDef, body: Value) -> Result<Row, ResourceError> {
    let mut row = body_object(body)?;
    if def.id_generated {
        row.remove("id");
    }
    let row = def.to_storage(row)?;
    let inserted = store.insert(def, row).await?;
    Ok(def.to_api(inserted))
}

/// Patch a record. `id` and `createdAt` in the body are ignored.
///
/// # Errors
///
/// Returns `NotFound` when no record has the id, plus the `create` errors.
pub async fn update(store: &dyn RecordStore, def: &ResourceDef, id: &str, body: Value) -> Result<Row, ResourceError> {
    let mut patch = body_object(body)?;
    patch.remove("id");
    patch.remove("createdAt");
    let patch = def.to_storage(patch)?;

    store
        .update(def, id, patch)
        .await?
        .map(|row| def.to_api(row))
        .ok_or_else(|| ResourceError::NotFound { resource: def.name, id: id.to_owned() })
}

/// Delete a record.
///
/// # Errors
///
/// Returns `NotFound` when no record has the id.
pub async fn delete(store: &dyn RecordStore, def: &ResourceDef, id: &str) -> Result<(), ResourceError> {
    if store.delete(def, id).await? {
        Ok(())
    } else {
        Err(ResourceError::NotFound { resource: def.name, id: id.to_owned() })
    }
}

/// Count records per value of `field`, defaulting to the resource's stage column.
///
/// # Errors
///
/// Returns `UnknownField` for an unmapped field and `NoStageColumn` when no
/// field is given and the resource has no stage column.
pub async fn stage_counts(
    store: &dyn RecordStore,
    def: &ResourceDef,
    field: Option<&str>,
    query: &ListQuery,
) -> Result<BTreeMap<String, u64>, ResourceError> {
    let column = match field {
        Some(field) => def
            .column_for(field)
            .ok_or_else(|| UnknownField { resource: def.name, field: field.to_owned() })?,
        None => def.stage_column.ok_or(ResourceError::NoStageColumn(def.name))?,
    };
    let query = ListQuery { page: None, by_position: false, ..query.clone() };
    Ok(store.count_by(def, column, &query).await?)
}

/// Persist a manual ordering: each id gets its index as position.
///
/// # Errors
///
/// Returns `NotOrderable` for resources without a position column.
pub async fn reorder(store: &dyn RecordStore, def: &ResourceDef, ids: &[String]) -> Result<u64, ResourceError> {
    if def.position_column.is_none() {
        return Err(ResourceError::NotOrderable(def.name));
    }
    Ok(store.reorder(def, ids).await?)
}

#[cfg(test)]
#[path = "records_test.rs"]
mod tests;
