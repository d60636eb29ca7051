//! Record stores: the backing tables behind the resource router.
//!
//! DESIGN
//! ======
//! Stores speak storage column names only; field translation happens in
//! `services::records`. [`postgres::PgStore`] is used whenever a database is
//! configured, [`memory::MemoryStore`] otherwise. Both list newest first;
//! a [`ListQuery`] with `by_position` puts manually positioned rows ahead.

pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::resources::{ResourceDef, Row};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid record: {0}")]
    Invalid(String),
}

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Filters and paging applied to `list` and `count_by`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Column equality filters, compared on the text form of the value.
    pub filters: Vec<(&'static str, String)>,
    /// Case-insensitive substring matched against the resource's search columns.
    pub search: Option<String>,
    pub page: Option<PageRequest>,
    /// Put rows with a manual position ahead of the rest. Board pages set
    /// this; plain listings stay newest first.
    pub by_position: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub rows: Vec<Row>,
    /// Rows matching the filters, ignoring paging.
    pub total: u64,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, def: &ResourceDef, query: &ListQuery) -> Result<ListPage, StoreError>;

    async fn get(&self, def: &ResourceDef, id: &str) -> Result<Option<Row>, StoreError>;

    /// Insert a row, assigning `id` for generated-id resources and timestamps
    /// the caller left out.
    async fn insert(&self, def: &ResourceDef, row: Row) -> Result<Row, StoreError>;

    async fn update(&self, def: &ResourceDef, id: &str, patch: Row) -> Result<Option<Row>, StoreError>;

    async fn delete(&self, def: &ResourceDef, id: &str) -> Result<bool, StoreError>;

    /// Count matching rows grouped by the text value of `column`. Null values are skipped.
    async fn count_by(
        &self,
        def: &ResourceDef,
        column: &str,
        query: &ListQuery,
    ) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Write `position = index` for each id. Returns the number of rows touched.
    async fn reorder(&self, def: &ResourceDef, ids: &[String]) -> Result<u64, StoreError>;
}

/// Text form of a JSON value as used by filters and grouping. `None` for null.
#[must_use]
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Unwrap a JSON object, yielding an empty row for anything else.
#[must_use]
pub fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
