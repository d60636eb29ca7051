//! Board data model shared by the controller and its sources.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Anything that can sit in a board column.
pub trait BoardItem {
    /// Stable, board-unique identifier.
    fn id(&self) -> &str;
}

/// Stage label to authoritative item count.
pub type Counts = HashMap<String, u64>;

/// Pagination block returned alongside each page of items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_next: bool,
}

/// One page of items for a stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Snapshot of a single column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnState<T> {
    /// Last page loaded; 0 before the first page arrives.
    pub page: u32,
    pub has_next: bool,
    pub loading: bool,
    pub initial_loading: bool,
    pub items: Vec<T>,
    /// Stage total as last reported with a page, adjusted by local moves.
    pub total: u64,
}

impl<T> ColumnState<T> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            page: 0,
            has_next: true,
            loading: false,
            initial_loading: false,
            items: Vec::new(),
            total: 0,
        }
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize>
    where
        T: BoardItem,
    {
        self.items.iter().position(|item| item.id() == id)
    }
}

/// Untyped API record: a string `id` plus whatever fields the resource has.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Field value by API name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl BoardItem for Record {
    fn id(&self) -> &str {
        &self.id
    }
}
