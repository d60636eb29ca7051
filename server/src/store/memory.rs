//! In-memory store used when no database is configured.
//!
//! Each table is a `Vec<Row>` in insertion order. Lookups, updates and
//! deletes are linear scans. Listings sort by `created_at` descending,
//! falling back to insertion order for equal or unparseable timestamps.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ListPage, ListQuery, RecordStore, StoreError, value_text};
use crate::resources::{ResourceDef, Row};

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<&'static str, Vec<Row>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

fn created_at(row: &Row) -> Option<OffsetDateTime> {
    row.get("created_at")
        .and_then(Value::as_str)
        .and_then(|text| OffsetDateTime::parse(text, &Rfc3339).ok())
}

fn row_id(row: &Row) -> Option<String> {
    row.get("id").and_then(value_text)
}

fn matches(def: &ResourceDef, row: &Row, query: &ListQuery) -> bool {
    let filters_match = query
        .filters
        .iter()
        .all(|(column, expected)| row.get(*column).and_then(value_text).as_deref() == Some(expected.as_str()));
    if !filters_match {
        return false;
    }

    match query.search.as_deref().map(str::to_lowercase) {
        None => true,
        Some(needle) => def.search_columns.iter().any(|column| {
            row.get(*column)
                .and_then(value_text)
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        }),
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(&self, def: &ResourceDef, query: &ListQuery) -> Result<ListPage, StoreError> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(def.table) else {
            return Ok(ListPage::default());
        };

        let mut matched = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches(def, row, query))
            .map(|(index, row)| (created_at(row), index, row))
            .collect::<Vec<_>>();
        // Newest first; rows without a timestamp sort last.
        matched.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        let mut matched = matched.into_iter().map(|(_, _, row)| row).collect::<Vec<_>>();
        if let Some(position) = def.position_column.filter(|_| query.by_position) {
            // Stable sort keeps newest-first order among equal or missing positions.
            matched.sort_by_key(|row| match row.get(position).and_then(Value::as_i64) {
                Some(p) => (0, p),
                None => (1, 0),
            });
        }

        let total = matched.len() as u64;
        let rows = match query.page {
            Some(page) => {
                let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
                matched.into_iter().skip(offset).take(page.limit as usize).cloned().collect()
            }
            None => matched.into_iter().cloned().collect(),
        };
        Ok(ListPage { rows, total })
    }

    async fn get(&self, def: &ResourceDef, id: &str) -> Result<Option<Row>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(def.table)
            .and_then(|rows| rows.iter().find(|row| row_id(row).as_deref() == Some(id)))
            .cloned())
    }

    async fn insert(&self, def: &ResourceDef, mut row: Row) -> Result<Row, StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(def.table).or_default();

        if def.id_generated {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        } else {
            let Some(id) = row_id(&row).filter(|id| !id.is_empty()) else {
                return Err(StoreError::Invalid(format!("{} requires a client-supplied id", def.name)));
            };
            if rows.iter().any(|existing| row_id(existing).as_deref() == Some(id.as_str())) {
                return Err(StoreError::Invalid(format!("duplicate id {id}")));
            }
        }

        let now = now_rfc3339();
        for column in ["created_at", "updated_at"] {
            if def.has_column(column) && row.get(column).is_none_or(Value::is_null) {
                row.insert(column.into(), Value::String(now.clone()));
            }
        }

        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, def: &ResourceDef, id: &str, patch: Row) -> Result<Option<Row>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables
            .get_mut(def.table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row).as_deref() == Some(id)))
        else {
            return Ok(None);
        };

        let stamp = def.has_column("updated_at") && !patch.contains_key("updated_at");
        row.extend(patch);
        if stamp {
            row.insert("updated_at".into(), Value::String(now_rfc3339()));
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, def: &ResourceDef, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(def.table) else {
            return Ok(false);
        };
        match rows.iter().position(|row| row_id(row).as_deref() == Some(id)) {
            Some(index) => {
                rows.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_by(
        &self,
        def: &ResourceDef,
        column: &str,
        query: &ListQuery,
    ) -> Result<BTreeMap<String, u64>, StoreError> {
        let tables = self.tables.read().await;
        let mut counts = BTreeMap::new();
        for row in tables.get(def.table).into_iter().flatten() {
            if !matches(def, row, query) {
                continue;
            }
            if let Some(key) = row.get(column).and_then(value_text) {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn reorder(&self, def: &ResourceDef, ids: &[String]) -> Result<u64, StoreError> {
        let Some(position) = def.position_column else {
            return Err(StoreError::Invalid(format!("{} has no position column", def.name)));
        };

        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(def.table) else {
            return Ok(0);
        };

        let mut touched = 0;
        for (index, id) in ids.iter().enumerate() {
            if let Some(row) = rows.iter_mut().find(|row| row_id(row).as_deref() == Some(id.as_str())) {
                row.insert(position.to_owned(), Value::from(index as u64));
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
