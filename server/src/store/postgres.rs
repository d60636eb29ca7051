//! Postgres-backed store.
//!
//! DESIGN
//! ======
//! Rows travel as JSONB in both directions. Reads select `to_jsonb(t)`;
//! writes bind the row as one JSONB parameter and expand it with
//! `jsonb_populate_record`, so Postgres coerces each value to the column
//! type and omitted columns keep their defaults (`gen_random_uuid()`,
//! `now()`). Identifiers spliced into SQL come from the static resource
//! registry; row keys are checked against it before any statement is built.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{ListPage, ListQuery, RecordStore, StoreError, into_row};
use crate::resources::{ResourceDef, Row};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn checked_columns(def: &ResourceDef, row: &Row) -> Result<Vec<&'static str>, StoreError> {
    row.keys()
        .map(|key| {
            def.fields
                .iter()
                .find(|(_, column)| *column == key.as_str())
                .map(|(_, column)| *column)
                .ok_or_else(|| StoreError::Invalid(format!("unknown column {key} for {}", def.table)))
        })
        .collect()
}

/// Escape `LIKE` metacharacters so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_where(builder: &mut QueryBuilder<'_, Postgres>, def: &ResourceDef, query: &ListQuery) {
    builder.push(" WHERE TRUE");
    for (column, value) in &query.filters {
        builder.push(format!(" AND t.{column}::text = "));
        builder.push_bind(value.clone());
    }
    if let Some(term) = query.search.as_deref().filter(|_| !def.search_columns.is_empty()) {
        let pattern = like_pattern(term);
        builder.push(" AND (");
        for (index, column) in def.search_columns.iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            builder.push(format!("t.{column}::text ILIKE "));
            builder.push_bind(pattern.clone());
        }
        builder.push(")");
    }
}

pub(crate) fn list_builder<'a>(def: &ResourceDef, query: &ListQuery) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT to_jsonb(t) FROM {} t", def.table));
    push_where(&mut builder, def, query);

    let mut order = Vec::new();
    if let Some(position) = def.position_column.filter(|_| query.by_position) {
        order.push(format!("t.{position} ASC NULLS LAST"));
    }
    if def.has_column("created_at") {
        order.push("t.created_at DESC".to_owned());
    }
    if !order.is_empty() {
        builder.push(format!(" ORDER BY {}", order.join(", ")));
    }

    if let Some(page) = query.page {
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(page.limit));
        builder.push(" OFFSET ");
        builder.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
    }
    builder
}

pub(crate) fn count_builder<'a>(def: &ResourceDef, query: &ListQuery) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT count(*) FROM {} t", def.table));
    push_where(&mut builder, def, query);
    builder
}

pub(crate) fn group_count_builder<'a>(
    def: &ResourceDef,
    column: &str,
    query: &ListQuery,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT t.{column}::text, count(*) FROM {} t", def.table));
    push_where(&mut builder, def, query);
    builder.push(format!(" AND t.{column} IS NOT NULL GROUP BY 1"));
    builder
}

pub(crate) fn insert_sql(def: &ResourceDef, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {table} AS t DEFAULT VALUES RETURNING to_jsonb(t)", table = def.table);
    }
    let list = columns.join(", ");
    format!(
        "INSERT INTO {table} AS t ({list}) SELECT {list} FROM jsonb_populate_record(NULL::{table}, $1) \
         RETURNING to_jsonb(t)",
        table = def.table
    )
}

pub(crate) fn update_sql(def: &ResourceDef, columns: &[&str], stamp_updated_at: bool) -> String {
    let mut assignments = columns.iter().map(|column| format!("{column} = r.{column}")).collect::<Vec<_>>();
    if stamp_updated_at {
        assignments.push("updated_at = now()".to_owned());
    }
    format!(
        "UPDATE {table} AS t SET {assignments} FROM jsonb_populate_record(NULL::{table}, $1) AS r \
         WHERE t.id::text = $2 RETURNING to_jsonb(t)",
        table = def.table,
        assignments = assignments.join(", ")
    )
}

#[async_trait]
impl RecordStore for PgStore {
    async fn list(&self, def: &ResourceDef, query: &ListQuery) -> Result<ListPage, StoreError> {
        let rows = list_builder(def, query)
            .build_query_scalar::<Value>()
            .fetch_all(&self.pool)
            .await?;
        let total = count_builder(def, query)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(ListPage {
            rows: rows.into_iter().map(into_row).collect(),
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn get(&self, def: &ResourceDef, id: &str) -> Result<Option<Row>, StoreError> {
        let sql = format!("SELECT to_jsonb(t) FROM {} t WHERE t.id::text = $1", def.table);
        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_row))
    }

    async fn insert(&self, def: &ResourceDef, row: Row) -> Result<Row, StoreError> {
        let columns = checked_columns(def, &row)?;
        if !def.id_generated && !columns.contains(&"id") {
            return Err(StoreError::Invalid(format!("{} requires a client-supplied id", def.name)));
        }

        let sql = insert_sql(def, &columns);
        let query = sqlx::query_scalar::<_, Value>(&sql);
        let query = if columns.is_empty() { query } else { query.bind(Value::Object(row)) };
        let inserted = query.fetch_one(&self.pool).await?;
        Ok(into_row(inserted))
    }

    async fn update(&self, def: &ResourceDef, id: &str, patch: Row) -> Result<Option<Row>, StoreError> {
        if patch.is_empty() {
            return self.get(def, id).await;
        }
        let columns = checked_columns(def, &patch)?;
        let stamp = def.has_column("updated_at") && !columns.contains(&"updated_at");

        let sql = update_sql(def, &columns, stamp);
        let updated = sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Object(patch))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated.map(into_row))
    }

    async fn delete(&self, def: &ResourceDef, id: &str) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id::text = $1", def.table);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by(
        &self,
        def: &ResourceDef,
        column: &str,
        query: &ListQuery,
    ) -> Result<BTreeMap<String, u64>, StoreError> {
        if !def.has_column(column) {
            return Err(StoreError::Invalid(format!("unknown column {column} for {}", def.table)));
        }
        let rows = group_count_builder(def, column, query)
            .build_query_as::<(String, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(key, count)| (key, u64::try_from(count).unwrap_or_default()))
            .collect())
    }

    async fn reorder(&self, def: &ResourceDef, ids: &[String]) -> Result<u64, StoreError> {
        let Some(position) = def.position_column else {
            return Err(StoreError::Invalid(format!("{} has no position column", def.name)));
        };

        let sql = format!("UPDATE {} SET {position} = $1 WHERE id::text = $2", def.table);
        let mut tx = self.pool.begin().await?;
        let mut touched = 0;
        for (index, id) in ids.iter().enumerate() {
            let result = sqlx::query(&sql)
                .bind(i32::try_from(index).unwrap_or(i32::MAX))
                .bind(id)
                .execute(&mut *tx)
                .await?;
            touched += result.rows_affected();
        }
        tx.commit().await?;
        Ok(touched)
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
