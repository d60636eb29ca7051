//! Resource registry: maps API resource names to tables and field names.
//!
//! DESIGN
//! ======
//! Every resource the API serves is declared once in [`RESOURCES`]. A
//! declaration carries the backing table, whether the store generates ids,
//! and a static dictionary pairing each camelCase API field with its
//! snake_case column. Writes are translated strictly: a field missing from
//! the dictionary is rejected, so SQL identifiers are only ever taken from
//! this file. Reads are translated leniently: unmapped columns pass through.

use serde_json::{Map, Value};

/// A record as stored or served: a flat JSON object.
pub type Row = Map<String, Value>;

/// Static description of one API resource.
#[derive(Debug)]
pub struct ResourceDef {
    /// Path segment under `/api/`.
    pub name: &'static str,
    /// Backing table name.
    pub table: &'static str,
    /// `true` when the store assigns ids and client-supplied ids are stripped.
    pub id_generated: bool,
    /// `(api_field, column)` pairs.
    pub fields: &'static [(&'static str, &'static str)],
    /// Column that places a record on a board (pipeline stage, status).
    pub stage_column: Option<&'static str>,
    /// Integer column holding manual ordering, if the resource supports it.
    pub position_column: Option<&'static str>,
    /// Columns matched by the `search` query parameter.
    pub search_columns: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field `{field}` for resource `{resource}`")]
pub struct UnknownField {
    pub resource: &'static str,
    pub field: String,
}

impl ResourceDef {
    /// Column backing an API field.
    #[must_use]
    pub fn column_for(&self, field: &str) -> Option<&'static str> {
        self.fields.iter().find(|(api, _)| *api == field).map(|(_, column)| *column)
    }

    /// API field exposing a column.
    #[must_use]
    pub fn field_for(&self, column: &str) -> Option<&'static str> {
        self.fields.iter().find(|(_, col)| *col == column).map(|(api, _)| *api)
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.iter().any(|(_, col)| *col == column)
    }

    /// Translate an API row into storage column names.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownField`] for the first key missing from the dictionary.
    pub fn to_storage(&self, row: Row) -> Result<Row, UnknownField> {
        let mut out = Row::new();
        for (key, value) in row {
            let Some(column) = self.column_for(&key) else {
                return Err(UnknownField { resource: self.name, field: key });
            };
            out.insert(column.to_owned(), value);
        }
        Ok(out)
    }

    /// Translate a storage row into API field names.
    #[must_use]
    pub fn to_api(&self, row: Row) -> Row {
        row.into_iter()
            .map(|(column, value)| match self.field_for(&column) {
                Some(field) => (field.to_owned(), value),
                None => (column, value),
            })
            .collect()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

const LEAD_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("firstName", "first_name"),
    ("lastName", "last_name"),
    ("email", "email"),
    ("phone", "phone"),
    ("company", "company"),
    ("jobTitle", "job_title"),
    ("source", "source"),
    ("status", "status"),
    ("score", "score"),
    ("ownerId", "owner_id"),
    ("notes", "notes"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const CONTACT_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("firstName", "first_name"),
    ("lastName", "last_name"),
    ("email", "email"),
    ("phone", "phone"),
    ("jobTitle", "job_title"),
    ("accountId", "account_id"),
    ("ownerId", "owner_id"),
    ("notes", "notes"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const ACCOUNT_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("industry", "industry"),
    ("website", "website"),
    ("phone", "phone"),
    ("address", "address"),
    ("annualRevenue", "annual_revenue"),
    ("employeeCount", "employee_count"),
    ("ownerId", "owner_id"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const DEAL_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("title", "title"),
    ("value", "value"),
    ("currency", "currency"),
    ("stage", "stage"),
    ("probability", "probability"),
    ("accountId", "account_id"),
    ("contactId", "contact_id"),
    ("ownerId", "owner_id"),
    ("expectedCloseDate", "expected_close_date"),
    ("position", "position"),
    ("notes", "notes"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const TASK_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("title", "title"),
    ("description", "description"),
    ("status", "status"),
    ("priority", "priority"),
    ("dueDate", "due_date"),
    ("assignedTo", "assigned_to"),
    ("dealId", "deal_id"),
    ("contactId", "contact_id"),
    ("position", "position"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const CALENDAR_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("title", "title"),
    ("description", "description"),
    ("startsAt", "starts_at"),
    ("endsAt", "ends_at"),
    ("allDay", "all_day"),
    ("location", "location"),
    ("attendees", "attendees"),
    ("dealId", "deal_id"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const EMAIL_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("subject", "subject"),
    ("body", "body"),
    ("fromAddress", "from_address"),
    ("toAddress", "to_address"),
    ("status", "status"),
    ("sentAt", "sent_at"),
    ("contactId", "contact_id"),
    ("dealId", "deal_id"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const SALES_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("productName", "product_name"),
    ("amount", "amount"),
    ("quantity", "quantity"),
    ("soldAt", "sold_at"),
    ("accountId", "account_id"),
    ("dealId", "deal_id"),
    ("ownerId", "owner_id"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const USER_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("email", "email"),
    ("fullName", "full_name"),
    ("role", "role"),
    ("avatarUrl", "avatar_url"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

/// All resources served under `/api/{resource}`.
pub static RESOURCES: &[ResourceDef] = &[
    ResourceDef {
        name: "leads",
        table: "leads",
        id_generated: true,
        fields: LEAD_FIELDS,
        stage_column: Some("status"),
        position_column: None,
        search_columns: &["first_name", "last_name", "email", "company"],
    },
    ResourceDef {
        name: "contacts",
        table: "contacts",
        id_generated: true,
        fields: CONTACT_FIELDS,
        stage_column: None,
        position_column: None,
        search_columns: &["first_name", "last_name", "email"],
    },
    ResourceDef {
        name: "accounts",
        table: "accounts",
        id_generated: true,
        fields: ACCOUNT_FIELDS,
        stage_column: None,
        position_column: None,
        search_columns: &["name", "industry"],
    },
    ResourceDef {
        name: "deals",
        table: "deals",
        id_generated: true,
        fields: DEAL_FIELDS,
        stage_column: Some("stage"),
        position_column: Some("position"),
        search_columns: &["title", "notes"],
    },
    ResourceDef {
        name: "tasks",
        table: "tasks",
        id_generated: true,
        fields: TASK_FIELDS,
        stage_column: Some("status"),
        position_column: Some("position"),
        search_columns: &["title", "description"],
    },
    ResourceDef {
        name: "calendar",
        table: "calendar_events",
        id_generated: true,
        fields: CALENDAR_FIELDS,
        stage_column: None,
        position_column: None,
        search_columns: &["title", "location"],
    },
    ResourceDef {
        name: "emails",
        table: "emails",
        id_generated: true,
        fields: EMAIL_FIELDS,
        stage_column: Some("status"),
        position_column: None,
        search_columns: &["subject", "to_address"],
    },
    ResourceDef {
        name: "sales",
        table: "sales_entries",
        id_generated: true,
        fields: SALES_FIELDS,
        stage_column: None,
        position_column: None,
        search_columns: &["product_name"],
    },
    ResourceDef {
        name: "users",
        table: "users",
        id_generated: false,
        fields: USER_FIELDS,
        stage_column: None,
        position_column: None,
        search_columns: &["email", "full_name"],
    },
];

/// Look up a resource by its API name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static ResourceDef> {
    RESOURCES.iter().find(|def| def.name == name)
}

#[cfg(test)]
#[path = "resources_test.rs"]
mod tests;
