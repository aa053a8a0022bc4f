//! Table-oriented store abstraction.
//!
//! Every repository talks to a [`TableStore`]: a uniform select / insert /
//! update / delete interface over the four logical tables. Rows travel as JSON
//! objects so the same repository code runs against Postgres and against the
//! in-memory (optionally file-backed) store.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A single table row.
pub type Row = serde_json::Map<String, Value>;

/// Store handle shared across services.
pub type SharedStore = Arc<dyn TableStore>;

/// Logical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Retreats,
    Registrations,
    Profiles,
    AccountApprovalTokens,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Retreats,
        Table::Registrations,
        Table::Profiles,
        Table::AccountApprovalTokens,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Retreats => "retreats",
            Table::Registrations => "registrations",
            Table::Profiles => "profiles",
            Table::AccountApprovalTokens => "account_approval_tokens",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single predicate over a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    IsNull(String),
}

/// Conjunction of column predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    /// Equality against any serializable value (uuids, dates).
    pub fn eq_ser<T: Serialize>(self, column: &str, value: T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.eq(column, value)
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition::IsNull(column.to_string()));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluates the filter against a row. Missing columns read as null.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| match c {
            Condition::Eq(col, expected) => row.get(col).unwrap_or(&Value::Null) == expected,
            Condition::IsNull(col) => row.get(col).map_or(true, Value::is_null),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// A select query: filter, optional ordering, optional row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub filter: Filter,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Store operation, used for metrics and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The payload names a column the current schema does not have.
    SchemaMismatch,
    /// Row-level security or grant denial.
    PermissionDenied,
    /// Unique constraint violation.
    Conflict,
    /// Foreign key violation.
    ForeignKey,
    /// Store unreachable or timed out.
    Unavailable,
    /// Malformed query or value.
    InvalidQuery,
    Other,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::SchemaMismatch => "schema_mismatch",
            StoreErrorKind::PermissionDenied => "permission_denied",
            StoreErrorKind::Conflict => "conflict",
            StoreErrorKind::ForeignKey => "foreign_key",
            StoreErrorKind::Unavailable => "unavailable",
            StoreErrorKind::InvalidQuery => "invalid_query",
            StoreErrorKind::Other => "other",
        }
    }
}

/// Error returned across the store boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_schema_mismatch(&self) -> bool {
        self.kind == StoreErrorKind::SchemaMismatch
    }

    pub fn is_permission_denied(&self) -> bool {
        self.kind == StoreErrorKind::PermissionDenied
    }

    /// Whether the message names `column`, e.g. to drop it from a retried payload.
    pub fn mentions_column(&self, column: &str) -> bool {
        self.message.to_lowercase().contains(&column.to_lowercase())
    }
}

/// Infers an error kind from a provider message.
///
/// Row-level-security phrases win over column phrases: a message such as
/// "new row violates row-level security policy" must not read as a schema issue.
pub fn classify_message(message: &str) -> StoreErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("row-level security")
        || lower.contains("new row violates")
        || lower.contains("42501")
        || lower.contains("permission denied")
    {
        return StoreErrorKind::PermissionDenied;
    }

    if lower.contains("could not find") || lower.contains("column") || lower.contains("schema cache")
    {
        return StoreErrorKind::SchemaMismatch;
    }

    if lower.contains("duplicate key") {
        return StoreErrorKind::Conflict;
    }

    if lower.contains("foreign key") {
        return StoreErrorKind::ForeignKey;
    }

    StoreErrorKind::Other
}

/// Uniform table store.
///
/// Errors are returned, never panicked. Update and delete require a non-empty
/// filter.
#[async_trait::async_trait]
pub trait TableStore: Send + Sync {
    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;

    async fn select(&self, table: Table, query: &Select) -> Result<Vec<Row>, StoreError>;

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    async fn update(&self, table: Table, filter: &Filter, changes: Row)
        -> Result<Vec<Row>, StoreError>;

    async fn delete(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Fetches at most one row.
    async fn select_one(&self, table: Table, filter: Filter) -> Result<Option<Row>, StoreError> {
        let rows = self.select(table, &Select::new(filter).limit(1)).await?;
        Ok(rows.into_iter().next())
    }
}

/// Canonical timestamp encoding used in rows (RFC 3339, microseconds, `Z`).
pub fn timestamp_value(dt: DateTime<Utc>) -> Value {
    Value::String(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Decodes a row into a typed entity.
pub fn decode_row<T: DeserializeOwned>(table: Table, row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| {
        StoreError::new(
            StoreErrorKind::Other,
            format!("failed to decode {} row: {}", table, e),
        )
    })
}

pub(crate) fn reject_unfiltered(table: Table, filter: &Filter) -> Result<(), StoreError> {
    if filter.is_empty() {
        Err(StoreError::new(
            StoreErrorKind::InvalidQuery,
            format!("refusing unfiltered write on {}", table),
        ))
    } else {
        Ok(())
    }
}
