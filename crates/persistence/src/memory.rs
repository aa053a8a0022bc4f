//! In-memory table store with optional JSON file persistence.
//!
//! Used as the local fallback backend and as the store behind tests. It
//! emulates the parts of the Postgres schema the services rely on: column
//! sets, defaults, NOT NULL, unique keys, the `registrations.retreat_id`
//! foreign key and cascade delete. Columns can be dropped or added to mimic
//! older schema versions, and faults can be injected per table and operation.

use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{
    reject_unfiltered, timestamp_value, Filter, Operation, Row, Select, StoreError,
    StoreErrorKind, Table, TableStore,
};

struct ColumnDef {
    name: &'static str,
    required: bool,
    default: ColumnDefault,
}

#[derive(Clone, Copy)]
enum ColumnDefault {
    Null,
    Uuid,
    Now,
    Bool(bool),
    Text(&'static str),
    ShirtSizes,
}

const fn col(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        required: false,
        default: ColumnDefault::Null,
    }
}

const fn required(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        required: true,
        default: ColumnDefault::Null,
    }
}

const fn with_default(name: &'static str, default: ColumnDefault) -> ColumnDef {
    ColumnDef {
        name,
        required: false,
        default,
    }
}

const RETREAT_COLUMNS: &[ColumnDef] = &[
    with_default("id", ColumnDefault::Uuid),
    required("name"),
    required("date"),
    col("end_date"),
    required("location"),
    col("what_to_bring"),
    col("payment_instructions"),
    with_default("shirt_sizes", ColumnDefault::ShirtSizes),
    col("instagram_handle"),
    col("whatsapp_group_link"),
    required("share_link"),
    with_default("is_active", ColumnDefault::Bool(true)),
    col("created_by"),
    with_default("created_at", ColumnDefault::Now),
    with_default("updated_at", ColumnDefault::Now),
];

const REGISTRATION_COLUMNS: &[ColumnDef] = &[
    with_default("id", ColumnDefault::Uuid),
    required("retreat_id"),
    required("full_name"),
    required("phone"),
    required("email"),
    col("date_of_birth"),
    col("parish"),
    with_default("has_health_issue", ColumnDefault::Bool(false)),
    col("health_issue_details"),
    col("shirt_size"),
    col("emergency_contact_name"),
    col("emergency_contact_phone"),
    with_default("payment_status", ColumnDefault::Text("pending")),
    col("payment_link"),
    col("whatsapp_group_link"),
    with_default("registered_at", ColumnDefault::Now),
    col("payment_confirmed_at"),
    with_default("terms_accepted", ColumnDefault::Bool(false)),
    col("terms_accepted_at"),
];

/// Columns older registration schemas used for the health flag.
pub const LEGACY_REGISTRATION_COLUMNS: &[&str] = &["uses_controlled_medication", "medication_details"];

const PROFILE_COLUMNS: &[ColumnDef] = &[
    required("id"),
    required("email"),
    col("full_name"),
    with_default("role", ColumnDefault::Text("participant")),
    with_default("approval_status", ColumnDefault::Text("pending")),
    col("approved_at"),
    with_default("created_at", ColumnDefault::Now),
    with_default("updated_at", ColumnDefault::Now),
];

const TOKEN_COLUMNS: &[ColumnDef] = &[
    with_default("id", ColumnDefault::Uuid),
    required("user_id"),
    required("email"),
    col("full_name"),
    required("token_hash"),
    required("expires_at"),
    col("consumed_at"),
    with_default("created_at", ColumnDefault::Now),
];

fn column_defs(table: Table) -> &'static [ColumnDef] {
    match table {
        Table::Retreats => RETREAT_COLUMNS,
        Table::Registrations => REGISTRATION_COLUMNS,
        Table::Profiles => PROFILE_COLUMNS,
        Table::AccountApprovalTokens => TOKEN_COLUMNS,
    }
}

fn unique_columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Retreats => &["id", "share_link"],
        Table::Registrations => &["id"],
        Table::Profiles => &["id"],
        Table::AccountApprovalTokens => &["id", "token_hash"],
    }
}

fn default_value(default: ColumnDefault) -> Value {
    match default {
        ColumnDefault::Null => Value::Null,
        ColumnDefault::Uuid => Value::String(Uuid::new_v4().to_string()),
        ColumnDefault::Now => timestamp_value(Utc::now()),
        ColumnDefault::Bool(b) => Value::Bool(b),
        ColumnDefault::Text(s) => Value::String(s.to_string()),
        ColumnDefault::ShirtSizes => serde_json::json!(["P", "M", "G", "GG", "XG"]),
    }
}

/// Live column set of one table.
#[derive(Clone)]
struct Schema {
    columns: Vec<String>,
}

impl Schema {
    fn for_table(table: Table) -> Self {
        Self {
            columns: column_defs(table).iter().map(|c| c.name.to_string()).collect(),
        }
    }

    fn has(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<Table, Vec<Row>>,
    schemas: HashMap<Table, Schema>,
}

impl State {
    fn new() -> Self {
        let schemas = Table::ALL
            .iter()
            .map(|t| (*t, Schema::for_table(*t)))
            .collect();
        Self {
            tables: HashMap::new(),
            schemas,
        }
    }

    fn schema(&self, table: Table) -> Schema {
        self.schemas
            .get(&table)
            .cloned()
            .unwrap_or_else(|| Schema::for_table(table))
    }

    fn rows(&self, table: Table) -> &[Row] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }
}

struct Fault {
    table: Table,
    op: Operation,
    error: StoreError,
    remaining: Option<usize>,
}

/// In-memory [`TableStore`].
///
/// Clones and [`MemoryTableStore::elevated`] handles share the same data.
/// Injected faults belong to a single handle.
pub struct MemoryTableStore {
    state: Arc<RwLock<State>>,
    data_file: Option<PathBuf>,
    faults: Mutex<Vec<Fault>>,
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::new())),
            data_file: None,
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Opens a store persisted to `path`, loading existing rows if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut state = State::new();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: BTreeMap<Table, Vec<Row>> = serde_json::from_slice(&bytes)
                    .map_err(|e| {
                        StoreError::new(
                            StoreErrorKind::Unavailable,
                            format!("failed to parse data file {}: {}", path.display(), e),
                        )
                    })?;
                state.tables = snapshot.into_iter().collect();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StoreError::new(
                    StoreErrorKind::Unavailable,
                    format!("failed to read data file {}: {}", path.display(), e),
                ))
            }
        }

        tracing::info!(path = %path.display(), "Opened file-backed memory store");

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            data_file: Some(path),
            faults: Mutex::new(Vec::new()),
        })
    }

    /// A handle over the same data without this handle's injected faults.
    ///
    /// Stands in for a service-role connection that bypasses row-level security.
    pub fn elevated(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            data_file: self.data_file.clone(),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Removes columns from a table, mimicking an older schema.
    pub async fn drop_columns(&self, table: Table, columns: &[&str]) {
        let mut state = self.state.write().await;
        let mut schema = state.schema(table);
        schema.columns.retain(|c| !columns.contains(&c.as_str()));
        state.schemas.insert(table, schema);
    }

    /// Adds nullable columns to a table.
    pub async fn add_columns(&self, table: Table, columns: &[&str]) {
        let mut state = self.state.write().await;
        let mut schema = state.schema(table);
        for column in columns {
            if !schema.has(column) {
                schema.columns.push(column.to_string());
            }
        }
        state.schemas.insert(table, schema);
    }

    /// Makes every `op` on `table` through this handle fail with `error`.
    pub fn inject_fault(&self, table: Table, op: Operation, error: StoreError) {
        self.push_fault(table, op, error, None);
    }

    /// Makes the next `op` on `table` through this handle fail with `error`.
    pub fn inject_fault_once(&self, table: Table, op: Operation, error: StoreError) {
        self.push_fault(table, op, error, Some(1));
    }

    /// Snapshot of a table's rows, in insertion order.
    pub async fn dump(&self, table: Table) -> Vec<Row> {
        self.state.read().await.rows(table).to_vec()
    }

    fn push_fault(&self, table: Table, op: Operation, error: StoreError, remaining: Option<usize>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(Fault {
                table,
                op,
                error,
                remaining,
            });
        }
    }

    fn take_fault(&self, table: Table, op: Operation) -> Result<(), StoreError> {
        let Ok(mut faults) = self.faults.lock() else {
            return Ok(());
        };
        let Some(idx) = faults.iter().position(|f| f.table == table && f.op == op) else {
            return Ok(());
        };

        let error = faults[idx].error.clone();
        if let Some(remaining) = faults[idx].remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                faults.remove(idx);
            }
        }
        Err(error)
    }

    async fn persist(&self, state: &State) -> Result<(), StoreError> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };

        let snapshot: BTreeMap<Table, &Vec<Row>> =
            state.tables.iter().map(|(t, rows)| (*t, rows)).collect();
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|e| {
            StoreError::new(StoreErrorKind::Other, format!("failed to encode data file: {}", e))
        })?;

        let tmp = path.with_extension("tmp");
        let write = async {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, path).await
        };
        write.await.map_err(|e| {
            StoreError::new(
                StoreErrorKind::Unavailable,
                format!("failed to write data file {}: {}", path.display(), e),
            )
        })
    }
}

fn schema_mismatch(table: Table, column: &str) -> StoreError {
    StoreError::new(
        StoreErrorKind::SchemaMismatch,
        format!(
            "Could not find the '{}' column of '{}' in the schema cache",
            column, table
        ),
    )
}

fn check_columns(table: Table, schema: &Schema, row: &Row) -> Result<(), StoreError> {
    match row.keys().find(|k| !schema.has(k)) {
        Some(unknown) => Err(schema_mismatch(table, unknown)),
        None => Ok(()),
    }
}

fn check_unique(table: Table, existing: &[Row], row: &Row, skip: Option<usize>) -> Result<(), StoreError> {
    for column in unique_columns(table) {
        let Some(value) = row.get(*column).filter(|v| !v.is_null()) else {
            continue;
        };
        let clash = existing
            .iter()
            .enumerate()
            .any(|(i, other)| Some(i) != skip && other.get(*column) == Some(value));
        if clash {
            return Err(StoreError::new(
                StoreErrorKind::Conflict,
                format!(
                    "duplicate key value violates unique constraint \"{}_{}_key\"",
                    table, column
                ),
            ));
        }
    }
    Ok(())
}

fn check_foreign_keys(state: &State, table: Table, row: &Row) -> Result<(), StoreError> {
    if table != Table::Registrations {
        return Ok(());
    }
    let retreat_id = row.get("retreat_id").cloned().unwrap_or(Value::Null);
    let exists = state
        .rows(Table::Retreats)
        .iter()
        .any(|r| r.get("id") == Some(&retreat_id));
    if exists {
        Ok(())
    } else {
        Err(StoreError::new(
            StoreErrorKind::ForeignKey,
            "insert or update on table \"registrations\" violates foreign key constraint \"registrations_retreat_id_fkey\"",
        ))
    }
}

fn check_not_null(table: Table, schema: &Schema, row: &Row) -> Result<(), StoreError> {
    for def in column_defs(table) {
        if def.required && schema.has(def.name) && row.get(def.name).map_or(true, Value::is_null) {
            return Err(StoreError::new(
                StoreErrorKind::InvalidQuery,
                format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    def.name, table
                ),
            ));
        }
    }
    Ok(())
}

/// Fills defaults for absent columns of the live schema.
fn complete_row(table: Table, schema: &Schema, mut row: Row) -> Row {
    for name in &schema.columns {
        if row.contains_key(name) {
            continue;
        }
        let default = column_defs(table)
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.default)
            .unwrap_or(ColumnDefault::Null);
        row.insert(name.clone(), default_value(default));
    }
    row
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait::async_trait]
impl TableStore for MemoryTableStore {
    fn backend(&self) -> &'static str {
        if self.data_file.is_some() {
            "file"
        } else {
            "memory"
        }
    }

    async fn select(&self, table: Table, query: &Select) -> Result<Vec<Row>, StoreError> {
        self.take_fault(table, Operation::Select)?;
        let state = self.state.read().await;

        let mut rows: Vec<Row> = state
            .rows(table)
            .iter()
            .filter(|r| query.filter.matches(r))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        self.take_fault(table, Operation::Insert)?;
        let mut state = self.state.write().await;
        let schema = state.schema(table);

        // Validate the whole batch before touching the table.
        let mut staged: Vec<Row> = Vec::with_capacity(rows.len());
        for row in rows {
            check_columns(table, &schema, &row)?;
            let row = complete_row(table, &schema, row);
            check_not_null(table, &schema, &row)?;
            check_foreign_keys(&state, table, &row)?;

            let mut combined = state.rows(table).to_vec();
            combined.extend(staged.iter().cloned());
            check_unique(table, &combined, &row, None)?;
            staged.push(row);
        }

        state
            .tables
            .entry(table)
            .or_default()
            .extend(staged.iter().cloned());
        self.persist(&state).await?;
        Ok(staged)
    }

    async fn update(
        &self,
        table: Table,
        filter: &Filter,
        changes: Row,
    ) -> Result<Vec<Row>, StoreError> {
        self.take_fault(table, Operation::Update)?;
        reject_unfiltered(table, filter)?;
        let mut state = self.state.write().await;
        let schema = state.schema(table);
        check_columns(table, &schema, &changes)?;

        let existing = state.rows(table).to_vec();
        let mut next = existing.clone();
        let mut updated = Vec::new();

        for (idx, row) in next.iter_mut().enumerate() {
            if !filter.matches(row) {
                continue;
            }
            for (k, v) in &changes {
                row.insert(k.clone(), v.clone());
            }
            check_not_null(table, &schema, row)?;
            check_foreign_keys(&state, table, row)?;
            check_unique(table, &existing, row, Some(idx))?;
            updated.push(row.clone());
        }

        if !updated.is_empty() {
            state.tables.insert(table, next);
            self.persist(&state).await?;
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        self.take_fault(table, Operation::Delete)?;
        reject_unfiltered(table, filter)?;
        let mut state = self.state.write().await;

        let (deleted, kept): (Vec<Row>, Vec<Row>) = state
            .rows(table)
            .iter()
            .cloned()
            .partition(|r| filter.matches(r));

        if deleted.is_empty() {
            return Ok(deleted);
        }
        state.tables.insert(table, kept);

        if table == Table::Retreats {
            let ids: HashSet<String> = deleted
                .iter()
                .filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string))
                .collect();
            if let Some(registrations) = state.tables.get_mut(&Table::Registrations) {
                registrations.retain(|r| {
                    r.get("retreat_id")
                        .and_then(Value::as_str)
                        .map_or(true, |id| !ids.contains(id))
                });
            }
        }

        self.persist(&state).await?;
        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _state = self.state.read().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Select;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn retreat_row(share: &str) -> Row {
        row(json!({
            "name": "Retiro",
            "date": "2026-03-06",
            "location": "Capela",
            "share_link": share,
        }))
    }

    async fn seed_retreat(store: &MemoryTableStore, share: &str) -> String {
        let rows = store
            .insert(Table::Retreats, vec![retreat_row(share)])
            .await
            .unwrap();
        rows[0]["id"].as_str().unwrap().to_string()
    }

    fn registration_row(retreat_id: &str, email: &str) -> Row {
        row(json!({
            "retreat_id": retreat_id,
            "full_name": "Maria",
            "phone": "11987654321",
            "email": email,
        }))
    }

    #[tokio::test]
    async fn test_insert_fills_defaults() {
        let store = MemoryTableStore::new();
        let id = seed_retreat(&store, "abc").await;
        let inserted = store
            .insert(Table::Registrations, vec![registration_row(&id, "m@example.com")])
            .await
            .unwrap();

        let r = &inserted[0];
        assert_eq!(r["payment_status"], json!("pending"));
        assert_eq!(r["payment_confirmed_at"], Value::Null);
        assert_eq!(r["has_health_issue"], json!(false));
        assert!(r["id"].as_str().is_some());
        assert!(r["registered_at"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_unknown_column_is_schema_mismatch() {
        let store = MemoryTableStore::new();
        let mut r = retreat_row("abc");
        r.insert("banner_url".to_string(), json!("x"));

        let err = store.insert(Table::Retreats, vec![r]).await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::SchemaMismatch);
        assert!(err.message.contains("banner_url"));
    }

    #[tokio::test]
    async fn test_dropped_column_is_schema_mismatch() {
        let store = MemoryTableStore::new();
        store.drop_columns(Table::Retreats, &["end_date"]).await;
        let mut r = retreat_row("abc");
        r.insert("end_date".to_string(), json!("2026-03-08"));

        let err = store.insert(Table::Retreats, vec![r]).await.unwrap_err();
        assert!(err.is_schema_mismatch());
        assert!(err.mentions_column("end_date"));
    }

    #[tokio::test]
    async fn test_missing_required_column() {
        let store = MemoryTableStore::new();
        let err = store
            .insert(Table::Retreats, vec![row(json!({ "name": "x" }))])
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidQuery);
    }

    #[tokio::test]
    async fn test_unique_share_link() {
        let store = MemoryTableStore::new();
        seed_retreat(&store, "same").await;
        let err = store
            .insert(Table::Retreats, vec![retreat_row("same")])
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_foreign_key_enforced() {
        let store = MemoryTableStore::new();
        let err = store
            .insert(
                Table::Registrations,
                vec![registration_row(&Uuid::new_v4().to_string(), "a@b.co")],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::ForeignKey);
    }

    #[tokio::test]
    async fn test_select_order_and_limit() {
        let store = MemoryTableStore::new();
        for (share, date) in [("a", "2026-01-01"), ("b", "2026-03-01"), ("c", "2026-02-01")] {
            let mut r = retreat_row(share);
            r.insert("date".to_string(), json!(date));
            store.insert(Table::Retreats, vec![r]).await.unwrap();
        }

        let rows = store
            .select(Table::Retreats, &Select::default().order_by("date", true))
            .await
            .unwrap();
        let shares: Vec<_> = rows.iter().map(|r| r["share_link"].clone()).collect();
        assert_eq!(shares, vec![json!("b"), json!("c"), json!("a")]);

        let limited = store
            .select(Table::Retreats, &Select::default().order_by("date", false).limit(1))
            .await
            .unwrap();
        assert_eq!(limited[0]["share_link"], json!("a"));
    }

    #[tokio::test]
    async fn test_update_returns_matched_rows() {
        let store = MemoryTableStore::new();
        let id = seed_retreat(&store, "abc").await;

        let mut changes = Row::new();
        changes.insert("whatsapp_group_link".to_string(), json!("https://chat.whatsapp.com/x"));
        let updated = store
            .update(Table::Retreats, &Filter::new().eq("id", id.clone()), changes.clone())
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["whatsapp_group_link"], json!("https://chat.whatsapp.com/x"));

        let none = store
            .update(Table::Retreats, &Filter::new().eq("id", "missing"), changes)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_unfiltered_update_rejected() {
        let store = MemoryTableStore::new();
        let err = store
            .update(Table::Retreats, &Filter::new(), Row::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidQuery);
    }

    #[tokio::test]
    async fn test_delete_retreat_cascades() {
        let store = MemoryTableStore::new();
        let keep = seed_retreat(&store, "keep").await;
        let gone = seed_retreat(&store, "gone").await;
        store
            .insert(
                Table::Registrations,
                vec![registration_row(&keep, "a@x.co"), registration_row(&gone, "b@x.co")],
            )
            .await
            .unwrap();

        let deleted = store
            .delete(Table::Retreats, &Filter::new().eq("id", gone))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);

        let remaining = store.dump(Table::Registrations).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["retreat_id"], json!(keep));
    }

    #[tokio::test]
    async fn test_fault_injection_is_per_handle() {
        let store = MemoryTableStore::new();
        let id = seed_retreat(&store, "abc").await;
        store.inject_fault(
            Table::Registrations,
            Operation::Insert,
            StoreError::new(StoreErrorKind::PermissionDenied, "new row violates row-level security policy"),
        );

        let err = store
            .insert(Table::Registrations, vec![registration_row(&id, "a@x.co")])
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());

        let elevated = store.elevated();
        elevated
            .insert(Table::Registrations, vec![registration_row(&id, "a@x.co")])
            .await
            .unwrap();
        assert_eq!(store.dump(Table::Registrations).await.len(), 1);
    }

    #[tokio::test]
    async fn test_fault_once() {
        let store = MemoryTableStore::new();
        store.inject_fault_once(
            Table::Profiles,
            Operation::Select,
            StoreError::new(StoreErrorKind::Unavailable, "timeout"),
        );
        assert!(store.select(Table::Profiles, &Select::default()).await.is_err());
        assert!(store.select(Table::Profiles, &Select::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_file_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = MemoryTableStore::open(&path).await.unwrap();
            assert_eq!(store.backend(), "file");
            seed_retreat(&store, "persisted").await;
        }

        let reopened = MemoryTableStore::open(&path).await.unwrap();
        let rows = reopened
            .select(
                Table::Retreats,
                &Select::new(Filter::new().eq("share_link", "persisted")),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = MemoryTableStore::open(&path).await.err().unwrap();
        assert_eq!(err.kind, StoreErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_legacy_columns_can_be_added() {
        let store = MemoryTableStore::new();
        let id = seed_retreat(&store, "abc").await;
        store
            .drop_columns(Table::Registrations, &["has_health_issue", "health_issue_details"])
            .await;
        store
            .add_columns(Table::Registrations, LEGACY_REGISTRATION_COLUMNS)
            .await;

        let mut r = registration_row(&id, "a@x.co");
        r.insert("uses_controlled_medication".to_string(), json!(true));
        let inserted = store.insert(Table::Registrations, vec![r]).await.unwrap();
        assert_eq!(inserted[0]["uses_controlled_medication"], json!(true));
        assert!(!inserted[0].contains_key("has_health_issue"));
    }
}
