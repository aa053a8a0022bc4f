//! Postgres-backed table store.
//!
//! Rows are exchanged as JSONB: filters use containment over `to_jsonb(t.*)`
//! and writes go through `jsonb_populate_record`, so a payload naming a column
//! the table lacks fails with SQLSTATE 42703 and maps to
//! [`StoreErrorKind::SchemaMismatch`].

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use sqlx::PgPool;

use crate::metrics::{record_pool_metrics, QueryTimer};
use crate::store::{
    reject_unfiltered, Condition, Filter, Operation, Row, Select, StoreError, StoreErrorKind,
    Table, TableStore,
};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid identifier regex");
}

/// Table store over a Postgres pool.
#[derive(Clone)]
pub struct PgTableStore {
    pool: PgPool,
}

impl PgTableStore {
    /// Creates a new PgTableStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let kind = match db.code().as_deref() {
                    Some("42703") | Some("42P01") => StoreErrorKind::SchemaMismatch,
                    Some("42501") => StoreErrorKind::PermissionDenied,
                    Some("23505") => StoreErrorKind::Conflict,
                    Some("23503") => StoreErrorKind::ForeignKey,
                    Some("23502") | Some("22P02") | Some("22007") | Some("22008") => {
                        StoreErrorKind::InvalidQuery
                    }
                    _ => crate::store::classify_message(db.message()),
                };
                StoreError::new(kind, db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::new(StoreErrorKind::Unavailable, err.to_string())
            }
            _ => StoreError::new(StoreErrorKind::Other, err.to_string()),
        }
    }
}

fn ident(name: &str) -> Result<String, StoreError> {
    if IDENTIFIER.is_match(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(StoreError::new(
            StoreErrorKind::InvalidQuery,
            format!("invalid identifier: {}", name),
        ))
    }
}

/// Builds the WHERE clause for `filter`. Equality predicates become a single
/// JSONB containment bound at `$param`.
fn where_clause(filter: &Filter, param: usize) -> Result<(String, Value), StoreError> {
    let mut containment = serde_json::Map::new();
    let mut clauses = vec![format!("to_jsonb(t.*) @> ${}::jsonb", param)];

    for condition in filter.conditions() {
        match condition {
            Condition::Eq(col, value) => {
                ident(col)?;
                containment.insert(col.clone(), value.clone());
            }
            Condition::IsNull(col) => clauses.push(format!("t.{} IS NULL", ident(col)?)),
        }
    }

    Ok((clauses.join(" AND "), Value::Object(containment)))
}

fn column_list(row: &Row) -> Result<Vec<String>, StoreError> {
    row.keys().map(|k| ident(k)).collect()
}

fn rows_from(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

fn query_name(table: Table, op: Operation) -> String {
    format!("{}_{}", table.name(), op.as_str())
}

#[async_trait::async_trait]
impl TableStore for PgTableStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn select(&self, table: Table, query: &Select) -> Result<Vec<Row>, StoreError> {
        let (clause, containment) = where_clause(&query.filter, 1)?;
        let mut sql = format!(
            "SELECT to_jsonb(t.*) FROM {} t WHERE {}",
            ident(table.name())?,
            clause
        );
        if let Some(order) = &query.order {
            sql.push_str(&format!(
                " ORDER BY t.{} {}",
                ident(&order.column)?,
                if order.descending { "DESC" } else { "ASC" }
            ));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let timer = QueryTimer::new(query_name(table, Operation::Select));
        let result = sqlx::query_scalar::<_, Value>(&sql)
            .bind(containment)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        Ok(rows_from(result?))
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let table_ident = ident(table.name())?;
        let timer = QueryTimer::new(query_name(table, Operation::Insert));
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            let columns = column_list(&row)?.join(", ");
            let sql = format!(
                "INSERT INTO {tbl} AS t ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::{tbl}, $1) RETURNING to_jsonb(t.*)",
                tbl = table_ident,
                cols = columns
            );
            let value = sqlx::query_scalar::<_, Value>(&sql)
                .bind(Value::Object(row))
                .fetch_one(&mut *tx)
                .await?;
            inserted.push(value);
        }

        tx.commit().await?;
        timer.record();
        Ok(rows_from(inserted))
    }

    async fn update(
        &self,
        table: Table,
        filter: &Filter,
        changes: Row,
    ) -> Result<Vec<Row>, StoreError> {
        reject_unfiltered(table, filter)?;
        if changes.is_empty() {
            return Err(StoreError::new(
                StoreErrorKind::InvalidQuery,
                format!("empty update on {}", table),
            ));
        }

        let assignments = column_list(&changes)?
            .iter()
            .map(|c| format!("{c} = p.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let (clause, containment) = where_clause(filter, 2)?;
        let sql = format!(
            "UPDATE {tbl} AS t SET {assignments} FROM jsonb_populate_record(NULL::{tbl}, $1) AS p WHERE {clause} RETURNING to_jsonb(t.*)",
            tbl = ident(table.name())?,
        );

        let timer = QueryTimer::new(query_name(table, Operation::Update));
        let result = sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Object(changes))
            .bind(containment)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        Ok(rows_from(result?))
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        reject_unfiltered(table, filter)?;
        let (clause, containment) = where_clause(filter, 1)?;
        let sql = format!(
            "DELETE FROM {} AS t WHERE {} RETURNING to_jsonb(t.*)",
            ident(table.name())?,
            clause
        );

        let timer = QueryTimer::new(query_name(table, Operation::Delete));
        let result = sqlx::query_scalar::<_, Value>(&sql)
            .bind(containment)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        Ok(rows_from(result?))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        record_pool_metrics(&self.pool);
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ident_accepts_snake_case() {
        assert_eq!(ident("payment_status").unwrap(), "\"payment_status\"");
    }

    #[test]
    fn test_ident_rejects_injection() {
        assert!(ident("name; DROP TABLE retreats").is_err());
        assert!(ident("Name").is_err());
        assert!(ident("").is_err());
    }

    #[test]
    fn test_where_clause_containment_and_null() {
        let filter = Filter::new()
            .eq("user_id", "abc")
            .is_null("consumed_at");
        let (clause, containment) = where_clause(&filter, 2).unwrap();

        assert_eq!(
            clause,
            "to_jsonb(t.*) @> $2::jsonb AND t.\"consumed_at\" IS NULL"
        );
        assert_eq!(containment, json!({ "user_id": "abc" }));
    }

    #[test]
    fn test_where_clause_rejects_bad_column() {
        let filter = Filter::new().eq("id = id OR 1=1 --", "x");
        assert!(where_clause(&filter, 1).is_err());
    }

    #[test]
    fn test_query_name() {
        assert_eq!(
            query_name(Table::AccountApprovalTokens, Operation::Update),
            "account_approval_tokens_update"
        );
    }
}
