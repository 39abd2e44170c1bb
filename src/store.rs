//! Table-scoped persistence boundary.
//!
//! Everything above this module speaks in row shape: a flat map from column
//! name to JSON scalar. `SqliteStore` is the only real backend; tests use the
//! in-memory one under `store::memory`.

use log::debug;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use thiserror::Error;

pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend declined the shape of a filter or identifier.
    #[error("rejected filter on {table}.{column}: {reason}")]
    Rejected {
        table: String,
        column: String,
        reason: String,
    },
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Scripted failure from the in-memory test backend.
    #[cfg(test)]
    #[error("{0}")]
    Unavailable(String),
}

/// Equality filter on one column.
pub type Filter<'a> = (&'a str, &'a Value);

pub trait Backend {
    /// Full-table fetch ordered by the given columns.
    fn select_all(&self, table: &str, order_by: &[&str]) -> Result<Vec<Row>, StoreError>;

    /// Zero-or-one row by key.
    fn get(&self, table: &str, key_column: &str, key: &str) -> Result<Option<Row>, StoreError>;

    /// Key of at most one row matching every filter, skipping `exclude`.
    fn find_key(
        &self,
        table: &str,
        key_column: &str,
        filters: &[Filter<'_>],
        exclude: Option<&str>,
    ) -> Result<Option<Value>, StoreError>;

    /// Every row projected onto `columns`.
    fn project(&self, table: &str, columns: &[&str]) -> Result<Vec<Row>, StoreError>;

    fn insert(&self, table: &str, row: &Row) -> Result<(), StoreError>;

    fn update(&self, table: &str, key_column: &str, key: &str, row: &Row)
        -> Result<usize, StoreError>;

    fn delete(&self, table: &str, key_column: &str, key: &str) -> Result<usize, StoreError>;

    fn delete_where(&self, table: &str, filters: &[Filter<'_>]) -> Result<usize, StoreError>;

    /// Insert, or overwrite the non-conflict columns of the row that matches on `conflict`.
    fn upsert(&self, table: &str, conflict: &[&str], row: &Row) -> Result<(), StoreError>;
}

pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn query_rows(&self, sql: &str, binds: Vec<SqlValue>) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt
            .query_map(params_from_iter(binds), |row| {
                let mut out = Row::new();
                for (i, name) in names.iter().enumerate() {
                    out.insert(name.clone(), from_sql(row.get_ref(i)?));
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn quote(table: &str, ident: &str) -> Result<String, StoreError> {
    let valid = !ident.is_empty()
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(StoreError::Rejected {
            table: table.to_string(),
            column: ident.to_string(),
            reason: "invalid identifier".into(),
        });
    }
    Ok(format!("\"{}\"", ident))
}

fn quote_all(table: &str, idents: &[&str]) -> Result<Vec<String>, StoreError> {
    idents.iter().map(|c| quote(table, c)).collect()
}

/// Binds a filter value. Lists and objects have no column representation.
fn filter_value(table: &str, column: &str, v: &Value) -> Result<SqlValue, StoreError> {
    match v {
        Value::Array(_) | Value::Object(_) => Err(StoreError::Rejected {
            table: table.to_string(),
            column: column.to_string(),
            reason: "filter value must be a scalar".into(),
        }),
        other => Ok(to_sql(other)),
    }
}

fn to_sql(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        nested => SqlValue::Text(nested.to_string()),
    }
}

fn from_sql(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

fn where_clause(
    table: &str,
    filters: &[Filter<'_>],
    binds: &mut Vec<SqlValue>,
) -> Result<String, StoreError> {
    let mut parts = Vec::with_capacity(filters.len());
    for (column, value) in filters {
        parts.push(format!("{} = ?", quote(table, column)?));
        binds.push(filter_value(table, column, value)?);
    }
    Ok(parts.join(" AND "))
}

impl Backend for SqliteStore<'_> {
    fn select_all(&self, table: &str, order_by: &[&str]) -> Result<Vec<Row>, StoreError> {
        let mut sql = format!("SELECT * FROM {}", quote(table, table)?);
        if !order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&quote_all(table, order_by)?.join(", "));
        }
        self.query_rows(&sql, Vec::new())
    }

    fn get(&self, table: &str, key_column: &str, key: &str) -> Result<Option<Row>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote(table, table)?,
            quote(table, key_column)?
        );
        let mut rows = self.query_rows(&sql, vec![SqlValue::Text(key.to_string())])?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    fn find_key(
        &self,
        table: &str,
        key_column: &str,
        filters: &[Filter<'_>],
        exclude: Option<&str>,
    ) -> Result<Option<Value>, StoreError> {
        let key = quote(table, key_column)?;
        let mut binds = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            key,
            quote(table, table)?,
            where_clause(table, filters, &mut binds)?
        );
        if let Some(id) = exclude {
            sql.push_str(&format!(" AND {} <> ?", key));
            binds.push(SqlValue::Text(id.to_string()));
        }
        sql.push_str(" LIMIT 1");

        let found = self
            .conn
            .query_row(&sql, params_from_iter(binds), |r| Ok(from_sql(r.get_ref(0)?)))
            .optional()?;
        Ok(found)
    }

    fn project(&self, table: &str, columns: &[&str]) -> Result<Vec<Row>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {}",
            quote_all(table, columns)?.join(", "),
            quote(table, table)?
        );
        self.query_rows(&sql, Vec::new())
    }

    fn insert(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let sql = format!(
            "INSERT INTO {}({}) VALUES({})",
            quote(table, table)?,
            quote_all(table, &columns)?.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        debug!("insert into {} ({} columns)", table, columns.len());
        self.conn
            .execute(&sql, params_from_iter(row.values().map(to_sql)))?;
        Ok(())
    }

    fn update(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
        row: &Row,
    ) -> Result<usize, StoreError> {
        let mut sets = Vec::new();
        let mut binds = Vec::new();
        for (column, value) in row {
            if column == key_column {
                continue;
            }
            sets.push(format!("{} = ?", quote(table, column)?));
            binds.push(to_sql(value));
        }
        if sets.is_empty() {
            return Ok(0);
        }
        binds.push(SqlValue::Text(key.to_string()));
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(table, table)?,
            sets.join(", "),
            quote(table, key_column)?
        );
        debug!("update {} where {} = {}", table, key_column, key);
        Ok(self.conn.execute(&sql, params_from_iter(binds))?)
    }

    fn delete(&self, table: &str, key_column: &str, key: &str) -> Result<usize, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote(table, table)?,
            quote(table, key_column)?
        );
        debug!("delete from {} where {} = {}", table, key_column, key);
        Ok(self.conn.execute(&sql, [key])?)
    }

    fn delete_where(&self, table: &str, filters: &[Filter<'_>]) -> Result<usize, StoreError> {
        if filters.is_empty() {
            return Err(StoreError::Rejected {
                table: table.to_string(),
                column: String::new(),
                reason: "refusing unfiltered delete".into(),
            });
        }
        let mut binds = Vec::new();
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            quote(table, table)?,
            where_clause(table, filters, &mut binds)?
        );
        Ok(self.conn.execute(&sql, params_from_iter(binds))?)
    }

    fn upsert(&self, table: &str, conflict: &[&str], row: &Row) -> Result<(), StoreError> {
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let updates = columns
            .iter()
            .filter(|c| !conflict.contains(c))
            .map(|c| quote(table, c).map(|q| format!("{q} = excluded.{q}")))
            .collect::<Result<Vec<_>, _>>()?;
        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "INSERT INTO {}({}) VALUES({}) ON CONFLICT({}) {}",
            quote(table, table)?,
            quote_all(table, &columns)?.join(", "),
            vec!["?"; columns.len()].join(", "),
            quote_all(table, conflict)?.join(", "),
            action
        );
        self.conn
            .execute(&sql, params_from_iter(row.values().map(to_sql)))?;
        Ok(())
    }
}
