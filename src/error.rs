use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

/// Which persistence step failed; picks the wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Query,
    Insert,
    Update,
    Delete,
    Transaction,
}

impl Op {
    fn code(self) -> &'static str {
        match self {
            Op::Query => "db_query_failed",
            Op::Insert => "db_insert_failed",
            Op::Update => "db_update_failed",
            Op::Delete => "db_delete_failed",
            Op::Transaction => "db_tx_failed",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Op::Query => "query",
            Op::Insert => "insert into",
            Op::Update => "update",
            Op::Delete => "delete from",
            Op::Transaction => "run transaction on",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{message}")]
    Duplicate {
        table: String,
        field: Option<String>,
        message: String,
    },
    #[error("{0}")]
    BadParams(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("select a workspace first")]
    NoWorkspace,
    #[error("{0}")]
    Forbidden(String),
    #[error("failed to {op} {table}: {source}")]
    Persistence {
        op: Op,
        table: String,
        #[source]
        source: StoreError,
    },
}

impl AdminError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        AdminError::BadParams(message.into())
    }

    pub fn persistence(op: Op, table: &str, source: StoreError) -> Self {
        AdminError::Persistence {
            op,
            table: table.to_string(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AdminError::Duplicate { .. } => "duplicate",
            AdminError::BadParams(_) => "bad_params",
            AdminError::NotFound(_) => "not_found",
            AdminError::NoWorkspace => "no_workspace",
            AdminError::Forbidden(_) => "forbidden",
            AdminError::Persistence { op, .. } => op.code(),
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            AdminError::Duplicate { table, field, .. } => {
                Some(json!({ "table": table, "field": field }))
            }
            AdminError::Persistence { table, .. } => Some(json!({ "table": table })),
            _ => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, AdminError::Duplicate { .. })
    }
}

impl From<rusqlite::Error> for AdminError {
    fn from(e: rusqlite::Error) -> Self {
        AdminError::persistence(Op::Transaction, "workspace", StoreError::Sqlite(e))
    }
}
