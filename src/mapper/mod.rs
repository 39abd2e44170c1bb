//! Row Mapper: domain shape <-> row shape.
//!
//! `from_row` and `to_row` never fail. Input validation happens once, in each
//! entity's `from_params`, which is also where legacy field aliases are folded
//! into the typed struct.

mod entities;
mod params;

pub use entities::*;
pub use params::Params;

use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::error::AdminError;
use crate::store::{Backend, Row, StoreError};

pub trait Entity: Sized + Serialize {
    /// Backing table.
    const TABLE: &'static str;
    /// Method prefix, e.g. `subCategories` for `subCategories.list`.
    const PREFIX: &'static str;
    /// Response key for a single record.
    const KEY: &'static str;
    /// Human label used in messages.
    const LABEL: &'static str;
    const ORDER_BY: &'static [&'static str];

    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);

    fn from_row(row: &Row) -> Self;
    fn to_row(&self) -> Row;
    fn from_params(params: &Params<'_>) -> Result<Self, AdminError>;

    /// Stamps fields that only make sense on first insert.
    fn before_insert(&mut self) {}

    /// Removes dependent rows ahead of deleting `id`.
    fn cascade(_store: &dyn Backend, _id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

pub(crate) fn build_row<const N: usize>(id: Option<&str>, cells: [(&str, Value); N]) -> Row {
    let mut row = Row::new();
    if let Some(id) = id {
        row.insert("id".into(), Value::String(id.to_string()));
    }
    for (column, value) in cells {
        row.insert(column.to_string(), value);
    }
    row
}

pub(crate) fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

pub(crate) fn opt_text(s: &Option<String>) -> Value {
    s.as_ref().map_or(Value::Null, |s| Value::String(s.clone()))
}

pub(crate) fn opt_int(n: Option<i64>) -> Value {
    n.map_or(Value::Null, Value::from)
}

pub(crate) fn opt_num(n: Option<f64>) -> Value {
    n.map_or(Value::Null, Value::from)
}

pub(crate) fn flag(b: bool) -> Value {
    Value::from(i64::from(b))
}

/// Renders a scalar the way a text field would hold it.
pub(crate) fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn cell_text(row: &Row, column: &str) -> String {
    row.get(column).and_then(scalar_text).unwrap_or_default()
}

pub(crate) fn cell_opt_text(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(scalar_text)
}

pub(crate) fn cell_int(row: &Row, column: &str) -> Option<i64> {
    let v = row.get(column)?;
    match v {
        Value::Null => None,
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!("ignoring non-integer value {:?} in column {}", s, column);
                None
            }
        },
        other => {
            warn!("ignoring non-integer value {} in column {}", other, column);
            None
        }
    }
}

pub(crate) fn cell_num(row: &Row, column: &str) -> Option<f64> {
    let v = row.get(column)?;
    match v {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => {
                warn!("ignoring non-numeric value {:?} in column {}", s, column);
                None
            }
        },
        other => {
            warn!("ignoring non-numeric value {} in column {}", other, column);
            None
        }
    }
}

pub(crate) fn cell_flag(row: &Row, column: &str) -> bool {
    match row.get(column) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "TRUE" | "yes"),
        _ => false,
    }
}

/// Accepts a list, a JSON-encoded list, or a newline/comma delimited string.
/// Empty entries are dropped.
pub fn parse_list(v: &Value) -> Vec<String> {
    let items: Vec<String> = match v {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed
                .starts_with('[')
                .then(|| serde_json::from_str::<Vec<Value>>(trimmed).ok())
                .flatten()
            {
                Some(items) => items.iter().filter_map(scalar_text).collect(),
                None => trimmed
                    .split(|c| c == '\n' || c == ',')
                    .map(str::to_string)
                    .collect(),
            }
        }
        other => scalar_text(other).into_iter().collect(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn encode_list(items: &[String]) -> Value {
    Value::String(serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string()))
}

/// `ceil(semesters / 2)`.
pub fn derive_duration(semesters: Option<i64>) -> Option<i64> {
    semesters.filter(|s| *s >= 0).map(|s| (s + 1) / 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_list_accepts_every_stored_shape() {
        assert_eq!(
            parse_list(&json!(["Maths", "", "Physics"])),
            vec!["Maths", "Physics"]
        );
        assert_eq!(
            parse_list(&json!("[\"Maths\",\"Physics\"]")),
            vec!["Maths", "Physics"]
        );
        assert_eq!(
            parse_list(&json!("Maths\nPhysics, Chemistry\n\n")),
            vec!["Maths", "Physics", "Chemistry"]
        );
        assert!(parse_list(&Value::Null).is_empty());
        assert!(parse_list(&json!("")).is_empty());
    }

    #[test]
    fn encoded_list_reads_back() {
        let items = vec!["English".to_string(), "Telugu".to_string()];
        assert_eq!(parse_list(&encode_list(&items)), items);
    }

    #[test]
    fn duration_rounds_up_half_semesters() {
        assert_eq!(derive_duration(Some(6)), Some(3));
        assert_eq!(derive_duration(Some(5)), Some(3));
        assert_eq!(derive_duration(Some(0)), Some(0));
        assert_eq!(derive_duration(None), None);
    }

    #[test]
    fn row_cells_coerce_without_failing() {
        let row = json!({
            "semester": "4",
            "amount": "1250.50",
            "bad": "abc",
            "active": 1,
            "code": 101
        });
        let row = row.as_object().cloned().expect("object");
        assert_eq!(cell_int(&row, "semester"), Some(4));
        assert_eq!(cell_num(&row, "amount"), Some(1250.5));
        assert_eq!(cell_int(&row, "bad"), None);
        assert_eq!(cell_num(&row, "missing"), None);
        assert!(cell_flag(&row, "active"));
        assert_eq!(cell_text(&row, "code"), "101");
        assert_eq!(cell_text(&row, "missing"), "");
    }
}
