//! Duplicate Guard.
//!
//! Uniqueness pre-checks run before every insert and update. Each probe first
//! asks the backend for a matching key directly; if the backend rejects that
//! query, the probe scans a projection of the table and compares values as
//! text. The scan is only reasonable for small tables.

use log::{error, warn};
use serde_json::Value;

use crate::error::{AdminError, Op};
use crate::mapper::scalar_text;
use crate::store::{Backend, Filter, Row, StoreError};

#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    /// Each column is unique on its own.
    Single(&'static [&'static str]),
    /// The columns are unique together; checked only when all are present.
    Composite(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub table: &'static str,
    pub label: &'static str,
    pub kind: RuleKind,
}

static RULES: &[Rule] = &[
    Rule {
        table: "groups",
        label: "group",
        kind: RuleKind::Single(&["code"]),
    },
    Rule {
        table: "courses",
        label: "course code in this group",
        kind: RuleKind::Composite(&["group_name", "code"]),
    },
    Rule {
        table: "sub_categories",
        label: "sub-category",
        kind: RuleKind::Single(&["name"]),
    },
    Rule {
        table: "subjects",
        label: "subject set for this year, course, semester and category",
        kind: RuleKind::Composite(&["academic_year", "course_name", "semester", "category_id"]),
    },
    Rule {
        table: "students",
        label: "student",
        kind: RuleKind::Single(&["student_id", "hall_ticket_no", "aadhar_number", "email"]),
    },
    Rule {
        table: "fee_definitions",
        label: "fee definition",
        kind: RuleKind::Composite(&[
            "academic_year",
            "group_name",
            "course_name",
            "semester",
            "fee_category",
        ]),
    },
    Rule {
        table: "fee_categories",
        label: "fee category",
        kind: RuleKind::Single(&["name"]),
    },
];

pub fn rule_for(table: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.table == table)
}

#[derive(Debug, Clone, Copy)]
pub struct GuardOptions<'a> {
    /// Record being edited; never reported as a duplicate of itself.
    pub exclude_id: Option<&'a str>,
    pub key_column: &'a str,
}

impl Default for GuardOptions<'_> {
    fn default() -> Self {
        Self {
            exclude_id: None,
            key_column: "id",
        }
    }
}

impl<'a> GuardOptions<'a> {
    pub fn excluding(id: Option<&'a str>) -> Self {
        Self {
            exclude_id: id,
            ..Self::default()
        }
    }
}

/// String coercion used by the scan: `5` and `"5"` compare equal.
pub fn loose_text(v: &Value) -> String {
    match v {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
            _ => n.to_string(),
        },
        other => scalar_text(other).unwrap_or_else(|| "null".to_string()),
    }
}

fn is_present(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Phase one: let the backend do the filtering.
fn direct_probe(
    backend: &dyn Backend,
    table: &str,
    filters: &[Filter<'_>],
    opts: &GuardOptions<'_>,
) -> Result<Option<Value>, StoreError> {
    backend.find_key(table, opts.key_column, filters, opts.exclude_id)
}

/// Phase two: project the relevant columns and compare in memory.
fn scan_probe(
    backend: &dyn Backend,
    table: &str,
    filters: &[Filter<'_>],
    opts: &GuardOptions<'_>,
) -> Result<Option<Value>, StoreError> {
    let mut columns: Vec<&str> = filters.iter().map(|(c, _)| *c).collect();
    if !columns.contains(&opts.key_column) {
        columns.push(opts.key_column);
    }
    let wanted: Vec<(&str, String)> = filters.iter().map(|(c, v)| (*c, loose_text(v))).collect();

    let rows = backend.project(table, &columns)?;
    let hit = rows.iter().find(|row: &&Row| {
        let key = row.get(opts.key_column).map(loose_text);
        if opts.exclude_id.is_some() && key.as_deref() == opts.exclude_id {
            return false;
        }
        wanted.iter().all(|(c, want)| {
            row.get(*c)
                .map(|have| loose_text(have) == *want)
                .unwrap_or(false)
        })
    });
    Ok(hit.map(|row| row.get(opts.key_column).cloned().unwrap_or(Value::Null)))
}

/// Direct probe, falling back to a scan when the backend rejects the query.
pub fn probe(
    backend: &dyn Backend,
    table: &str,
    filters: &[Filter<'_>],
    opts: &GuardOptions<'_>,
) -> Result<Option<Value>, StoreError> {
    match direct_probe(backend, table, filters, opts) {
        Ok(found) => Ok(found),
        Err(e) => {
            warn!("direct duplicate lookup on {} failed ({}); scanning", table, e);
            scan_probe(backend, table, filters, opts).map_err(|scan_err| {
                error!("duplicate scan on {} failed: {}", table, scan_err);
                scan_err
            })
        }
    }
}

fn human(column: &str) -> String {
    column.replace('_', " ")
}

/// An existing row that `candidate` would duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub table: String,
    pub label: &'static str,
    /// Offending column for single-column rules; `None` for composite ones.
    pub field: Option<&'static str>,
    /// Key of the existing row.
    pub key: Value,
}

impl Conflict {
    pub fn into_error(self) -> AdminError {
        let message = match self.field {
            Some(column) => format!("A {} with this {} already exists", self.label, human(column)),
            None => format!("Duplicate {} already exists", self.label),
        };
        AdminError::Duplicate {
            table: self.table,
            field: self.field.map(str::to_string),
            message,
        }
    }
}

/// First existing row that persisting `candidate` into `table` would clash
/// with under the table's uniqueness rule.
pub fn find_conflict(
    backend: &dyn Backend,
    table: &str,
    candidate: &Row,
    opts: &GuardOptions<'_>,
) -> Result<Option<Conflict>, AdminError> {
    let Some(rule) = rule_for(table) else {
        return Ok(None);
    };
    let failed = |e: StoreError| AdminError::persistence(Op::Query, table, e);
    let conflict = |field: Option<&'static str>, key: Value| Conflict {
        table: table.to_string(),
        label: rule.label,
        field,
        key,
    };

    match rule.kind {
        RuleKind::Single(columns) => {
            for column in columns.iter().copied() {
                let Some(value) = candidate.get(column).filter(|v| is_present(Some(*v))) else {
                    continue;
                };
                if let Some(key) = probe(backend, table, &[(column, value)], opts).map_err(failed)? {
                    return Ok(Some(conflict(Some(column), key)));
                }
            }
            Ok(None)
        }
        RuleKind::Composite(columns) => {
            let mut filters: Vec<Filter<'_>> = Vec::with_capacity(columns.len());
            for column in columns.iter().copied() {
                match candidate.get(column) {
                    Some(v) if is_present(Some(v)) => filters.push((column, v)),
                    _ => return Ok(None),
                }
            }
            let found = probe(backend, table, &filters, opts).map_err(failed)?;
            Ok(found.map(|key| conflict(None, key)))
        }
    }
}

/// Fails with `AdminError::Duplicate` when persisting `candidate` into
/// `table` would break one of the table's uniqueness rules.
pub fn check(
    backend: &dyn Backend,
    table: &str,
    candidate: &Row,
    opts: &GuardOptions<'_>,
) -> Result<(), AdminError> {
    match find_conflict(backend, table, candidate, opts)? {
        Some(c) => Err(c.into_error()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().expect("object")
    }

    fn subjects_backend() -> MemoryBackend {
        MemoryBackend::with_rows(
            "subjects",
            vec![json!({
                "id": "s1",
                "academic_year": "2023-2024",
                "course_name": "BCA",
                "semester": 3,
                "category_id": "5"
            })],
        )
    }

    fn subject(year: &str, course: &str, semester: Value, category: Value) -> Row {
        row(json!({
            "academic_year": year,
            "course_name": course,
            "semester": semester,
            "category_id": category
        }))
    }

    #[test]
    fn course_code_clashes_unless_excluded() {
        let backend = MemoryBackend::with_rows(
            "courses",
            vec![json!({ "id": "c1", "code": "BSC01", "group_name": "MPC" })],
        );
        let candidate = row(json!({ "code": "BSC01", "group_name": "MPC" }));

        let err = check(&backend, "courses", &candidate, &GuardOptions::default())
            .expect_err("duplicate course");
        assert!(err.is_duplicate());

        check(&backend, "courses", &candidate, &GuardOptions::excluding(Some("c1")))
            .expect("own row is not a duplicate");
    }

    #[test]
    fn subject_composite_requires_all_four_to_match() {
        let backend = subjects_backend();
        let opts = GuardOptions::default();

        let same = subject("2023-2024", "BCA", json!(3), json!("5"));
        assert!(check(&backend, "subjects", &same, &opts)
            .expect_err("duplicate")
            .is_duplicate());

        for changed in [
            subject("2024-2025", "BCA", json!(3), json!("5")),
            subject("2023-2024", "BSC", json!(3), json!("5")),
            subject("2023-2024", "BCA", json!(4), json!("5")),
            subject("2023-2024", "BCA", json!(3), json!("6")),
        ] {
            check(&backend, "subjects", &changed, &opts).expect("distinct subject set");
        }
    }

    #[test]
    fn empty_composite_value_skips_the_check() {
        let backend = subjects_backend();
        let candidate = subject("2023-2024", "BCA", json!(3), json!(""));
        check(&backend, "subjects", &candidate, &GuardOptions::default())
            .expect("insufficient data to check");
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn rejected_direct_query_falls_back_to_loose_scan() {
        let backend = subjects_backend();
        backend.reject_direct.set(true);

        // Stored category is text "5", candidate semester is text "3".
        let loose = subject("2023-2024", "BCA", json!("3"), json!(5));
        let err = check(&backend, "subjects", &loose, &GuardOptions::default())
            .expect_err("scan detects duplicate");
        assert!(err.is_duplicate());
        assert_eq!(backend.scans.get(), 1);

        check(&backend, "subjects", &loose, &GuardOptions::excluding(Some("s1")))
            .expect("scan honours exclusion");

        let other = subject("2023-2024", "BCA", json!("4"), json!(5));
        check(&backend, "subjects", &other, &GuardOptions::default())
            .expect("scan ignores non-matching rows");
    }

    #[test]
    fn failed_scan_surfaces_as_backend_error() {
        let backend = subjects_backend();
        backend.reject_direct.set(true);
        backend.fail_scan.set(true);
        let candidate = subject("2023-2024", "BCA", json!(3), json!("5"));
        let err = check(&backend, "subjects", &candidate, &GuardOptions::default())
            .expect_err("scan failure");
        assert!(!err.is_duplicate());
        assert_eq!(err.code(), "db_query_failed");
    }

    #[test]
    fn student_fields_are_checked_independently() {
        let backend = MemoryBackend::with_rows(
            "students",
            vec![json!({
                "id": "st1",
                "student_id": "22BCA001",
                "hall_ticket_no": "HT001",
                "aadhar_number": "123412341234",
                "email": "asha@example.com"
            })],
        );
        let candidate = row(json!({
            "student_id": "22BCA002",
            "hall_ticket_no": "HT001",
            "aadhar_number": null,
            "email": "new@example.com"
        }));
        match check(&backend, "students", &candidate, &GuardOptions::default()) {
            Err(AdminError::Duplicate { field, message, .. }) => {
                assert_eq!(field.as_deref(), Some("hall_ticket_no"));
                assert!(message.contains("hall ticket no"), "{}", message);
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn tables_without_rules_always_pass() {
        let backend = MemoryBackend::default();
        check(&backend, "payments", &row(json!({ "amount": 5 })), &GuardOptions::default())
            .expect("no rule");
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn loose_text_equates_numbers_and_strings() {
        assert_eq!(loose_text(&json!(5)), loose_text(&json!("5")));
        assert_eq!(loose_text(&json!(5.0)), "5");
        assert_eq!(loose_text(&json!(2.5)), "2.5");
        assert_eq!(loose_text(&Value::Null), "null");
    }
}
