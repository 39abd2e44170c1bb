//! Fee-category reconciliation and per-semester fee replacement.
//!
//! Both operations replace a whole set of rows. Callers wrap them in one
//! transaction so a failure part-way leaves the previous set in place.

use std::collections::HashSet;

use log::info;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AdminError, Op};
use crate::guard::{self, GuardOptions};
use crate::mapper::{Entity, FeeCategory, FeeDefinition};
use crate::store::Backend;

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Rejects payloads where two names differ only by case or padding.
pub fn check_name_collisions<'a>(
    names: impl IntoIterator<Item = &'a str>,
    table: &str,
    what: &str,
) -> Result<(), AdminError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(AdminError::bad_params(format!("{} name must not be empty", what)));
        }
        if !seen.insert(fold(name)) {
            return Err(AdminError::Duplicate {
                table: table.to_string(),
                field: Some("name".into()),
                message: format!("{} \"{}\" appears more than once", what, name.trim()),
            });
        }
    }
    Ok(())
}

/// Replaces the persisted fee categories with `items`.
///
/// Categories missing from `items` are deleted. Every surviving item is
/// checked for duplicates against what remains, then upserted by id.
pub fn set_fee_types(
    backend: &dyn Backend,
    mut items: Vec<FeeCategory>,
) -> Result<Vec<FeeCategory>, AdminError> {
    check_name_collisions(
        items.iter().map(|c| c.name.as_str()),
        FeeCategory::TABLE,
        "fee category",
    )?;

    let table = FeeCategory::TABLE;
    let existing = backend
        .project(table, &["id"])
        .map_err(|e| AdminError::persistence(Op::Query, table, e))?;
    let keep: HashSet<&str> = items.iter().filter_map(|c| c.id()).collect();
    let stale: Vec<String> = existing
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str))
        .filter(|id| !keep.contains(id))
        .map(str::to_string)
        .collect();

    for id in &stale {
        backend
            .delete(table, "id", id)
            .map_err(|e| AdminError::persistence(Op::Delete, table, e))?;
    }

    for item in items.iter_mut() {
        if item.id.is_none() {
            item.set_id(Uuid::new_v4().to_string());
        }
        item.name = item.name.trim().to_string();
    }
    // A clash with another row of the payload is settled by the upserts
    // below; the payload itself was already checked for collisions.
    let payload_ids: HashSet<&str> = items.iter().filter_map(|c| c.id()).collect();
    for item in &items {
        let opts = GuardOptions::excluding(item.id());
        if let Some(conflict) = guard::find_conflict(backend, table, &item.to_row(), &opts)? {
            let owned = conflict.key.as_str().is_some_and(|k| payload_ids.contains(k));
            if !owned {
                return Err(conflict.into_error());
            }
        }
    }

    for item in &items {
        backend
            .upsert(table, &["id"], &item.to_row())
            .map_err(|e| AdminError::persistence(Op::Update, table, e))?;
    }

    info!(
        "fee categories replaced: {} kept, {} removed",
        items.len(),
        stale.len()
    );
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

/// Identifies one semester's fee sheet.
#[derive(Debug, Clone)]
pub struct SemesterKey {
    pub academic_year: String,
    pub group_name: String,
    pub course_name: String,
    pub semester: i64,
}

/// Replaces every fee definition of one semester with `entries`
/// (fee category, amount).
pub fn set_semester_fees(
    backend: &dyn Backend,
    key: &SemesterKey,
    entries: Vec<(String, Option<f64>)>,
) -> Result<Vec<FeeDefinition>, AdminError> {
    check_name_collisions(
        entries.iter().map(|(c, _)| c.as_str()),
        FeeDefinition::TABLE,
        "fee category",
    )?;

    let table = FeeDefinition::TABLE;
    let year = Value::String(key.academic_year.clone());
    let course = Value::String(key.course_name.clone());
    let semester = Value::from(key.semester);
    let group = Value::String(key.group_name.clone());

    let filters = [
        ("academic_year", &year),
        ("group_name", &group),
        ("course_name", &course),
        ("semester", &semester),
    ];
    let removed = backend
        .delete_where(table, &filters)
        .map_err(|e| AdminError::persistence(Op::Delete, table, e))?;

    let mut saved = Vec::with_capacity(entries.len());
    for (fee_category, amount) in entries {
        let def = FeeDefinition {
            id: Some(Uuid::new_v4().to_string()),
            academic_year: key.academic_year.clone(),
            group_name: Some(key.group_name.clone()),
            course_name: key.course_name.clone(),
            semester: Some(key.semester),
            fee_category: fee_category.trim().to_string(),
            amount,
        };
        let row = def.to_row();
        guard::check(backend, table, &row, &GuardOptions::excluding(def.id()))?;
        backend
            .insert(table, &row)
            .map_err(|e| AdminError::persistence(Op::Insert, table, e))?;
        saved.push(def);
    }

    info!(
        "fee sheet {} {} sem {}: {} removed, {} saved",
        key.academic_year,
        key.course_name,
        key.semester,
        removed,
        saved.len()
    );
    Ok(saved)
}
