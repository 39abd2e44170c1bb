use serde_json::Value;

use crate::error::AdminError;
use crate::fees::{self, SemesterKey};
use crate::ipc::error::respond;
use crate::ipc::types::{AppState, Request};
use crate::mapper::{Entity, FeeCategory, FeeDefinition, Params, Payment};
use crate::store::SqliteStore;

use super::crud;

fn handle_set_fee_categories(state: &AppState, params: &Value) -> Result<Value, AdminError> {
    let conn = state.conn()?;
    let Some(Value::Array(raw)) = params.get("items").or_else(|| params.get("feeCategories"))
    else {
        return Err(AdminError::bad_params("missing params.items"));
    };
    let items = raw
        .iter()
        .map(|item| FeeCategory::from_params(&Params::new(item)))
        .collect::<Result<Vec<_>, _>>()?;

    let tx = conn.unchecked_transaction()?;
    let saved = fees::set_fee_types(&SqliteStore::new(&tx), items)?;
    tx.commit()?;

    Ok(crud::keyed(
        FeeCategory::PREFIX,
        Value::Array(saved.iter().map(crud::to_json::<FeeCategory>).collect()),
    ))
}

fn handle_set_semester(state: &AppState, params: &Value) -> Result<Value, AdminError> {
    let conn = state.conn()?;
    let p = Params::new(params);
    let key = SemesterKey {
        academic_year: p.required_text(&["academicYear", "academic_year", "year"])?,
        group_name: p.required_text(&["groupName", "group_name", "group"])?,
        course_name: p.required_text(&["courseName", "course_name", "course"])?,
        semester: p
            .int(&["semester", "sem"])?
            .ok_or_else(|| AdminError::bad_params("semester must not be empty"))?,
    };
    let Some(Value::Array(raw)) = params.get("entries").or_else(|| params.get("fees")) else {
        return Err(AdminError::bad_params("missing params.entries"));
    };
    let entries = raw
        .iter()
        .map(|item| {
            let ip = Params::new(item);
            Ok((
                ip.required_text(&["feeCategory", "fee_category", "name"])?,
                ip.number(&["amount", "fee"])?,
            ))
        })
        .collect::<Result<Vec<_>, AdminError>>()?;

    let tx = conn.unchecked_transaction()?;
    let saved = fees::set_semester_fees(&SqliteStore::new(&tx), &key, entries)?;
    tx.commit()?;

    Ok(crud::keyed(
        FeeDefinition::PREFIX,
        Value::Array(saved.iter().map(crud::to_json::<FeeDefinition>).collect()),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "feeCategories.set" => Some(respond(&req.id, handle_set_fee_categories(state, &req.params))),
        "fees.setSemester" => Some(respond(&req.id, handle_set_semester(state, &req.params))),
        _ => crud::try_handle::<FeeDefinition>(state, req)
            .or_else(|| crud::try_handle::<FeeCategory>(state, req))
            .or_else(|| crud::try_handle::<Payment>(state, req)),
    }
}
