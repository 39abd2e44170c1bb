//! list / create / update / delete for any mapped entity.

use log::debug;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AdminError, Op};
use crate::guard::{self, GuardOptions};
use crate::ipc::error::respond;
use crate::ipc::types::{AppState, Request};
use crate::mapper::{Entity, Params};
use crate::store::{Backend, SqliteStore};

pub fn keyed(key: &str, value: Value) -> Value {
    let mut out = Map::new();
    out.insert(key.to_string(), value);
    Value::Object(out)
}

pub fn to_json<E: Entity>(item: &E) -> Value {
    serde_json::to_value(item).unwrap_or_default()
}

pub fn list_all<E: Entity>(store: &dyn Backend) -> Result<Vec<E>, AdminError> {
    let rows = store
        .select_all(E::TABLE, E::ORDER_BY)
        .map_err(|e| AdminError::persistence(Op::Query, E::TABLE, e))?;
    Ok(rows.iter().map(E::from_row).collect())
}

/// Guards and inserts `item` under a fresh id.
pub fn insert<E: Entity>(store: &dyn Backend, mut item: E) -> Result<E, AdminError> {
    item.set_id(Uuid::new_v4().to_string());
    item.before_insert();
    let row = item.to_row();
    guard::check(store, E::TABLE, &row, &GuardOptions::default())?;
    store
        .insert(E::TABLE, &row)
        .map_err(|e| AdminError::persistence(Op::Insert, E::TABLE, e))?;
    debug!("{} {} created", E::LABEL, item.id().unwrap_or_default());
    Ok(item)
}

/// Replaces the record `id` with `item`, skipping itself in the duplicate check.
pub fn replace<E: Entity>(store: &dyn Backend, id: &str, mut item: E) -> Result<E, AdminError> {
    let existing = store
        .get(E::TABLE, "id", id)
        .map_err(|e| AdminError::persistence(Op::Query, E::TABLE, e))?;
    if existing.is_none() {
        return Err(AdminError::NotFound(E::LABEL));
    }
    item.set_id(id.to_string());
    let row = item.to_row();
    guard::check(store, E::TABLE, &row, &GuardOptions::excluding(Some(id)))?;
    store
        .update(E::TABLE, "id", id, &row)
        .map_err(|e| AdminError::persistence(Op::Update, E::TABLE, e))?;
    debug!("{} {} updated", E::LABEL, id);
    Ok(item)
}

/// Deletes `id` after its dependents.
pub fn remove<E: Entity>(store: &dyn Backend, id: &str) -> Result<(), AdminError> {
    let existing = store
        .get(E::TABLE, "id", id)
        .map_err(|e| AdminError::persistence(Op::Query, E::TABLE, e))?;
    if existing.is_none() {
        return Err(AdminError::NotFound(E::LABEL));
    }
    E::cascade(store, id).map_err(|e| AdminError::persistence(Op::Delete, E::TABLE, e))?;
    store
        .delete(E::TABLE, "id", id)
        .map_err(|e| AdminError::persistence(Op::Delete, E::TABLE, e))?;
    debug!("{} {} deleted", E::LABEL, id);
    Ok(())
}

fn required_id(params: &Value) -> Result<String, AdminError> {
    Params::new(params).required_text(&["id"])
}

fn handle_list<E: Entity>(state: &AppState) -> Result<Value, AdminError> {
    let conn = state.conn()?;
    let items = list_all::<E>(&SqliteStore::new(conn))?;
    Ok(keyed(
        E::PREFIX,
        Value::Array(items.iter().map(to_json::<E>).collect()),
    ))
}

fn handle_create<E: Entity>(state: &AppState, params: &Value) -> Result<Value, AdminError> {
    let conn = state.conn()?;
    let item = E::from_params(&Params::new(params))?;
    let saved = insert(&SqliteStore::new(conn), item)?;
    Ok(keyed(E::KEY, to_json(&saved)))
}

fn handle_update<E: Entity>(state: &AppState, params: &Value) -> Result<Value, AdminError> {
    let conn = state.conn()?;
    let id = required_id(params)?;
    let item = E::from_params(&Params::new(params))?;
    let saved = replace(&SqliteStore::new(conn), &id, item)?;
    Ok(keyed(E::KEY, to_json(&saved)))
}

fn handle_delete<E: Entity>(state: &AppState, params: &Value) -> Result<Value, AdminError> {
    let conn = state.conn()?;
    let id = required_id(params)?;
    let tx = conn.unchecked_transaction()?;
    remove::<E>(&SqliteStore::new(&tx), &id)?;
    tx.commit()?;
    Ok(keyed("deleted", Value::String(id)))
}

/// Routes `<prefix>.list|create|update|delete` for `E`.
pub fn try_handle<E: Entity>(state: &AppState, req: &Request) -> Option<Value> {
    let (prefix, action) = req.method.split_once('.')?;
    if prefix != E::PREFIX {
        return None;
    }
    let result = match action {
        "list" => handle_list::<E>(state),
        "create" => handle_create::<E>(state, &req.params),
        "update" => handle_update::<E>(state, &req.params),
        "delete" => handle_delete::<E>(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{Course, SubCategory, Subject};
    use crate::store::memory::MemoryBackend;
    use serde_json::json;

    fn course(code: &str, group: &str) -> Course {
        Course {
            id: None,
            code: code.into(),
            name: format!("Course {}", code),
            group_name: group.into(),
            semesters: Some(6),
            duration: Some(3),
        }
    }

    #[test]
    fn update_may_keep_its_own_code() {
        let store = MemoryBackend::default();
        let saved = insert(&store, course("BSC01", "MPC")).expect("insert");
        let id = saved.id.clone().expect("id");

        let mut edited = course("BSC01", "MPC");
        edited.name = "Renamed".into();
        let updated = replace(&store, &id, edited).expect("self is not a duplicate");
        assert_eq!(updated.name, "Renamed");

        let err = insert(&store, course("BSC01", "MPC")).expect_err("second BSC01");
        assert!(err.is_duplicate());
        insert(&store, course("BSC01", "BiPC")).expect("same code, other group");
    }

    #[test]
    fn update_of_missing_record_is_not_found() {
        let store = MemoryBackend::default();
        let err = replace(&store, "nope", course("X", "MPC")).expect_err("missing");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn deleting_a_sub_category_removes_its_subjects_first() {
        let store = MemoryBackend::default();
        let sc = insert(
            &store,
            SubCategory {
                id: None,
                name: "Languages".into(),
                subjects: vec!["English".into()],
            },
        )
        .expect("sub-category");
        let sc_id = sc.id.clone().expect("id");
        store.seed(
            "subjects",
            vec![
                json!({ "id": "s1", "category_id": sc_id, "subject_name": "English" }),
                json!({ "id": "s2", "category_id": "other", "subject_name": "Maths" }),
            ],
        );

        remove::<SubCategory>(&store, &sc_id).expect("delete");
        let left = list_all::<Subject>(&store).expect("subjects");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].subject_name, "Maths");
        assert!(list_all::<SubCategory>(&store).expect("list").is_empty());
    }
}
