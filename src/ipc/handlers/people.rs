use log::info;
use serde_json::Value;

use crate::error::AdminError;
use crate::ipc::error::respond;
use crate::ipc::types::{AppState, Request};
use crate::mapper::{Application, Batch, Entity, Params, Student};
use crate::store::SqliteStore;

use super::crud;

/// Public admission form. Whatever status the caller sends, a submitted
/// application starts out pending.
fn handle_submit(state: &AppState, params: &Value) -> Result<Value, AdminError> {
    let conn = state.conn()?;
    let mut app = Application::from_params(&Params::new(params))?;
    app.status = "pending".to_string();
    app.submitted_at = None;
    let saved = crud::insert(&SqliteStore::new(conn), app)?;
    info!("application received from {}", saved.email);
    Ok(crud::keyed(Application::KEY, crud::to_json(&saved)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if req.method == "applications.submit" {
        return Some(respond(&req.id, handle_submit(state, &req.params)));
    }
    crud::try_handle::<Application>(state, req)
        .or_else(|| crud::try_handle::<Student>(state, req))
        .or_else(|| crud::try_handle::<Batch>(state, req))
}
