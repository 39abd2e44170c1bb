use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::{err, fail};

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = handlers::session::authorize(state, &req.method) {
        return fail(&req.id, &e);
    }
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::session::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::catalog::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::people::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::academics::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::fees::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    state.activity.begin();
    let resp = dispatch(state, &req);
    state.activity.end();
    resp
}
