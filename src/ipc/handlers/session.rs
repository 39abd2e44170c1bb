use log::info;
use serde_json::json;

use crate::error::AdminError;
use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AppState, Request};
use crate::mapper::Params;
use crate::session::{Role, Session};

/// Methods reachable without an admin session: the public intake form and
/// the lookups it needs.
const PUBLIC_METHODS: &[&str] = &[
    "health",
    "workspace.select",
    "session.start",
    "session.end",
    "session.get",
    "applications.submit",
    "years.list",
    "groups.list",
    "courses.list",
];

pub fn authorize(state: &AppState, method: &str) -> Result<(), AdminError> {
    if PUBLIC_METHODS.contains(&method) {
        return Ok(());
    }
    match &state.session {
        Some(s) if s.is_admin() => Ok(()),
        Some(s) => Err(AdminError::Forbidden(format!(
            "{} requires an admin session (signed in as {})",
            method, s.user
        ))),
        None => Err(AdminError::Forbidden(format!("{} requires an admin session", method))),
    }
}

fn handle_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = Params::new(&req.params);
    let user = match p.required_text(&["user", "username", "email"]) {
        Ok(u) => u,
        Err(e) => return fail(&req.id, &e),
    };
    let role_raw = p.opt_text(&["role"]).unwrap_or_else(|| "staff".into());
    let Some(role) = Role::parse(&role_raw) else {
        return err(&req.id, "bad_params", "role must be admin or staff", None);
    };

    let session = Session::start(user, role);
    info!("session started for {} ({:?})", session.user, session.role);
    let result = json!({ "session": session });
    state.session = Some(session);
    ok(&req.id, result)
}

fn handle_end(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was = state.session.as_ref().map(|s| s.user.clone());
    state.reset_session();
    ok(&req.id, json!({ "ended": was }))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "session": state.session }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.start" => Some(handle_start(state, req)),
        "session.end" => Some(handle_end(state, req)),
        "session.get" => Some(handle_get(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_area_needs_admin_role() {
        let mut state = AppState::new();
        assert!(authorize(&state, "applications.submit").is_ok());
        assert_eq!(
            authorize(&state, "students.list").expect_err("anonymous").code(),
            "forbidden"
        );

        state.session = Some(Session::start("clerk".into(), Role::Staff));
        assert!(authorize(&state, "students.list").is_err());

        state.session = Some(Session::start("principal".into(), Role::Admin));
        assert!(authorize(&state, "students.list").is_ok());
    }
}
