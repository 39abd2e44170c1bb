use log::{debug, warn};
use serde_json::json;

use crate::error::AdminError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn fail(id: &str, e: &AdminError) -> serde_json::Value {
    if e.is_duplicate() {
        debug!("request {} refused: {}", id, e);
    } else if matches!(e, AdminError::Persistence { .. }) {
        warn!("request {} failed: {}", id, e);
    }
    err(id, e.code(), e.to_string(), e.details())
}

pub fn respond(id: &str, result: Result<serde_json::Value, AdminError>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => fail(id, &e),
    }
}
