use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::error::AdminError;
use crate::session::{Activity, Session};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything one daemon process carries between requests.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
    pub activity: Activity,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            session: None,
            activity: Activity::default(),
        }
    }

    pub fn conn(&self) -> Result<&Connection, AdminError> {
        self.db.as_ref().ok_or(AdminError::NoWorkspace)
    }

    /// Drops the session; workspace and connection stay open.
    pub fn reset_session(&mut self) {
        self.session = None;
        self.activity.reset();
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
