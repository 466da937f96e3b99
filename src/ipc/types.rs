use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use super::helpers::HandlerErr;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
        }
    }

    pub fn conn(&self) -> Result<&Connection, HandlerErr> {
        self.db.as_ref().ok_or_else(no_workspace)
    }

    pub fn conn_mut(&mut self) -> Result<&mut Connection, HandlerErr> {
        self.db.as_mut().ok_or_else(no_workspace)
    }
}

fn no_workspace() -> HandlerErr {
    HandlerErr::new("no_workspace", "select a workspace first")
}
