use std::collections::HashMap;
use std::path::PathBuf;

use crate::refresh::RefreshState;
use rusqlite::Connection;
use serde::Deserialize;

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
    pub refresh: RefreshState,
    /// (class id, scanned code) -> last accepted scan, epoch millis.
    /// Keyboard-wedge scanners double-fire; duplicates inside the debounce
    /// window are rejected.
    pub scan_log: HashMap<(String, String), i64>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            refresh: RefreshState::default(),
            scan_log: HashMap::new(),
        }
    }
}
