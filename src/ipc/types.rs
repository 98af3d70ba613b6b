use std::path::PathBuf;

use crate::config::EngineConfig;
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
    pub store: Option<Connection>,
    pub config: EngineConfig,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            store: None,
            config: EngineConfig::default(),
        }
    }
}
