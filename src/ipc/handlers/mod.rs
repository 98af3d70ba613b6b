pub mod attendance;
pub mod catalog;
pub mod core;
pub mod reports;

use crate::ipc::error::err;
use chrono::NaiveDate;

pub(crate) struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub(crate) fn get_required_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub(crate) fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// "Today" is injectable on every method so callers (and tests) can pin the
/// clock; it defaults to the local date.
pub(crate) fn get_today(params: &serde_json::Value) -> Result<NaiveDate, HandlerErr> {
    match params.get("today").and_then(|v| v.as_str()) {
        None => Ok(chrono::Local::now().date_naive()),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| HandlerErr::new("bad_params", "today must be YYYY-MM-DD")),
    }
}

pub(crate) fn get_optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerErr> {
    match params.get(key).and_then(|v| v.as_str()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| HandlerErr::new("bad_params", format!("{} must be YYYY-MM-DD", key))),
    }
}

pub(crate) fn store_conn(
    state: &crate::ipc::types::AppState,
) -> Result<&rusqlite::Connection, HandlerErr> {
    state
        .store
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}
