use crate::config::EngineConfig;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let config = match req.params.get("engine") {
        None => EngineConfig::default(),
        Some(raw) => match serde_json::from_value::<EngineConfig>(raw.clone()) {
            Ok(cfg) => cfg,
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("invalid engine config: {}", e),
                    None,
                )
            }
        },
    };

    match db::open_store(&path) {
        Ok(conn) => {
            info!(path = %path.display(), "workspace selected");
            state.workspace = Some(path);
            state.store = Some(conn);
            state.config = config;
            ok(
                &req.id,
                json!({
                    "ok": true,
                    "engine": state.config,
                }),
            )
        }
        Err(e) => err(&req.id, "store_open_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
