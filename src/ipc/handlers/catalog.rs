use super::{get_today, HandlerErr};
use crate::calendar;
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_months(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let today = get_today(&req.params)?;
    Ok(json!({ "months": calendar::month_catalog(today) }))
}

fn handle_terms(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let today = get_today(&req.params)?;
    Ok(json!({ "terms": calendar::term_catalog(today) }))
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "catalog.months" => handle_months(req),
        "catalog.terms" => handle_terms(req),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
