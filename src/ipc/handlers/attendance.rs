use super::{
    get_optional_date, get_optional_str, get_required_str, get_today, store_conn, HandlerErr,
};
use crate::calc;
use crate::calendar;
use crate::fetch::{self, FetchCriteria, Resolution};
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::model::{StatsScope, ViewState};
use crate::synth::SampleMode;
use chrono::NaiveDate;
use serde_json::json;
use std::time::Duration;

/// Re-format a month key through the parser so "2025-6" and "2025-06" name
/// the same month everywhere downstream (record `month_key()`s are padded).
fn canonical_month_key(key: &str) -> Result<String, HandlerErr> {
    let (year, month) = calendar::parse_month_key(key)
        .ok_or_else(|| HandlerErr::new("bad_params", format!("bad month key: {}", key)))?;
    Ok(calendar::month_key(year, month))
}

fn month_bounds(key: &str) -> Result<(NaiveDate, NaiveDate), HandlerErr> {
    let (year, month) = calendar::parse_month_key(key)
        .ok_or_else(|| HandlerErr::new("bad_params", format!("bad month key: {}", key)))?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| HandlerErr::new("bad_params", format!("bad month key: {}", key)))?;
    let last = NaiveDate::from_ymd_opt(year, month, calendar::days_in_month(year, month))
        .ok_or_else(|| HandlerErr::new("bad_params", format!("bad month key: {}", key)))?;
    Ok((first, last))
}

fn resolution_json(resolution: &Resolution) -> serde_json::Value {
    let mut value = json!({
        "source": resolution.source,
        "attempts": resolution.attempts,
    });
    if let Some(advisory) = &resolution.advisory {
        value["advisory"] = json!(advisory);
    }
    value
}

fn resolve(
    state: &AppState,
    student_id: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    mode: SampleMode,
    today: NaiveDate,
) -> Result<Resolution, HandlerErr> {
    let conn = store_conn(state)?;
    let criteria = FetchCriteria {
        student_id: student_id.to_string(),
        from,
        to,
    };
    Ok(fetch::resolve_store(
        conn,
        &criteria,
        mode,
        today,
        Duration::from_millis(state.config.budget_ms),
    ))
}

/// Dashboard-style open: resolve and normalize the current month (or an
/// explicit range) and hand back records, stats, and the strategy trail.
fn attendance_open(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let today = get_today(&req.params)?;
    let from = get_optional_date(&req.params, "from")?;
    let to = get_optional_date(&req.params, "to")?;
    let (from, to) = match (from, to) {
        (None, None) => {
            let (first, last) = month_bounds(&today.format("%Y-%m").to_string())?;
            (Some(first), Some(last))
        }
        other => other,
    };

    let resolution = resolve(state, &student_id, from, to, SampleMode::Sparse, today)?;
    let terms = calendar::term_catalog(today);
    let stats = calc::stats_for(
        &resolution.records,
        &StatsScope::All,
        &terms,
        state.config.saturday,
    );

    let mut result = resolution_json(&resolution);
    result["records"] = json!(resolution.records);
    result["stats"] = json!(stats);
    result["hasRealData"] = json!(matches!(
        resolution.source,
        fetch::DataSource::Store { .. }
    ));
    Ok(result)
}

/// The fixed 42-cell month grid plus that month's stats.
fn attendance_grid(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let month_key = canonical_month_key(&get_required_str(&req.params, "month")?)?;
    let today = get_today(&req.params)?;
    let (first, last) = month_bounds(&month_key)?;
    let (year, month) = calendar::parse_month_key(&month_key)
        .ok_or_else(|| HandlerErr::new("bad_params", format!("bad month key: {}", month_key)))?;

    let resolution = resolve(
        state,
        &student_id,
        Some(first),
        Some(last),
        SampleMode::SixDay,
        today,
    )?;
    let cells = calendar::build_grid(year, month, &resolution.records, today)
        .ok_or_else(|| HandlerErr::new("bad_params", format!("bad month key: {}", month_key)))?;
    let terms = calendar::term_catalog(today);
    let stats = calc::stats_for(
        &resolution.records,
        &StatsScope::Month(month_key.clone()),
        &terms,
        state.config.saturday,
    );

    let mut result = resolution_json(&resolution);
    result["month"] = json!(month_key);
    result["cells"] = json!(cells);
    result["stats"] = json!(stats);
    Ok(result)
}

fn parse_scope(req: &Request, today: NaiveDate) -> Result<StatsScope, HandlerErr> {
    if let Some(scope) = get_optional_str(&req.params, "scope") {
        let target = get_optional_str(&req.params, "target");
        return match scope.as_str() {
            "all" => Ok(StatsScope::All),
            "month" => {
                let key = target
                    .ok_or_else(|| HandlerErr::new("bad_params", "month scope needs a target"))?;
                Ok(StatsScope::Month(key))
            }
            "term" => {
                let name = target
                    .ok_or_else(|| HandlerErr::new("bad_params", "term scope needs a target"))?;
                Ok(StatsScope::Term(name))
            }
            "year" => {
                let raw = target
                    .ok_or_else(|| HandlerErr::new("bad_params", "year scope needs a target"))?;
                let year = raw
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| HandlerErr::new("bad_params", "year target must be numeric"))?;
                Ok(StatsScope::Year(year))
            }
            other => Err(HandlerErr::new(
                "bad_params",
                format!("scope must be one of: month, term, year, all (got {})", other),
            )),
        };
    }
    if let Some(raw) = req.params.get("view") {
        let view: ViewState = serde_json::from_value(raw.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("invalid view: {}", e)))?;
        return Ok(StatsScope::from_view(&view, today));
    }
    Ok(StatsScope::Month(today.format("%Y-%m").to_string()))
}

/// The fetch range implied by a scope; `All` stays unbounded.
fn scope_bounds(
    scope: &StatsScope,
    terms: &[crate::model::TermBucket],
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), HandlerErr> {
    match scope {
        StatsScope::All => Ok((None, None)),
        StatsScope::Month(key) => {
            let (first, last) = month_bounds(key)?;
            Ok((Some(first), Some(last)))
        }
        StatsScope::Year(start_year) => {
            let from = NaiveDate::from_ymd_opt(*start_year, 4, 1)
                .ok_or_else(|| HandlerErr::new("bad_params", "year target out of range"))?;
            let to = NaiveDate::from_ymd_opt(*start_year + 1, 3, 31)
                .ok_or_else(|| HandlerErr::new("bad_params", "year target out of range"))?;
            Ok((Some(from), Some(to)))
        }
        StatsScope::Term(name) => {
            let term = calendar::find_term(terms, name)
                .ok_or_else(|| HandlerErr::new("bad_params", format!("unknown term: {}", name)))?;
            let first_key = term.month_keys.first().ok_or_else(|| {
                HandlerErr::new("bad_params", format!("term has no months: {}", name))
            })?;
            let last_key = term.month_keys.last().ok_or_else(|| {
                HandlerErr::new("bad_params", format!("term has no months: {}", name))
            })?;
            let (first, _) = month_bounds(first_key)?;
            let (_, last) = month_bounds(last_key)?;
            Ok((Some(first), Some(last)))
        }
    }
}

/// Single-path stats at any granularity: pre-filter the resolved records by
/// scope and hand them to the one aggregation routine.
fn attendance_stats(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let today = get_today(&req.params)?;
    let scope = match parse_scope(req, today)? {
        StatsScope::Month(key) => StatsScope::Month(canonical_month_key(&key)?),
        other => other,
    };
    let terms = calendar::term_catalog(today);
    let (from, to) = scope_bounds(&scope, &terms)?;

    let resolution = resolve(state, &student_id, from, to, SampleMode::SixDay, today)?;
    let stats = calc::stats_for(&resolution.records, &scope, &terms, state.config.saturday);

    let mut result = resolution_json(&resolution);
    result["stats"] = json!(stats);
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.open" => attendance_open(state, req),
        "attendance.grid" => attendance_grid(state, req),
        "attendance.stats" => attendance_stats(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
