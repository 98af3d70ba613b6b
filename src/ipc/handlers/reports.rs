use super::{get_optional_str, get_required_str, get_today, store_conn, HandlerErr};
use crate::calc;
use crate::calendar;
use crate::fetch::{self, FetchCriteria};
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::model::StatsScope;
use crate::report::{self, ReportMode};
use crate::synth::SampleMode;
use chrono::NaiveDate;
use serde_json::json;
use std::time::Duration;

fn parse_mode(raw: &str) -> Result<ReportMode, HandlerErr> {
    serde_json::from_value(json!(raw)).map_err(|_| {
        HandlerErr::new(
            "bad_params",
            format!("mode must be one of: month, term, overall (got {})", raw),
        )
    })
}

/// The fetch window a report mode implies. Overall stays unbounded so the
/// resolver sees everything the store has; the cap is applied at compile time.
fn mode_bounds(
    mode: ReportMode,
    target: Option<&str>,
    terms: &[crate::model::TermBucket],
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), HandlerErr> {
    match mode {
        ReportMode::Overall => Ok((None, None)),
        ReportMode::Month => {
            let key =
                target.ok_or_else(|| HandlerErr::new("bad_params", "month mode needs a target"))?;
            let (year, month) = calendar::parse_month_key(key)
                .ok_or_else(|| HandlerErr::new("bad_params", format!("bad month key: {}", key)))?;
            let first = NaiveDate::from_ymd_opt(year, month, 1)
                .ok_or_else(|| HandlerErr::new("bad_params", format!("bad month key: {}", key)))?;
            let last = NaiveDate::from_ymd_opt(year, month, calendar::days_in_month(year, month))
                .ok_or_else(|| HandlerErr::new("bad_params", format!("bad month key: {}", key)))?;
            Ok((Some(first), Some(last)))
        }
        ReportMode::Term => {
            let name =
                target.ok_or_else(|| HandlerErr::new("bad_params", "term mode needs a target"))?;
            let term = calendar::find_term(terms, name)
                .ok_or_else(|| HandlerErr::new("bad_params", format!("unknown term: {}", name)))?;
            let first_key = term.month_keys.first().ok_or_else(|| {
                HandlerErr::new("bad_params", format!("term has no months: {}", name))
            })?;
            let last_key = term.month_keys.last().ok_or_else(|| {
                HandlerErr::new("bad_params", format!("term has no months: {}", name))
            })?;
            let (fy, fm) = calendar::parse_month_key(first_key)
                .ok_or_else(|| HandlerErr::new("internal", "malformed term catalog"))?;
            let (ly, lm) = calendar::parse_month_key(last_key)
                .ok_or_else(|| HandlerErr::new("internal", "malformed term catalog"))?;
            let first = NaiveDate::from_ymd_opt(fy, fm, 1)
                .ok_or_else(|| HandlerErr::new("internal", "malformed term catalog"))?;
            let last = NaiveDate::from_ymd_opt(ly, lm, calendar::days_in_month(ly, lm))
                .ok_or_else(|| HandlerErr::new("internal", "malformed term catalog"))?;
            Ok((Some(first), Some(last)))
        }
    }
}

fn stats_scope(mode: ReportMode, target: Option<&str>) -> StatsScope {
    match (mode, target) {
        (ReportMode::Month, Some(key)) => StatsScope::Month(key.to_string()),
        (ReportMode::Term, Some(name)) => StatsScope::Term(name.to_string()),
        _ => StatsScope::All,
    }
}

/// Printable month tables plus the matching stats line, in one response so
/// the caller never mixes tables from one fetch with numbers from another.
fn reports_compile(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let mode = parse_mode(&get_required_str(&req.params, "mode")?)?;
    let target = get_optional_str(&req.params, "target");
    let today = get_today(&req.params)?;
    let cap = match req.params.get("monthCap") {
        None => state.config.overall_month_cap,
        Some(raw) => raw
            .as_u64()
            .ok_or_else(|| HandlerErr::new("bad_params", "monthCap must be a number"))?
            as usize,
    };

    let terms = calendar::term_catalog(today);
    let (from, to) = mode_bounds(mode, target.as_deref(), &terms)?;

    let conn = store_conn(state)?;
    let criteria = FetchCriteria {
        student_id: student_id.clone(),
        from,
        to,
    };
    let resolution = fetch::resolve_store(
        conn,
        &criteria,
        SampleMode::SixDay,
        today,
        Duration::from_millis(state.config.budget_ms),
    );

    let tables = report::compile(mode, target.as_deref(), &resolution.records, &terms, cap)
        .map_err(|e| HandlerErr::new(e.code, e.message))?;
    let scope = stats_scope(mode, target.as_deref());
    let stats = calc::stats_for(&resolution.records, &scope, &terms, state.config.saturday);

    let mut result = json!({
        "studentId": student_id,
        "tables": tables,
        "stats": stats,
        "source": resolution.source,
        "attempts": resolution.attempts,
    });
    if let Some(name) = report::student_display_name(conn, &student_id) {
        result["studentName"] = json!(name);
    }
    if let Some(advisory) = &resolution.advisory {
        result["advisory"] = json!(advisory);
    }
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if req.method != "reports.compile" {
        return None;
    }
    Some(match reports_compile(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
