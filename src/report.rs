use crate::calendar::{days_in_month, month_key, parse_month_key};
use crate::model::{
    bucket_by_month, month_label_from_key, AttendanceRecord, Status, TermBucket,
};
use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const WEEKDAY_HEADER: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    Month,
    Term,
    Overall,
}

/// One cell of the renderer's fixed table contract: a day number (absent on
/// filler cells) and a status class the stylesheet keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCell {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    pub status_class: String,
}

impl ReportCell {
    fn filler() -> Self {
        Self {
            day: None,
            status_class: String::new(),
        }
    }
}

/// The fixed calendar-table shape the external document renderer consumes:
/// a 7-column weekday header row, then one row per week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarTable {
    pub weekday_header: Vec<String>,
    pub weeks: Vec<Vec<ReportCell>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthTable {
    pub month_key: String,
    pub month_label: String,
    pub table: CalendarTable,
}

#[derive(Debug, Clone)]
pub struct ReportError {
    pub code: &'static str,
    pub message: String,
}

impl ReportError {
    fn bad_target(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
        }
    }
}

fn status_class(status: Status) -> &'static str {
    match status {
        Status::Present => "present",
        Status::Absent => "absent",
    }
}

/// One month's table. Leading filler cells up to the first's weekday, one
/// cell per day with its record's status class, trailing filler to complete
/// the final week.
fn month_table(key: &str, records: &[AttendanceRecord]) -> Option<MonthTable> {
    let (year, month) = parse_month_key(key)?;
    // Record month keys are zero-padded; re-format so unpadded input still
    // finds its bucket.
    let key = month_key(year, month);
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let buckets = bucket_by_month(records);
    let empty = Default::default();
    let month_records = buckets.get(&key).unwrap_or(&empty);

    let mut cells: Vec<ReportCell> = Vec::new();
    for _ in 0..first.weekday().num_days_from_sunday() {
        cells.push(ReportCell::filler());
    }
    for day in 1..=days_in_month(year, month) {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let class = month_records
            .get(&date)
            .map(|r| status_class(r.status).to_string())
            .unwrap_or_default();
        cells.push(ReportCell {
            day: Some(day),
            status_class: class,
        });
    }
    while cells.len() % 7 != 0 {
        cells.push(ReportCell::filler());
    }

    Some(MonthTable {
        month_label: month_label_from_key(&key),
        month_key: key,
        table: CalendarTable {
            weekday_header: WEEKDAY_HEADER.iter().map(|d| d.to_string()).collect(),
            weeks: cells.chunks(7).map(|week| week.to_vec()).collect(),
        },
    })
}

/// Assemble the calendar tables for one report request. `month` emits
/// exactly one table; `term` one per constituent month in chronological
/// order; `overall` the most recent months that actually have data, capped
/// at `overall_month_cap`. An empty range compiles to an empty list, never
/// an error.
pub fn compile(
    mode: ReportMode,
    target: Option<&str>,
    records: &[AttendanceRecord],
    terms: &[TermBucket],
    overall_month_cap: usize,
) -> Result<Vec<MonthTable>, ReportError> {
    match mode {
        ReportMode::Month => {
            let key = target.ok_or_else(|| ReportError::bad_target("missing month target"))?;
            let table = month_table(key, records)
                .ok_or_else(|| ReportError::bad_target(format!("bad month key: {}", key)))?;
            Ok(vec![table])
        }
        ReportMode::Term => {
            let name = target.ok_or_else(|| ReportError::bad_target("missing term target"))?;
            let term = terms
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| ReportError::bad_target(format!("unknown term: {}", name)))?;
            let mut tables = Vec::with_capacity(term.month_keys.len());
            for key in &term.month_keys {
                let table = month_table(key, records)
                    .ok_or_else(|| ReportError::bad_target(format!("bad month key: {}", key)))?;
                tables.push(table);
            }
            Ok(tables)
        }
        ReportMode::Overall => {
            let buckets = bucket_by_month(records);
            let mut keys: Vec<&String> = buckets.keys().collect();
            // Most recent months win the cap; emit chronologically.
            keys.reverse();
            keys.truncate(overall_month_cap);
            keys.reverse();
            debug!(months = keys.len(), cap = overall_month_cap, "compiling overall report");
            let mut tables = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(table) = month_table(key, records) {
                    tables.push(table);
                }
            }
            Ok(tables)
        }
    }
}

/// Best-effort display name for the report header block. The students table
/// may be absent in drifted stores; that is not an error.
pub fn student_display_name(conn: &Connection, student_id: &str) -> Option<String> {
    conn.query_row(
        "SELECT name FROM students WHERE id = ?",
        [student_id],
        |r| r.get::<_, String>(0),
    )
    .optional()
    .ok()
    .flatten()
}
