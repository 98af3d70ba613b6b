use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical attendance status. Anything upstream that is not recognizably
/// "present" counts as absent for statistics; the verbatim label rides along
/// on the record for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Absent,
}

/// One normalized per-day attendance record. Unique per (student, date);
/// never dated on a Sunday.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub status: Status,
    pub status_label: String,
    pub marked_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl AttendanceRecord {
    pub fn month_key(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }

    /// Synthetic rows carry `sample-` prefixed ids so "has real data" checks
    /// never mistake them for store rows.
    pub fn is_synthetic(&self) -> bool {
        self.id.starts_with("sample-")
    }
}

/// A raw row as read from one of the candidate store tables, before
/// normalization. Dates and statuses are still free-form strings here.
#[derive(Debug, Clone)]
pub struct RawAttendanceRow {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub date: String,
    pub status: String,
    pub marked_by: Option<String>,
    pub created_at: Option<String>,
}

/// Date-keyed records for one month. Built on demand, never persisted.
pub type MonthBucket = BTreeMap<NaiveDate, AttendanceRecord>;

pub fn bucket_by_month(records: &[AttendanceRecord]) -> BTreeMap<String, MonthBucket> {
    let mut buckets: BTreeMap<String, MonthBucket> = BTreeMap::new();
    for record in records {
        buckets
            .entry(record.month_key())
            .or_default()
            .insert(record.date, record.clone());
    }
    buckets
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthEntry {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermBucket {
    pub name: String,
    pub month_keys: Vec<String>,
}

/// The one stats shape every surface shares. Produced only by
/// `calc::aggregate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceStats {
    pub present: u32,
    pub absent: u32,
    pub total: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellAttendance {
    pub status: Status,
    pub status_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub marked_by: String,
    pub synthetic: bool,
}

/// One slot in the fixed 42-cell month grid, including out-of-month filler
/// days from the adjacent months.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub day: u32,
    pub in_current_month: bool,
    pub is_today: bool,
    pub is_holiday: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<CellAttendance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Calendar,
    Summary,
}

/// Explicit view-selection value object. The host UI sends this instead of
/// the engine tracking any selection state of its own.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub view_mode: ViewMode,
    #[serde(default)]
    pub selected_month: Option<String>,
    #[serde(default)]
    pub selected_term: Option<String>,
}

/// Which slice of the record set a stats request covers. Every variant is
/// answered by pre-filtering and calling the single aggregation routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsScope {
    Month(String),
    Term(String),
    Year(i32),
    All,
}

impl StatsScope {
    /// Map a view selection onto a scope: an explicit term wins, then an
    /// explicit month, and "all" (or no selection) means the whole record set.
    pub fn from_view(view: &ViewState, today: NaiveDate) -> StatsScope {
        if let Some(term) = view.selected_term.as_deref() {
            if !term.eq_ignore_ascii_case("all terms") {
                return StatsScope::Term(term.to_string());
            }
        }
        match view.selected_month.as_deref() {
            None => StatsScope::Month(today.format("%Y-%m").to_string()),
            Some("all") => StatsScope::All,
            Some(month) => StatsScope::Month(month.to_string()),
        }
    }
}

/// "June 2025" from a "2025-06" key, without consulting the catalog. Used as
/// the label fallback for months outside the catalog window.
pub fn month_label_from_key(key: &str) -> String {
    if let Some((y, m)) = key.split_once('-') {
        if let (Ok(year), Ok(month)) = (y.parse::<i32>(), m.parse::<u32>()) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                return format!("{} {}", month_name(month), date.year());
            }
        }
    }
    key.to_string()
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}
