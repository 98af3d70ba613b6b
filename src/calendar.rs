use crate::calc;
use crate::model::{
    month_name, AttendanceRecord, CalendarCell, CellAttendance, MonthEntry, TermBucket,
};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashMap;

/// Cells in the fixed month grid: 6 weeks of 7 days, always.
pub const GRID_CELLS: usize = 42;

pub fn month_key(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

/// Parse a "YYYY-MM" key. Rejects anything else.
pub fn parse_month_key(key: &str) -> Option<(i32, u32)> {
    let (y, m) = key.trim().split_once('-')?;
    let year = y.parse::<i32>().ok()?;
    let month = m.parse::<u32>().ok()?;
    if (1..=12).contains(&month) {
        Some((year, month))
    } else {
        None
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => 30,
    }
}

/// Selectable months, computed purely from "today": previous, current, and
/// next calendar year, hard-truncated so no month after the current one is
/// ever offered. You cannot browse attendance for a month that has not
/// happened.
pub fn month_catalog(today: NaiveDate) -> Vec<MonthEntry> {
    let bound = (today.year(), today.month());
    let mut entries = Vec::new();
    for year in (today.year() - 1)..=(today.year() + 1) {
        for month in 1..=12u32 {
            if (year, month) > bound {
                continue;
            }
            entries.push(MonthEntry {
                key: month_key(year, month),
                label: format!("{} {}", month_name(month), year),
            });
        }
    }
    entries
}

/// The four fixed terms of an academic year starting in April: 4, 4, 2, and
/// 2 months respectively. Generated for the previous and current academic
/// years. Definitions are returned complete even when their months have not
/// elapsed yet; empty-state messaging is the caller's concern, not the
/// builder's.
pub fn term_catalog(today: NaiveDate) -> Vec<TermBucket> {
    let mut terms = Vec::new();
    for year in [today.year() - 1, today.year()] {
        terms.push(TermBucket {
            name: format!("Term 1 {}", year),
            month_keys: (4..=7).map(|m| month_key(year, m)).collect(),
        });
        terms.push(TermBucket {
            name: format!("Term 2 {}", year),
            month_keys: (8..=11).map(|m| month_key(year, m)).collect(),
        });
        terms.push(TermBucket {
            name: format!("Term 3 {}", year),
            month_keys: vec![month_key(year, 12), month_key(year + 1, 1)],
        });
        terms.push(TermBucket {
            name: format!("Term 4 {}", year),
            month_keys: vec![month_key(year + 1, 2), month_key(year + 1, 3)],
        });
    }
    terms
}

pub fn find_term<'a>(terms: &'a [TermBucket], name: &str) -> Option<&'a TermBucket> {
    terms.iter().find(|t| t.name.eq_ignore_ascii_case(name.trim()))
}

/// Build the fixed 42-cell grid for one month. Weeks start on Sunday: the
/// first of the month is preceded by as many previous-month tail cells as
/// its weekday index, and the sequence runs for exactly six weeks into the
/// next month. Attendance attaches to in-month cells only.
pub fn build_grid(
    year: i32,
    month: u32,
    records: &[AttendanceRecord],
    today: NaiveDate,
) -> Option<Vec<CalendarCell>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let by_date: HashMap<NaiveDate, &AttendanceRecord> =
        records.iter().map(|r| (r.date, r)).collect();

    let leading = i64::from(first.weekday().num_days_from_sunday());
    let start = first - Duration::days(leading);

    let mut cells = Vec::with_capacity(GRID_CELLS);
    for offset in 0..GRID_CELLS as i64 {
        let date = start + Duration::days(offset);
        let in_current_month = date.year() == year && date.month() == month;
        let attendance = if in_current_month {
            by_date.get(&date).map(|r| CellAttendance {
                status: r.status,
                status_label: r.status_label.clone(),
                time: r.created_at.clone(),
                marked_by: r.marked_by.clone(),
                synthetic: r.is_synthetic(),
            })
        } else {
            None
        };
        cells.push(CalendarCell {
            date,
            day: date.day(),
            in_current_month,
            is_today: date == today,
            is_holiday: calc::is_holiday(date),
            attendance,
        });
    }
    Some(cells)
}
