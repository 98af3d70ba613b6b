use crate::config::SaturdayPolicy;
use crate::model::{AttendanceRecord, AttendanceStats, RawAttendanceRow, StatsScope, Status, TermBucket};
use chrono::{NaiveDate, Weekday};
use chrono::Datelike;
use std::collections::HashSet;
use tracing::warn;

/// The single holiday rule: Sundays are excluded from attendance tracking,
/// Saturdays are normal attendance days. Every component consults this
/// predicate instead of re-deriving day-of-week logic.
pub fn is_holiday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}

/// Case-normalized status mapping. Unrecognized labels count as absent for
/// statistics; the caller keeps the verbatim label for display.
pub fn normalize_status(raw: &str) -> Status {
    if raw.trim().eq_ignore_ascii_case("present") {
        Status::Present
    } else {
        Status::Absent
    }
}

/// Turn raw store rows into canonical records, dropping what the pipeline
/// must not carry: unparseable dates, Sunday rows (misbehaving producers,
/// logged, never an error), and duplicate (student, date) pairs (first row
/// wins). Output is sorted ascending by date.
pub fn normalize_rows(rows: Vec<RawAttendanceRow>) -> Vec<AttendanceRecord> {
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::new();
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let date = match NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d") {
            Ok(d) => d,
            Err(e) => {
                warn!(row = %row.id, date = %row.date, error = %e, "dropping row with unparseable date");
                continue;
            }
        };
        if is_holiday(date) {
            warn!(row = %row.id, %date, "dropping Sunday row from upstream");
            continue;
        }
        if !seen.insert((row.student_id.clone(), date)) {
            warn!(row = %row.id, %date, "dropping duplicate (student, date) row");
            continue;
        }
        let label = row.status.trim().to_string();
        records.push(AttendanceRecord {
            id: row.id,
            student_id: row.student_id,
            class_id: row.class_id,
            date,
            status: normalize_status(&label),
            status_label: label,
            marked_by: row.marked_by.unwrap_or_else(|| "system".to_string()),
            created_at: row.created_at,
        });
    }
    records.sort_by_key(|r| r.date);
    records
}

/// The one aggregation routine. Every surface (dashboard, calendar, term
/// report) obtains its numbers by pre-filtering a record set and calling
/// this; no other percentage math exists in the crate.
pub fn aggregate<'a, I>(records: I) -> AttendanceStats
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut present: u32 = 0;
    let mut absent: u32 = 0;
    for record in records {
        match record.status {
            Status::Present => present += 1,
            Status::Absent => absent += 1,
        }
    }
    let total = present + absent;
    // Round half-up; an empty set is 0%, not a division error.
    let percentage = if total == 0 {
        0
    } else {
        ((f64::from(present) / f64::from(total)) * 100.0).round() as u32
    };
    AttendanceStats {
        present,
        absent,
        total,
        percentage,
    }
}

/// Scope membership test used as the aggregation pre-filter. `Year` means
/// the academic year starting April of the given calendar year, matching the
/// term system.
pub fn scope_keeps(scope: &StatsScope, terms: &[TermBucket], record: &AttendanceRecord) -> bool {
    match scope {
        StatsScope::All => true,
        StatsScope::Month(key) => record.month_key() == *key,
        StatsScope::Year(start_year) => {
            let from = NaiveDate::from_ymd_opt(*start_year, 4, 1);
            let to = NaiveDate::from_ymd_opt(*start_year + 1, 3, 31);
            match (from, to) {
                (Some(from), Some(to)) => record.date >= from && record.date <= to,
                _ => false,
            }
        }
        StatsScope::Term(name) => terms
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
            .map(|t| t.month_keys.contains(&record.month_key()))
            .unwrap_or(false),
    }
}

/// The single seam where the Saturday policy and a scope filter are applied
/// before aggregation.
pub fn stats_for(
    records: &[AttendanceRecord],
    scope: &StatsScope,
    terms: &[TermBucket],
    saturday: SaturdayPolicy,
) -> AttendanceStats {
    aggregate(
        records
            .iter()
            .filter(|r| saturday.counts(r.date))
            .filter(|r| scope_keeps(scope, terms, r)),
    )
}
