use crate::calc;
use crate::model::{AttendanceRecord, RawAttendanceRow};
use crate::synth::{self, SampleMode};
use chrono::{Datelike, NaiveDate};
use rusqlite::{params_from_iter, types::Value, Connection};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Candidate attendance tables, newest schema first. The store's schema has
/// drifted across app generations; rows may live under any of these names.
pub const CANDIDATE_TABLES: [&str; 3] = ["student_attendance", "attendance_records", "attendance"];

#[derive(Debug, Clone)]
pub struct FetchCriteria {
    pub student_id: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug)]
pub struct FetchError(pub String);

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One named attempt to read attendance rows from a specific store
/// location. Strategies share this uniform signature so a single generic
/// resolver can iterate them.
pub trait FetchStrategy {
    fn name(&self) -> &str;
    fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<RawAttendanceRow>, FetchError>;
}

/// Reads one candidate table in the workspace store.
pub struct TableStrategy<'a> {
    conn: &'a Connection,
    table: &'static str,
}

impl<'a> TableStrategy<'a> {
    pub fn new(conn: &'a Connection, table: &'static str) -> Self {
        Self { conn, table }
    }
}

impl FetchStrategy for TableStrategy<'_> {
    fn name(&self) -> &str {
        self.table
    }

    fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<RawAttendanceRow>, FetchError> {
        let mut sql = format!(
            "SELECT id, student_id, class_id, date, status, marked_by, created_at
             FROM {} WHERE student_id = ?",
            self.table
        );
        let mut params: Vec<Value> = vec![Value::Text(criteria.student_id.clone())];
        if let Some(from) = criteria.from {
            sql.push_str(" AND date >= ?");
            params.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = criteria.to {
            sql.push_str(" AND date <= ?");
            params.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }
        sql.push_str(" ORDER BY date DESC");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| FetchError(e.to_string()))?;
        stmt.query_map(params_from_iter(params), |r| {
            Ok(RawAttendanceRow {
                id: r.get(0)?,
                student_id: r.get(1)?,
                class_id: r.get(2)?,
                date: r.get(3)?,
                status: r.get(4)?,
                marked_by: r.get(5)?,
                created_at: r.get(6)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| FetchError(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AttemptOutcome {
    Rows { count: usize },
    Empty,
    Failed { message: String },
    Skipped { reason: String },
}

/// One entry of the attempt trail. Returned on the wire so callers (and
/// tests) can see exactly which strategy produced the data without parsing
/// log text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAttempt {
    pub strategy: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum DataSource {
    Store { table: String },
    ConfirmedEmpty,
    Synthetic,
}

#[derive(Debug)]
pub struct Resolution {
    pub records: Vec<AttendanceRecord>,
    pub source: DataSource,
    pub attempts: Vec<StrategyAttempt>,
    /// Soft advisory for the UI ("showing sample data"); never a hard error.
    pub advisory: Option<String>,
}

/// The range synthetic data covers when the request itself was unbounded:
/// the six months ending today.
pub fn default_synthetic_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let mut year = today.year();
    let mut month = today.month();
    for _ in 0..5 {
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today);
    (start, today)
}

fn synthetic_resolution(
    criteria: &FetchCriteria,
    mode: SampleMode,
    today: NaiveDate,
    attempts: Vec<StrategyAttempt>,
    advisory: &str,
) -> Resolution {
    let (start, end) = match (criteria.from, criteria.to) {
        (Some(from), Some(to)) => (from, to),
        _ => default_synthetic_range(today),
    };
    info!(student = %criteria.student_id, %start, %end, ?mode, "degrading to synthetic attendance data");
    Resolution {
        records: synth::generate(&criteria.student_id, mode, start, end),
        source: DataSource::Synthetic,
        attempts,
        advisory: Some(advisory.to_string()),
    }
}

/// Walk the strategy chain: first success wins, where success means no error
/// and at least one row. A clean empty result advances the chain except at
/// the last strategy, where it is accepted as confirmed-no-data. Errors
/// never propagate; exhausting the chain (or the time budget) degrades to
/// the synthetic generator so the caller always has something coherent.
pub fn resolve_with(
    strategies: &[&dyn FetchStrategy],
    criteria: &FetchCriteria,
    mode: SampleMode,
    today: NaiveDate,
    budget: Duration,
) -> Resolution {
    // A malformed student id is guaranteed to match nothing; skip the store
    // round trips entirely.
    if Uuid::parse_str(criteria.student_id.trim()).is_err() {
        warn!(student = %criteria.student_id, "student id is not UUID-shaped; skipping store lookup");
        return synthetic_resolution(
            criteria,
            mode,
            today,
            Vec::new(),
            "invalid student id - showing sample data",
        );
    }

    let started = Instant::now();
    let mut attempts = Vec::with_capacity(strategies.len());
    let last = strategies.len().saturating_sub(1);

    for (index, strategy) in strategies.iter().enumerate() {
        if started.elapsed() > budget {
            warn!(
                skipped = strategies.len() - index,
                "fetch budget exhausted; skipping remaining strategies"
            );
            // Every unvisited strategy gets its own trail entry so the
            // attempt list always names the whole chain.
            for remaining in &strategies[index..] {
                attempts.push(StrategyAttempt {
                    strategy: remaining.name().to_string(),
                    outcome: AttemptOutcome::Skipped {
                        reason: "budget exhausted".to_string(),
                    },
                });
            }
            break;
        }
        match strategy.fetch(criteria) {
            Ok(rows) if !rows.is_empty() => {
                info!(strategy = strategy.name(), rows = rows.len(), "fetch strategy succeeded");
                attempts.push(StrategyAttempt {
                    strategy: strategy.name().to_string(),
                    outcome: AttemptOutcome::Rows { count: rows.len() },
                });
                return Resolution {
                    records: calc::normalize_rows(rows),
                    source: DataSource::Store {
                        table: strategy.name().to_string(),
                    },
                    attempts,
                    advisory: None,
                };
            }
            Ok(_) => {
                info!(strategy = strategy.name(), "fetch strategy returned no rows");
                attempts.push(StrategyAttempt {
                    strategy: strategy.name().to_string(),
                    outcome: AttemptOutcome::Empty,
                });
                if index == last {
                    // Every location answered and the final one is cleanly
                    // empty: this student genuinely has no history.
                    return Resolution {
                        records: Vec::new(),
                        source: DataSource::ConfirmedEmpty,
                        attempts,
                        advisory: None,
                    };
                }
            }
            Err(e) => {
                warn!(strategy = strategy.name(), error = %e, "fetch strategy failed");
                attempts.push(StrategyAttempt {
                    strategy: strategy.name().to_string(),
                    outcome: AttemptOutcome::Failed {
                        message: e.to_string(),
                    },
                });
            }
        }
    }

    synthetic_resolution(
        criteria,
        mode,
        today,
        attempts,
        "Using sample data - connection issue",
    )
}

/// Resolve against the workspace store's candidate tables.
pub fn resolve_store(
    conn: &Connection,
    criteria: &FetchCriteria,
    mode: SampleMode,
    today: NaiveDate,
    budget: Duration,
) -> Resolution {
    let strategies: Vec<TableStrategy> = CANDIDATE_TABLES
        .iter()
        .map(|table| TableStrategy::new(conn, table))
        .collect();
    let refs: Vec<&dyn FetchStrategy> = strategies
        .iter()
        .map(|s| s as &dyn FetchStrategy)
        .collect();
    resolve_with(&refs, criteria, mode, today, budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;

    const STUDENT: &str = "5f0c2a9e-6a4b-4f5d-9c3e-2b1a8d7e6f50";

    struct Fake {
        name: &'static str,
        result: fn() -> Result<Vec<RawAttendanceRow>, FetchError>,
    }

    impl FetchStrategy for Fake {
        fn name(&self) -> &str {
            self.name
        }
        fn fetch(&self, _criteria: &FetchCriteria) -> Result<Vec<RawAttendanceRow>, FetchError> {
            (self.result)()
        }
    }

    fn rows() -> Result<Vec<RawAttendanceRow>, FetchError> {
        Ok(vec![RawAttendanceRow {
            id: "row-1".to_string(),
            student_id: STUDENT.to_string(),
            class_id: "c1".to_string(),
            date: "2025-06-02".to_string(),
            status: "Present".to_string(),
            marked_by: Some("t1".to_string()),
            created_at: None,
        }])
    }

    fn criteria() -> FetchCriteria {
        FetchCriteria {
            student_id: STUDENT.to_string(),
            from: Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            to: Some(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn first_success_wins_not_first_response() {
        let fail = Fake {
            name: "broken",
            result: || Err(FetchError("no such table".to_string())),
        };
        let empty = Fake {
            name: "empty",
            result: || Ok(Vec::new()),
        };
        let full = Fake {
            name: "full",
            result: rows,
        };
        let strategies: [&dyn FetchStrategy; 3] = [&fail, &empty, &full];
        let resolution = resolve_with(
            &strategies,
            &criteria(),
            SampleMode::SixDay,
            today(),
            Duration::from_secs(2),
        );

        assert_eq!(
            resolution.source,
            DataSource::Store {
                table: "full".to_string()
            }
        );
        assert_eq!(resolution.records.len(), 1);
        assert_eq!(resolution.records[0].status, Status::Present);
        assert_eq!(
            resolution
                .attempts
                .iter()
                .map(|a| a.outcome.clone())
                .collect::<Vec<_>>(),
            vec![
                AttemptOutcome::Failed {
                    message: "no such table".to_string()
                },
                AttemptOutcome::Empty,
                AttemptOutcome::Rows { count: 1 },
            ]
        );
        assert!(resolution.advisory.is_none());
    }

    #[test]
    fn all_failures_degrade_to_deterministic_synthetic_data() {
        let a = Fake {
            name: "a",
            result: || Err(FetchError("boom".to_string())),
        };
        let b = Fake {
            name: "b",
            result: || Err(FetchError("boom".to_string())),
        };
        let strategies: [&dyn FetchStrategy; 2] = [&a, &b];
        let c = criteria();
        let resolution = resolve_with(
            &strategies,
            &c,
            SampleMode::SixDay,
            today(),
            Duration::from_secs(2),
        );

        assert_eq!(resolution.source, DataSource::Synthetic);
        assert!(!resolution.records.is_empty());
        assert_eq!(
            resolution.records,
            synth::generate(STUDENT, SampleMode::SixDay, c.from.unwrap(), c.to.unwrap())
        );
        assert!(resolution.advisory.is_some());
    }

    #[test]
    fn last_strategy_clean_empty_is_confirmed_no_data() {
        let a = Fake {
            name: "a",
            result: || Err(FetchError("boom".to_string())),
        };
        let b = Fake {
            name: "b",
            result: || Ok(Vec::new()),
        };
        let strategies: [&dyn FetchStrategy; 2] = [&a, &b];
        let resolution = resolve_with(
            &strategies,
            &criteria(),
            SampleMode::SixDay,
            today(),
            Duration::from_secs(2),
        );

        assert_eq!(resolution.source, DataSource::ConfirmedEmpty);
        assert!(resolution.records.is_empty());
        assert!(resolution.advisory.is_none());
    }

    #[test]
    fn non_uuid_student_id_short_circuits_to_synthetic() {
        let would_panic = Fake {
            name: "store",
            result: || panic!("store must not be called"),
        };
        let strategies: [&dyn FetchStrategy; 1] = [&would_panic];
        let resolution = resolve_with(
            &strategies,
            &FetchCriteria {
                student_id: "sample-student".to_string(),
                from: None,
                to: None,
            },
            SampleMode::Sparse,
            today(),
            Duration::from_secs(2),
        );

        assert_eq!(resolution.source, DataSource::Synthetic);
        assert!(resolution.attempts.is_empty());
        assert!(!resolution.records.is_empty());
    }

    #[test]
    fn exhausted_budget_skips_every_remaining_strategy_and_degrades() {
        struct Slow;
        impl FetchStrategy for Slow {
            fn name(&self) -> &str {
                "slow"
            }
            fn fetch(&self, _criteria: &FetchCriteria) -> Result<Vec<RawAttendanceRow>, FetchError> {
                std::thread::sleep(Duration::from_millis(30));
                Err(FetchError("timed out".to_string()))
            }
        }
        let never_a = Fake {
            name: "never-a",
            result: || panic!("must not run after the budget is spent"),
        };
        let never_b = Fake {
            name: "never-b",
            result: || panic!("must not run after the budget is spent"),
        };
        let strategies: [&dyn FetchStrategy; 3] = [&Slow, &never_a, &never_b];
        let c = criteria();
        let resolution = resolve_with(
            &strategies,
            &c,
            SampleMode::SixDay,
            today(),
            Duration::from_millis(5),
        );

        assert_eq!(resolution.source, DataSource::Synthetic);
        assert!(resolution.advisory.is_some());
        assert_eq!(
            resolution.records,
            synth::generate(STUDENT, SampleMode::SixDay, c.from.unwrap(), c.to.unwrap())
        );

        // The trail still names the whole chain: one failure, two skips.
        assert_eq!(resolution.attempts.len(), 3);
        assert_eq!(
            resolution.attempts[0].outcome,
            AttemptOutcome::Failed {
                message: "timed out".to_string()
            }
        );
        assert_eq!(resolution.attempts[1].strategy, "never-a");
        assert_eq!(resolution.attempts[2].strategy, "never-b");
        assert!(resolution.attempts[1..].iter().all(|a| a.outcome
            == AttemptOutcome::Skipped {
                reason: "budget exhausted".to_string()
            }));
    }

    #[test]
    fn unbounded_fallback_covers_six_months() {
        let (start, end) = default_synthetic_range(today());
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(end, today());
    }
}
