use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Whether Saturdays count toward attendance statistics. The observed
/// behaviour upstream was inconsistent between surfaces; here one policy is
/// chosen and applied at the single aggregation pre-filter seam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaturdayPolicy {
    #[default]
    Counted,
    Excluded,
}

impl SaturdayPolicy {
    pub fn counts(self, date: NaiveDate) -> bool {
        match self {
            SaturdayPolicy::Counted => true,
            SaturdayPolicy::Excluded => date.weekday() != Weekday::Sat,
        }
    }
}

/// Engine tunables, overridable per workspace via `workspace.select`'s
/// `engine` param.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// How many months the "overall" report mode includes at most. The
    /// default matches the behaviour this engine replaces.
    pub overall_month_cap: usize,
    pub saturday: SaturdayPolicy,
    /// Overall wall-clock budget for the fetch strategy chain, checked
    /// between attempts. Once spent, remaining strategies are skipped and
    /// the resolver degrades to synthetic data.
    pub budget_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overall_month_cap: 2,
            saturday: SaturdayPolicy::default(),
            budget_ms: 2_000,
        }
    }
}
