//! Historical-average ("TBNN") lookup

use serde::{Deserialize, Serialize};

use crate::period::{PeriodCode, ResolvedPeriod};
use crate::types::BaselineRecord;

/// Exact lookup key for a baseline record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaselineKey {
    pub station: String,
    pub month: u32,
    pub period: PeriodCode,
}

impl BaselineKey {
    pub fn new(station: impl Into<String>, month: u32, period: PeriodCode) -> Self {
        Self {
            station: station.into(),
            month,
            period,
        }
    }

    /// Key for a resolved period; day and week selections already map to
    /// the full month here
    pub fn for_period(station: impl Into<String>, period: &ResolvedPeriod) -> Self {
        Self::new(station, period.baseline_month, period.baseline_period)
    }

    pub fn matches(&self, record: &BaselineRecord) -> bool {
        record.station == self.station && record.month == self.month && record.period == self.period
    }
}

/// Find the baseline for `key`. Absence is a normal outcome.
pub fn resolve_baseline<'a>(
    baselines: &'a [BaselineRecord],
    key: &BaselineKey,
) -> Option<&'a BaselineRecord> {
    baselines.iter().find(|b| key.matches(b))
}
