//! Deviation of observed figures from their baseline

use serde::{Deserialize, Serialize};

use crate::rollups::StationSummary;

/// Differences smaller than this are reported as equal (same unit as inputs)
pub const MATERIAL_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Higher,
    Lower,
    Equal,
}

/// Result of comparing an observed value against a baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Comparison {
    /// No baseline to compare against
    Unavailable,
    Deviation { difference: f64, direction: Direction },
}

impl Comparison {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Comparison::Unavailable => None,
            Comparison::Deviation { direction, .. } => Some(*direction),
        }
    }

    pub fn difference(&self) -> Option<f64> {
        match self {
            Comparison::Unavailable => None,
            Comparison::Deviation { difference, .. } => Some(*difference),
        }
    }
}

/// Compare `observed` with `baseline`; positive difference means higher
pub fn compare(observed: f64, baseline: Option<f64>) -> Comparison {
    let Some(baseline) = baseline else {
        return Comparison::Unavailable;
    };
    let difference = observed - baseline;
    let direction = if difference.abs() < MATERIAL_EPSILON {
        Direction::Equal
    } else if difference > 0.0 {
        Direction::Higher
    } else {
        Direction::Lower
    };
    Comparison::Deviation {
        difference,
        direction,
    }
}

/// A summary's figures set against its baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryComparison {
    pub max_level: Comparison,
    pub min_level: Comparison,
    pub mean_level: Comparison,
    pub rain_sum: Comparison,
}

impl SummaryComparison {
    /// Each level comparison needs that level to have been read; the rain
    /// comparison needs at least one record in range.
    pub fn of(summary: &StationSummary) -> Self {
        let baseline = summary.baseline.unwrap_or_default();
        let level = |observed: Option<f64>, reference: Option<f64>| {
            observed.map_or(Comparison::Unavailable, |v| compare(v, reference))
        };

        Self {
            max_level: level(summary.observed_max_level(), baseline.max_level),
            min_level: level(summary.observed_min_level(), baseline.min_level),
            mean_level: level(summary.observed_mean_level(), baseline.mean_level),
            rain_sum: if summary.record_count > 0 {
                compare(summary.rain_sum, baseline.mean_rain)
            } else {
                Comparison::Unavailable
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodCode;
    use crate::rollups::{aggregate_station, BaselineValues};
    use crate::types::{BaselineRecord, DailyRecord};
    use chrono::NaiveDate;

    #[test]
    fn test_absent_baseline() {
        assert_eq!(compare(120.0, None), Comparison::Unavailable);
        assert_eq!(compare(0.0, None).direction(), None);
    }

    #[test]
    fn test_materially_equal() {
        let result = compare(105.00, Some(105.004));
        assert_eq!(result.direction(), Some(Direction::Equal));
    }

    #[test]
    fn test_signed_difference() {
        assert_eq!(
            compare(110.0, Some(100.0)),
            Comparison::Deviation {
                difference: 10.0,
                direction: Direction::Higher
            }
        );
        let lower = compare(95.5, Some(100.0));
        assert_eq!(lower.direction(), Some(Direction::Lower));
        assert_eq!(lower.difference(), Some(-4.5));
    }

    #[test]
    fn test_zero_baseline_is_a_real_baseline() {
        assert_eq!(compare(3.0, Some(0.0)).direction(), Some(Direction::Higher));
    }

    #[test]
    fn test_summary_comparison() {
        let mut summary = StationSummary::empty("A");
        summary.baseline = Some(BaselineValues {
            max_level: Some(140.0),
            min_level: Some(90.0),
            mean_level: None,
            mean_rain: Some(100.0),
        });

        let none = SummaryComparison::of(&summary);
        assert_eq!(none.max_level, Comparison::Unavailable);
        assert_eq!(none.rain_sum, Comparison::Unavailable);

        summary.has_level_data = true;
        summary.record_count = 31;
        summary.max_level = 150.0;
        summary.max_level_date = NaiveDate::from_ymd_opt(2024, 1, 4);
        summary.min_level = 90.004;
        summary.min_level_date = NaiveDate::from_ymd_opt(2024, 1, 20);
        summary.rain_sum = 80.0;

        let cmp = SummaryComparison::of(&summary);
        assert_eq!(cmp.max_level.direction(), Some(Direction::Higher));
        assert_eq!(cmp.min_level.direction(), Some(Direction::Equal));
        assert_eq!(cmp.mean_level, Comparison::Unavailable);
        assert_eq!(cmp.rain_sum.direction(), Some(Direction::Lower));
    }

    #[test]
    fn test_unread_levels_are_not_compared() {
        let mut record = DailyRecord::new("A", NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        record.mean_level = Some(120.0);
        let baseline = BaselineRecord {
            station: "A".into(),
            month: 1,
            period: PeriodCode::FullMonth,
            mean_level: Some(110.0),
            max_level: Some(140.0),
            min_level: Some(90.0),
            mean_rain: None,
        };
        let summary = aggregate_station("A", &[record]).with_baseline(Some(&baseline));

        let cmp = SummaryComparison::of(&summary);
        assert_eq!(cmp.max_level, Comparison::Unavailable);
        assert_eq!(cmp.min_level, Comparison::Unavailable);
        assert_eq!(cmp.mean_level.difference(), Some(10.0));
        assert_eq!(cmp.rain_sum, Comparison::Unavailable);
    }

    #[test]
    fn test_comparison_serde() {
        let json = serde_json::to_string(&compare(110.0, Some(100.0))).unwrap();
        assert_eq!(json, r#"{"status":"deviation","difference":10.0,"direction":"higher"}"#);
        let json = serde_json::to_string(&Comparison::Unavailable).unwrap();
        assert_eq!(json, r#"{"status":"unavailable"}"#);
    }
}
