//! Period aggregation of daily station records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::station::StationMetadata;
use crate::types::{BaselineRecord, DailyRecord};

/// Baseline figures attached to a summary for comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineValues {
    pub max_level: Option<f64>,
    pub min_level: Option<f64>,
    pub mean_level: Option<f64>,
    pub mean_rain: Option<f64>,
}

impl From<&BaselineRecord> for BaselineValues {
    fn from(record: &BaselineRecord) -> Self {
        Self {
            max_level: record.max_level,
            min_level: record.min_level,
            mean_level: record.mean_level,
            mean_rain: record.mean_rain,
        }
    }
}

/// Summary statistics for one station over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub station: String,
    pub max_level: f64,
    pub max_level_date: Option<NaiveDate>,
    pub min_level: f64,
    pub min_level_date: Option<NaiveDate>,
    pub mean_level: f64,
    pub rain_sum: f64,
    pub rain_max: f64,
    pub rain_max_date: Option<NaiveDate>,
    pub rain_days: u32,
    pub has_level_data: bool,
    pub mean_level_count: usize,
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineValues>,
}

impl StationSummary {
    /// Summary of a station with no records in range
    pub fn empty(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            max_level: 0.0,
            max_level_date: None,
            min_level: 0.0,
            min_level_date: None,
            mean_level: 0.0,
            rain_sum: 0.0,
            rain_max: 0.0,
            rain_max_date: None,
            rain_days: 0,
            has_level_data: false,
            mean_level_count: 0,
            record_count: 0,
            baseline: None,
        }
    }

    /// Highest level, if any Hmax was read
    pub fn observed_max_level(&self) -> Option<f64> {
        self.max_level_date.map(|_| self.max_level)
    }

    /// Lowest level, if any Hmin was read
    pub fn observed_min_level(&self) -> Option<f64> {
        self.min_level_date.map(|_| self.min_level)
    }

    /// Mean level, if any Htb was read
    pub fn observed_mean_level(&self) -> Option<f64> {
        (self.mean_level_count > 0).then_some(self.mean_level)
    }

    pub fn with_baseline(mut self, baseline: Option<&BaselineRecord>) -> Self {
        self.baseline = baseline.map(BaselineValues::from);
        self
    }
}

/// Running extremum; ties keep the first occurrence
#[derive(Debug, Clone, Copy, Default)]
struct Extremum {
    best: Option<(f64, NaiveDate)>,
}

impl Extremum {
    fn offer_max(&mut self, value: f64, date: NaiveDate) {
        if self.best.map_or(true, |(best, _)| value > best) {
            self.best = Some((value, date));
        }
    }

    fn offer_min(&mut self, value: f64, date: NaiveDate) {
        if self.best.map_or(true, |(best, _)| value < best) {
            self.best = Some((value, date));
        }
    }

    fn value(&self) -> f64 {
        self.best.map_or(0.0, |(v, _)| v)
    }

    fn date(&self) -> Option<NaiveDate> {
        self.best.map(|(_, d)| d)
    }
}

/// Single-pass accumulator for one station's records
#[derive(Debug, Clone, Default)]
pub struct StationAccumulator {
    max_level: Extremum,
    min_level: Extremum,
    mean_sum: f64,
    mean_count: usize,
    has_level: bool,
    rain_sum: f64,
    rain_max: Extremum,
    rain_days: u32,
    records: usize,
}

impl StationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &DailyRecord) {
        self.records += 1;

        if let Some(h) = record.max_level {
            self.has_level = true;
            self.max_level.offer_max(h, record.date);
        }
        if let Some(h) = record.min_level {
            self.has_level = true;
            self.min_level.offer_min(h, record.date);
        }
        if let Some(h) = record.mean_level {
            self.has_level = true;
            self.mean_sum += h;
            self.mean_count += 1;
        }

        if let Some(r) = record.rainfall.r24 {
            self.rain_sum += r;
            if r > 0.0 {
                self.rain_days += 1;
            }
            self.rain_max.offer_max(r, record.date);
        }
    }

    pub fn finish(self, station: impl Into<String>) -> StationSummary {
        if self.records == 0 {
            return StationSummary::empty(station);
        }

        // Levels stay at zero unless some level figure was present.
        let (max_level, min_level) = if self.has_level {
            (self.max_level.value(), self.min_level.value())
        } else {
            (0.0, 0.0)
        };
        let mean_level = if self.mean_count > 0 {
            self.mean_sum / self.mean_count as f64
        } else {
            0.0
        };

        StationSummary {
            station: station.into(),
            max_level,
            max_level_date: self.max_level.date(),
            min_level,
            min_level_date: self.min_level.date(),
            mean_level,
            rain_sum: round_to_tenth(self.rain_sum),
            rain_max: self.rain_max.value(),
            rain_max_date: self.rain_max.date(),
            rain_days: self.rain_days,
            has_level_data: self.has_level,
            mean_level_count: self.mean_count,
            record_count: self.records,
            baseline: None,
        }
    }
}

/// Round to one decimal place
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Aggregate the records of one station, in input order
pub fn aggregate_station(station: &str, records: &[DailyRecord]) -> StationSummary {
    let mut acc = StationAccumulator::new();
    for record in records.iter().filter(|r| r.station == station) {
        acc.add(record);
    }
    acc.finish(station)
}

/// One summary per roster station, in roster order, including stations
/// without any records
pub fn aggregate_roster(roster: &[StationMetadata], records: &[DailyRecord]) -> Vec<StationSummary> {
    roster
        .iter()
        .map(|meta| aggregate_station(&meta.station, records))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellValue, RawRow};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(station: &str, date: NaiveDate) -> DailyRecord {
        DailyRecord::new(station, date)
    }

    #[test]
    fn test_empty_input() {
        let summary = aggregate_station("A", &[]);
        assert!(!summary.has_level_data);
        assert_eq!(summary.max_level, 0.0);
        assert_eq!(summary.min_level, 0.0);
        assert_eq!(summary.rain_sum, 0.0);
        assert_eq!(summary.rain_days, 0);
        assert_eq!(summary.max_level_date, None);
    }

    #[test]
    fn test_non_numeric_rain_is_ignored() {
        let rows: Vec<DailyRecord> = ["10", "abc", "5"]
            .iter()
            .enumerate()
            .map(|(i, r24)| {
                let mut row = RawRow::new();
                row.insert("TenTram".into(), CellValue::from("A"));
                row.insert("Ngay".into(), CellValue::from(format!("2024-01-0{}", i + 1).as_str()));
                row.insert("R24".into(), CellValue::from(*r24));
                DailyRecord::from_row(&row).unwrap()
            })
            .collect();

        let summary = aggregate_station("A", &rows);
        assert_eq!(summary.rain_sum, 15.0);
        assert_eq!(summary.rain_days, 2);
        assert_eq!(summary.rain_max, 10.0);
        assert_eq!(summary.rain_max_date, Some(ymd(2024, 1, 1)));
        assert!(!summary.has_level_data);
        assert_eq!(summary.record_count, 3);
    }

    #[test]
    fn test_ties_keep_first_date() {
        let mut first = record("A", ymd(2024, 1, 3));
        first.max_level = Some(120.0);
        first.min_level = Some(80.0);
        first.rainfall.r24 = Some(7.0);
        let mut second = record("A", ymd(2024, 1, 9));
        second.max_level = Some(120.0);
        second.min_level = Some(80.0);
        second.rainfall.r24 = Some(7.0);

        let summary = aggregate_station("A", &[first, second]);
        assert_eq!(summary.max_level_date, Some(ymd(2024, 1, 3)));
        assert_eq!(summary.min_level_date, Some(ymd(2024, 1, 3)));
        assert_eq!(summary.rain_max_date, Some(ymd(2024, 1, 3)));
    }

    #[test]
    fn test_extrema_and_mean() {
        let mut a = record("A", ymd(2024, 1, 1));
        a.max_level = Some(110.0);
        a.min_level = Some(90.0);
        a.mean_level = Some(100.0);
        let mut b = record("A", ymd(2024, 1, 2));
        b.max_level = Some(130.0);
        b.min_level = Some(95.0);
        b.mean_level = Some(110.0);
        let mut c = record("A", ymd(2024, 1, 3));
        c.min_level = Some(85.0);
        let other = {
            let mut r = record("B", ymd(2024, 1, 2));
            r.max_level = Some(999.0);
            r
        };

        let summary = aggregate_station("A", &[a, b, c, other]);
        assert!(summary.has_level_data);
        assert_eq!(summary.max_level, 130.0);
        assert_eq!(summary.max_level_date, Some(ymd(2024, 1, 2)));
        assert_eq!(summary.min_level, 85.0);
        assert_eq!(summary.min_level_date, Some(ymd(2024, 1, 3)));
        assert_eq!(summary.mean_level, 105.0);
        assert_eq!(summary.record_count, 3);
    }

    #[test]
    fn test_mean_only_records_leave_extrema_unobserved() {
        let mut a = record("A", ymd(2024, 1, 1));
        a.mean_level = Some(120.0);

        let summary = aggregate_station("A", &[a]);
        assert!(summary.has_level_data);
        assert_eq!(summary.max_level, 0.0);
        assert_eq!(summary.observed_max_level(), None);
        assert_eq!(summary.observed_min_level(), None);
        assert_eq!(summary.observed_mean_level(), Some(120.0));
        assert_eq!(summary.mean_level_count, 1);
    }

    #[test]
    fn test_negative_levels_are_not_clamped() {
        let mut a = record("A", ymd(2024, 1, 1));
        a.max_level = Some(-12.0);
        a.min_level = Some(-30.0);
        let summary = aggregate_station("A", &[a]);
        assert_eq!(summary.max_level, -12.0);
        assert_eq!(summary.min_level, -30.0);
    }

    #[test]
    fn test_rain_sum_rounding() {
        let rows: Vec<DailyRecord> = [0.14, 0.12, 0.0]
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let mut rec = record("A", ymd(2024, 1, i as u32 + 1));
                rec.rainfall.r24 = Some(*r);
                rec
            })
            .collect();
        let summary = aggregate_station("A", &rows);
        assert_eq!(summary.rain_sum, 0.3);
        assert_eq!(summary.rain_days, 2);
    }

    #[test]
    fn test_roster_includes_stations_without_rows() {
        let roster = vec![
            StationMetadata::new("A", Some("G")),
            StationMetadata::new("B", Some("G")),
        ];
        let mut a = record("A", ymd(2024, 1, 1));
        a.max_level = Some(100.0);
        a.rainfall.r24 = Some(4.0);

        let summaries = aggregate_roster(&roster, &[a]);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].station, "A");
        assert!(summaries[0].has_level_data);
        assert_eq!(summaries[1], StationSummary::empty("B"));
    }
}
