//! Period selection and date-range resolution

use chrono::{Datelike, Months, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem::replace;
use std::str::FromStr;

use crate::types::RecordError;

/// Period resolution error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeriodError {
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    #[error("Period {0} requires an anchor date")]
    MissingAnchor(PeriodCode),

    #[error("Date out of range for {year}-{month:02}")]
    OutOfRange { year: i32, month: u32 },
}

/// Enumerated reporting windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodCode {
    #[serde(rename = "MONTH")]
    FullMonth,
    #[serde(rename = "T1")]
    FirstThird,
    #[serde(rename = "T2")]
    SecondThird,
    #[serde(rename = "T3")]
    LastThird,
    #[serde(rename = "DAY")]
    SingleDay,
    #[serde(rename = "WEEK")]
    SingleWeek,
}

impl PeriodCode {
    pub const ALL: [PeriodCode; 6] = [
        PeriodCode::FullMonth,
        PeriodCode::FirstThird,
        PeriodCode::SecondThird,
        PeriodCode::LastThird,
        PeriodCode::SingleDay,
        PeriodCode::SingleWeek,
    ];

    /// Code as stored in the baseline table
    pub fn code(self) -> &'static str {
        match self {
            PeriodCode::FullMonth => "MONTH",
            PeriodCode::FirstThird => "T1",
            PeriodCode::SecondThird => "T2",
            PeriodCode::LastThird => "T3",
            PeriodCode::SingleDay => "DAY",
            PeriodCode::SingleWeek => "WEEK",
        }
    }

    /// Whether baselines are published under this code
    pub fn has_own_baseline(self) -> bool {
        !matches!(self, PeriodCode::SingleDay | PeriodCode::SingleWeek)
    }
}

impl fmt::Display for PeriodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PeriodCode {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PeriodCode::ALL
            .into_iter()
            .find(|p| p.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RecordError::UnknownPeriod(s.to_string()))
    }
}

/// A period selection as made by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSelection {
    pub year: i32,
    pub month: u32,
    pub period: PeriodCode,
    pub anchor: Option<NaiveDate>,
}

impl PeriodSelection {
    pub fn new(year: i32, month: u32, period: PeriodCode) -> Self {
        Self {
            year,
            month,
            period,
            anchor: None,
        }
    }

    pub fn with_anchor(mut self, anchor: NaiveDate) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

/// Concrete inclusive date range plus the key for baseline lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub baseline_month: u32,
    pub baseline_period: PeriodCode,
}

impl ResolvedPeriod {
    /// Iterate every day of the period
    pub fn days(&self) -> DateRange {
        DateRange(self.start, self.end)
    }

    /// Number of days covered
    pub fn len_days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1).max(0) as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Inclusive date iterator
#[derive(Clone, Eq, PartialEq, Copy, Debug)]
pub struct DateRange(pub NaiveDate, pub NaiveDate);

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 <= self.1 {
            let next = self.0.checked_add_signed(TimeDelta::days(1))?;
            Some(replace(&mut self.0, next))
        } else {
            None
        }
    }
}

/// Last calendar day of a month
pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate, PeriodError> {
    if !(1..=12).contains(&month) {
        return Err(PeriodError::InvalidMonth(month));
    }
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .ok_or(PeriodError::OutOfRange { year, month })
}

fn day_of(year: i32, month: u32, day: u32) -> Result<NaiveDate, PeriodError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(PeriodError::OutOfRange { year, month })
}

/// Resolve a selection into its date range and baseline key
pub fn resolve(selection: &PeriodSelection) -> Result<ResolvedPeriod, PeriodError> {
    let PeriodSelection {
        year,
        month,
        period,
        anchor,
    } = *selection;

    let within_month = |start_day: u32, end: NaiveDate| -> Result<ResolvedPeriod, PeriodError> {
        Ok(ResolvedPeriod {
            start: day_of(year, month, start_day)?,
            end,
            baseline_month: month,
            baseline_period: period,
        })
    };

    match period {
        PeriodCode::FullMonth => within_month(1, last_day_of_month(year, month)?),
        PeriodCode::FirstThird => {
            last_day_of_month(year, month)?;
            within_month(1, day_of(year, month, 10)?)
        }
        PeriodCode::SecondThird => {
            last_day_of_month(year, month)?;
            within_month(11, day_of(year, month, 20)?)
        }
        PeriodCode::LastThird => within_month(21, last_day_of_month(year, month)?),
        PeriodCode::SingleDay => {
            let day = anchor.ok_or(PeriodError::MissingAnchor(period))?;
            Ok(ResolvedPeriod {
                start: day,
                end: day,
                baseline_month: day.month(),
                baseline_period: PeriodCode::FullMonth,
            })
        }
        PeriodCode::SingleWeek => match anchor {
            Some(start) => {
                let end = start
                    .checked_add_signed(TimeDelta::days(6))
                    .ok_or(PeriodError::OutOfRange {
                        year: start.year(),
                        month: start.month(),
                    })?;
                Ok(ResolvedPeriod {
                    start,
                    end,
                    baseline_month: start.month(),
                    baseline_period: PeriodCode::FullMonth,
                })
            }
            // No anchor: first seven days of the selected month.
            None => {
                last_day_of_month(year, month)?;
                Ok(ResolvedPeriod {
                    start: day_of(year, month, 1)?,
                    end: day_of(year, month, 7)?,
                    baseline_month: month,
                    baseline_period: PeriodCode::FullMonth,
                })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_full_month_february() {
        let leap = resolve(&PeriodSelection::new(2024, 2, PeriodCode::FullMonth)).unwrap();
        assert_eq!(leap.start, ymd(2024, 2, 1));
        assert_eq!(leap.end, ymd(2024, 2, 29));

        let plain = resolve(&PeriodSelection::new(2023, 2, PeriodCode::FullMonth)).unwrap();
        assert_eq!(plain.end, ymd(2023, 2, 28));

        let century = resolve(&PeriodSelection::new(1900, 2, PeriodCode::FullMonth)).unwrap();
        assert_eq!(century.end, ymd(1900, 2, 28));
    }

    #[test]
    fn test_thirds() {
        let t1 = resolve(&PeriodSelection::new(2024, 4, PeriodCode::FirstThird)).unwrap();
        assert_eq!((t1.start, t1.end), (ymd(2024, 4, 1), ymd(2024, 4, 10)));
        assert_eq!(t1.baseline_period, PeriodCode::FirstThird);

        let t2 = resolve(&PeriodSelection::new(2024, 4, PeriodCode::SecondThird)).unwrap();
        assert_eq!((t2.start, t2.end), (ymd(2024, 4, 11), ymd(2024, 4, 20)));

        let t3_31 = resolve(&PeriodSelection::new(2024, 1, PeriodCode::LastThird)).unwrap();
        assert_eq!((t3_31.start, t3_31.end), (ymd(2024, 1, 21), ymd(2024, 1, 31)));
        assert_eq!(t3_31.len_days(), 11);

        let t3_30 = resolve(&PeriodSelection::new(2024, 4, PeriodCode::LastThird)).unwrap();
        assert_eq!(t3_30.end, ymd(2024, 4, 30));
        assert_eq!(t3_30.len_days(), 10);
    }

    #[test]
    fn test_month_periods_stay_inside_month() {
        for month in 1..=12 {
            for period in [
                PeriodCode::FullMonth,
                PeriodCode::FirstThird,
                PeriodCode::SecondThird,
                PeriodCode::LastThird,
            ] {
                let r = resolve(&PeriodSelection::new(2023, month, period)).unwrap();
                assert!(r.end >= r.start);
                assert_eq!((r.start.year(), r.start.month()), (2023, month));
                assert_eq!((r.end.year(), r.end.month()), (2023, month));
                assert_eq!(r.baseline_month, month);
                assert_eq!(r.baseline_period, period);
            }
        }
    }

    #[test]
    fn test_single_day_uses_anchor_month() {
        let sel = PeriodSelection::new(2024, 1, PeriodCode::SingleDay).with_anchor(ymd(2024, 3, 9));
        let r = resolve(&sel).unwrap();
        assert_eq!((r.start, r.end), (ymd(2024, 3, 9), ymd(2024, 3, 9)));
        assert_eq!(r.baseline_month, 3);
        assert_eq!(r.baseline_period, PeriodCode::FullMonth);

        let missing = resolve(&PeriodSelection::new(2024, 1, PeriodCode::SingleDay));
        assert_eq!(missing, Err(PeriodError::MissingAnchor(PeriodCode::SingleDay)));
    }

    #[test]
    fn test_single_week() {
        let sel =
            PeriodSelection::new(2024, 1, PeriodCode::SingleWeek).with_anchor(ymd(2024, 1, 28));
        let r = resolve(&sel).unwrap();
        assert_eq!((r.start, r.end), (ymd(2024, 1, 28), ymd(2024, 2, 3)));
        assert_eq!(r.baseline_month, 1);
        assert_eq!(r.baseline_period, PeriodCode::FullMonth);
        assert_eq!(r.days().count(), 7);

        let fallback = resolve(&PeriodSelection::new(2024, 5, PeriodCode::SingleWeek)).unwrap();
        assert_eq!((fallback.start, fallback.end), (ymd(2024, 5, 1), ymd(2024, 5, 7)));
        assert_eq!(fallback.baseline_month, 5);
        assert_eq!(fallback.baseline_period, PeriodCode::FullMonth);
    }

    #[test]
    fn test_invalid_month() {
        assert_eq!(
            resolve(&PeriodSelection::new(2024, 13, PeriodCode::FirstThird)),
            Err(PeriodError::InvalidMonth(13))
        );
        assert_eq!(
            resolve(&PeriodSelection::new(2024, 0, PeriodCode::FullMonth)),
            Err(PeriodError::InvalidMonth(0))
        );
    }

    #[test]
    fn test_period_code_parsing() {
        assert_eq!("t2".parse::<PeriodCode>(), Ok(PeriodCode::SecondThird));
        assert_eq!("MONTH".parse::<PeriodCode>(), Ok(PeriodCode::FullMonth));
        assert!("T4".parse::<PeriodCode>().is_err());
        assert!(!PeriodCode::SingleWeek.has_own_baseline());
        assert!(PeriodCode::LastThird.has_own_baseline());
    }

    #[test]
    fn test_date_range() {
        let range = DateRange(ymd(2022, 1, 1), ymd(2022, 1, 5));
        assert_eq!(range.count(), 5);
        assert_eq!(DateRange(ymd(2022, 3, 15), ymd(2022, 3, 14)).count(), 0);
        assert!(resolve(&PeriodSelection::new(2024, 1, PeriodCode::FullMonth))
            .unwrap()
            .contains(ymd(2024, 1, 31)));
    }
}
