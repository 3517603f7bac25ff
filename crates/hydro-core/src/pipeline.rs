use anyhow::Result;
use chrono::NaiveDate;

use crate::period::PeriodCode;
use crate::station::StationMetadata;
use crate::types::{BaselineRecord, DailyRecord, ManualEntry, UpsertOutcome};

/// Backend query interface consumed by the report pipelines
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    /// Distinct (station, group) pairs seen in reading storage
    async fn station_roster(&self) -> Result<Vec<StationMetadata>>;

    /// One station's records in an inclusive date range, ordered by date
    async fn readings_for_station(
        &self,
        station: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRecord>>;

    /// Records of several stations in an inclusive date range, ordered by date
    async fn readings_for_stations(
        &self,
        stations: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRecord>>;

    /// Every station's record for one day
    async fn readings_on(&self, date: NaiveDate) -> Result<Vec<DailyRecord>>;

    /// Baselines for the given stations under (month, period)
    async fn baselines(
        &self,
        stations: &[String],
        month: u32,
        period: PeriodCode,
    ) -> Result<Vec<BaselineRecord>>;

    /// Write one column of the record keyed by (station, date)
    async fn upsert_reading(&self, entry: &ManualEntry) -> Result<UpsertOutcome>;

    /// Bump the visitor counter and return its new value
    async fn record_visit(&self) -> Result<i64>;
}
