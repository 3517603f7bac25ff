//! [`ReadingStore`] backed by the hosted PostgreSQL schema

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use hydro_core::{
    BaselineRecord, DailyRecord, ManualEntry, PeriodCode, ReadingStore, StationMetadata,
    UpsertOutcome,
};

use crate::DbClient;

#[async_trait]
impl ReadingStore for DbClient {
    async fn station_roster(&self) -> Result<Vec<StationMetadata>> {
        Ok(self.get_station_roster().await?)
    }

    async fn readings_for_station(
        &self,
        station: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRecord>> {
        Ok(self.get_readings_for_station(station, start, end).await?)
    }

    async fn readings_for_stations(
        &self,
        stations: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRecord>> {
        Ok(self.get_readings_for_stations(stations, start, end).await?)
    }

    async fn readings_on(&self, date: NaiveDate) -> Result<Vec<DailyRecord>> {
        Ok(self.get_readings_on(date).await?)
    }

    async fn baselines(
        &self,
        stations: &[String],
        month: u32,
        period: PeriodCode,
    ) -> Result<Vec<BaselineRecord>> {
        Ok(self.get_baselines(stations, month, period).await?)
    }

    async fn upsert_reading(&self, entry: &ManualEntry) -> Result<UpsertOutcome> {
        Ok(DbClient::upsert_reading(self, entry).await?)
    }

    async fn record_visit(&self) -> Result<i64> {
        Ok(self.increment_visits().await?)
    }
}
