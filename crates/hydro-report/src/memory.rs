//! In-memory [`ReadingStore`] for tests and local runs without a backend

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use hydro_core::{
    roster_from_pairs, BaselineRecord, DailyRecord, ManualEntry, PeriodCode, ReadingStore,
    StationMetadata, UpsertOutcome,
};

#[derive(Debug, Default)]
struct Tables {
    readings: Vec<DailyRecord>,
    baselines: Vec<BaselineRecord>,
    visits: i64,
}

/// Reading store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failure: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readings(self, readings: Vec<DailyRecord>) -> Self {
        self.lock().readings.extend(readings);
        self
    }

    pub fn with_baselines(self, baselines: Vec<BaselineRecord>) -> Self {
        self.lock().baselines.extend(baselines);
        self
    }

    /// Make every call fail with `message`, as an unreachable backend would
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<MutexGuard<'_, Tables>> {
        match &self.failure {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(self.lock()),
        }
    }

    fn select(&self, keep: impl Fn(&DailyRecord) -> bool) -> Result<Vec<DailyRecord>> {
        let tables = self.check()?;
        let mut rows: Vec<DailyRecord> = tables
            .readings
            .iter()
            .filter(|r| keep(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.station.cmp(&b.station)));
        Ok(rows)
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn station_roster(&self) -> Result<Vec<StationMetadata>> {
        let tables = self.check()?;
        Ok(roster_from_pairs(
            tables
                .readings
                .iter()
                .map(|r| (Some(r.station.clone()), r.group.clone())),
        ))
    }

    async fn readings_for_station(
        &self,
        station: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRecord>> {
        self.select(|r| r.station == station && start <= r.date && r.date <= end)
    }

    async fn readings_for_stations(
        &self,
        stations: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRecord>> {
        self.select(|r| stations.contains(&r.station) && start <= r.date && r.date <= end)
    }

    async fn readings_on(&self, date: NaiveDate) -> Result<Vec<DailyRecord>> {
        self.select(|r| r.date == date)
    }

    async fn baselines(
        &self,
        stations: &[String],
        month: u32,
        period: PeriodCode,
    ) -> Result<Vec<BaselineRecord>> {
        let tables = self.check()?;
        Ok(tables
            .baselines
            .iter()
            .filter(|b| stations.contains(&b.station) && b.month == month && b.period == period)
            .cloned()
            .collect())
    }

    async fn upsert_reading(&self, entry: &ManualEntry) -> Result<UpsertOutcome> {
        let mut tables = self.check()?;
        let existing = tables
            .readings
            .iter_mut()
            .find(|r| r.station == entry.station && r.date == entry.date);

        match existing {
            Some(record) => {
                record.apply(entry.field, &entry.value);
                if entry.group.is_some() {
                    record.group = entry.group.clone();
                }
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let mut record = DailyRecord::new(entry.station.as_str(), entry.date);
                record.group = entry.group.clone();
                record.apply(entry.field, &entry.value);
                tables.readings.push(record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn record_visit(&self) -> Result<i64> {
        let mut tables = self.check()?;
        tables.visits += 1;
        Ok(tables.visits)
    }
}
