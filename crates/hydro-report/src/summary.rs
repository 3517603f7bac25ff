//! Station, group and daily report pipelines

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use hydro_core::{
    aggregate_roster, aggregate_station, groups, resolve, resolve_baseline, stations_in_group,
    BaselineKey, DailyRecord, ManualEntry, PeriodSelection, ReadingStore, RecordError,
    ResolvedPeriod, StationMetadata, StationSummary, SummaryComparison, UpsertOutcome, UNGROUPED,
};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{ReportError, ReportResult};

/// Summary request for one station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationQuery {
    pub station: String,
    pub selection: PeriodSelection,
}

impl StationQuery {
    pub fn new(station: impl Into<String>, selection: PeriodSelection) -> Self {
        Self {
            station: station.into(),
            selection,
        }
    }
}

/// Summary request for every station of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuery {
    pub group: String,
    pub selection: PeriodSelection,
}

impl GroupQuery {
    pub fn new(group: impl Into<String>, selection: PeriodSelection) -> Self {
        Self {
            group: group.into(),
            selection,
        }
    }
}

/// A station's period statistics and their comparison with the baseline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    pub station: String,
    pub period: ResolvedPeriod,
    pub period_days: usize,
    pub summary: StationSummary,
    pub comparison: SummaryComparison,
}

impl StationReport {
    pub fn new(period: ResolvedPeriod, summary: StationSummary) -> Self {
        Self {
            station: summary.station.clone(),
            period,
            period_days: period.days().count(),
            comparison: SummaryComparison::of(&summary),
            summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub group: String,
    pub selection: PeriodSelection,
    pub period: ResolvedPeriod,
    pub period_days: usize,
    pub stations: Vec<StationReport>,
}

/// One station's row in the daily synthesis; `record` is `None` when the
/// station reported nothing that day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEntry {
    pub station: String,
    pub group: String,
    pub record: Option<DailyRecord>,
    pub summary: StationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySection {
    pub group: String,
    pub entries: Vec<DailyEntry>,
}

/// Every known station's readings for one day, grouped by station group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySynthesis {
    pub date: NaiveDate,
    pub sections: Vec<DailySection>,
}

impl DailySynthesis {
    /// Join the roster with the day's rows. With an empty roster the stations
    /// seen in `rows` are listed instead. Rows of stations outside the roster
    /// are ignored.
    pub fn build(
        date: NaiveDate,
        roster: &[StationMetadata],
        rows: Vec<DailyRecord>,
        group_filter: Option<&str>,
    ) -> Self {
        let mut stations: BTreeMap<String, String> = BTreeMap::new();
        if roster.is_empty() {
            for row in &rows {
                let group = row
                    .group
                    .as_deref()
                    .filter(|g| !g.trim().is_empty())
                    .unwrap_or(UNGROUPED);
                stations.insert(row.station.clone(), group.to_string());
            }
        } else {
            for meta in roster {
                stations.insert(meta.station.clone(), meta.group_or_default().to_string());
            }
        }

        let mut by_station: BTreeMap<String, DailyRecord> = BTreeMap::new();
        for row in &rows {
            if stations.contains_key(&row.station) {
                by_station
                    .entry(row.station.clone())
                    .or_insert_with(|| row.clone());
            }
        }

        let filter = group_filter.map(str::trim).filter(|g| !g.is_empty());
        let mut sections: BTreeMap<String, Vec<DailyEntry>> = BTreeMap::new();
        for (station, group) in stations {
            if filter.is_some_and(|wanted| wanted != group) {
                continue;
            }
            let record = by_station.remove(&station);
            let summary = aggregate_station(&station, &rows);
            sections.entry(group.clone()).or_default().push(DailyEntry {
                station,
                group,
                record,
                summary,
            });
        }

        Self {
            date,
            sections: sections
                .into_iter()
                .map(|(group, entries)| DailySection { group, entries })
                .collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &DailyEntry> {
        self.sections.iter().flat_map(|s| s.entries.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Report pipelines over a shared reading store
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn ReadingStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    #[instrument(skip(self))]
    pub async fn roster(&self) -> ReportResult<Vec<StationMetadata>> {
        Ok(self.store.station_roster().await?)
    }

    pub async fn groups(&self) -> ReportResult<Vec<String>> {
        Ok(groups(&self.roster().await?))
    }

    pub async fn stations_in_group(&self, group: &str) -> ReportResult<Vec<StationMetadata>> {
        Ok(stations_in_group(&self.roster().await?, group))
    }

    /// Detail rows of one station in an inclusive date range
    #[instrument(skip(self))]
    pub async fn readings(
        &self,
        station: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ReportResult<Vec<DailyRecord>> {
        if from > to {
            return Err(ReportError::InvalidRange { from, to });
        }
        let station = station.trim();
        if station.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.readings_for_station(station, from, to).await?)
    }

    #[instrument(skip(self), fields(station = %query.station))]
    pub async fn station_summary(&self, query: &StationQuery) -> ReportResult<StationReport> {
        let station = query.station.trim();
        if station.is_empty() {
            return Err(RecordError::MissingField("TenTram").into());
        }
        let period = resolve(&query.selection)?;

        let records = self
            .store
            .readings_for_station(station, period.start, period.end)
            .await?;
        let key = BaselineKey::for_period(station, &period);
        let baselines = self
            .store
            .baselines(&[station.to_string()], key.month, key.period)
            .await?;

        let summary =
            aggregate_station(station, &records).with_baseline(resolve_baseline(&baselines, &key));
        debug!(
            records = summary.record_count,
            has_baseline = summary.baseline.is_some(),
            "Station summary computed"
        );
        Ok(StationReport::new(period, summary))
    }

    #[instrument(skip(self), fields(group = %query.group))]
    pub async fn group_summary(&self, query: &GroupQuery) -> ReportResult<GroupReport> {
        let period = resolve(&query.selection)?;
        let members = self.stations_in_group(&query.group).await?;

        let mut report = GroupReport {
            group: query.group.clone(),
            selection: query.selection,
            period,
            period_days: period.days().count(),
            stations: Vec::new(),
        };
        if members.is_empty() {
            debug!("Group has no stations");
            return Ok(report);
        }

        let names: Vec<String> = members.iter().map(|m| m.station.clone()).collect();
        let records = self
            .store
            .readings_for_stations(&names, period.start, period.end)
            .await?;
        let baselines = self
            .store
            .baselines(&names, period.baseline_month, period.baseline_period)
            .await?;

        report.stations = aggregate_roster(&members, &records)
            .into_iter()
            .map(|summary| {
                let key = BaselineKey::for_period(summary.station.as_str(), &period);
                let summary = summary.with_baseline(resolve_baseline(&baselines, &key));
                StationReport::new(period, summary)
            })
            .collect();

        info!(
            stations = report.stations.len(),
            records = records.len(),
            "Group summary computed"
        );
        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn daily_synthesis(
        &self,
        date: NaiveDate,
        group: Option<&str>,
    ) -> ReportResult<DailySynthesis> {
        let roster = self.store.station_roster().await?;
        let rows = self.store.readings_on(date).await?;
        debug!(
            roster = roster.len(),
            rows = rows.len(),
            "Building daily synthesis"
        );
        Ok(DailySynthesis::build(date, &roster, rows, group))
    }

    /// Store a validated manual entry
    #[instrument(skip(self, entry), fields(station = %entry.station, field = %entry.field))]
    pub async fn submit_entry(&self, entry: &ManualEntry) -> ReportResult<UpsertOutcome> {
        let outcome = self.store.upsert_reading(entry).await?;
        info!(?outcome, date = %entry.date, "Manual entry accepted");
        Ok(outcome)
    }

    pub async fn record_visit(&self) -> ReportResult<i64> {
        Ok(self.store.record_visit().await?)
    }
}
