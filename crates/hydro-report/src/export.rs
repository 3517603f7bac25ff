//! Spreadsheet export of reports as CSV

use std::io;

use chrono::NaiveDate;
use csv::Writer;
use hydro_core::{DailyRecord, ReadingField, MARKERS_PER_DAY};

use crate::{DailySynthesis, GroupReport, ReportResult, StationReport};

/// Placeholder written for absent values
pub const ABSENT: &str = "-";

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| v.to_string())
}

fn day(value: Option<NaiveDate>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |d| d.to_string())
}

/// Derived averages, two decimals
fn mean(value: Option<f64>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| format!("{v:.2}"))
}

fn finish(writer: Writer<Vec<u8>>) -> ReportResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(io::Error::new(e.error().kind(), e.to_string())).into())
}

/// One row comparing a station's period figures with its baseline
pub fn station_summary_csv(report: &StationReport) -> ReportResult<Vec<u8>> {
    let summary = &report.summary;
    let baseline = summary.baseline.unwrap_or_default();

    let mut writer = Writer::from_writer(vec![]);
    writer.write_record([
        "Trạm",
        "Từ ngày",
        "Đến ngày",
        "Hmax Thực tế",
        "Hmax TBNN",
        "Ngày Hmax",
        "Hmin Thực tế",
        "Hmin TBNN",
        "Ngày Hmin",
        "Htb Thực tế",
        "Htb TBNN",
        "Tổng mưa",
        "Mưa TBNN",
    ])?;
    writer.write_record([
        summary.station.clone(),
        report.period.start.to_string(),
        report.period.end.to_string(),
        number(summary.observed_max_level()),
        number(baseline.max_level),
        day(summary.max_level_date),
        number(summary.observed_min_level()),
        number(baseline.min_level),
        day(summary.min_level_date),
        mean(summary.observed_mean_level()),
        mean(baseline.mean_level),
        summary.rain_sum.to_string(),
        number(baseline.mean_rain),
    ])?;
    finish(writer)
}

/// One row per station of the group
pub fn group_summary_csv(report: &GroupReport) -> ReportResult<Vec<u8>> {
    let mut writer = Writer::from_writer(vec![]);
    writer.write_record([
        "Trạm",
        "Hmax (cm)",
        "TBNN Hmax",
        "Ngày Hmax",
        "Hmin (cm)",
        "TBNN Hmin",
        "Ngày Hmin",
        "Tổng mưa (mm)",
        "TBNN Mưa",
        "Ngày mưa",
        "Mưa lớn nhất",
        "Ngày mưa lớn nhất",
    ])?;

    for station in &report.stations {
        let summary = &station.summary;
        let baseline = summary.baseline.unwrap_or_default();
        writer.write_record([
            summary.station.clone(),
            number(summary.observed_max_level()),
            number(baseline.max_level),
            day(summary.max_level_date),
            number(summary.observed_min_level()),
            number(baseline.min_level),
            day(summary.min_level_date),
            summary.rain_sum.to_string(),
            number(baseline.mean_rain),
            summary.rain_days.to_string(),
            summary.rain_max.to_string(),
            day(summary.rain_max_date),
        ])?;
    }
    finish(writer)
}

/// One row per station listed in the synthesis, stations without data included
pub fn daily_synthesis_csv(synthesis: &DailySynthesis) -> ReportResult<Vec<u8>> {
    const HOURS: [usize; 4] = [1, 7, 13, 19];

    let mut writer = Writer::from_writer(vec![]);
    writer.write_record([
        "Đài",
        "Trạm",
        "Ngày",
        "R1 (mm)",
        "R7 (mm)",
        "R13 (mm)",
        "R19 (mm)",
        "R24 (mm)",
        "01h (cm)",
        "07h (cm)",
        "13h (cm)",
        "19h (cm)",
        "Hmax (cm)",
        "Hmin (cm)",
    ])?;

    for entry in synthesis.entries() {
        let record = entry.record.as_ref();
        let rain = record.map(|r| r.rainfall).unwrap_or_default();
        let mut row = vec![
            entry.group.clone(),
            entry.station.clone(),
            synthesis.date.to_string(),
            number(rain.r1),
            number(rain.r7),
            number(rain.r13),
            number(rain.r19),
            number(rain.r24),
        ];
        row.extend(
            HOURS
                .iter()
                .map(|&h| number(record.and_then(|r| r.hourly[h]))),
        );
        row.push(number(record.and_then(|r| r.max_level)));
        row.push(number(record.and_then(|r| r.min_level)));
        writer.write_record(&row)?;
    }
    finish(writer)
}

/// Detail rows of one station, one line per day
pub fn readings_csv(records: &[DailyRecord]) -> ReportResult<Vec<u8>> {
    let mut writer = Writer::from_writer(vec![]);
    let mut header = vec!["Trạm".to_string(), "Ngày".to_string()];
    header.extend(ReadingField::all().iter().map(|f| f.column()));
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![record.station.clone(), record.date.to_string()];
        row.extend(record.hourly.iter().map(|v| number(*v)));
        for i in 0..MARKERS_PER_DAY {
            row.push(number(record.peaks[i].level));
            row.push(text(&record.peaks[i].time));
        }
        for i in 0..MARKERS_PER_DAY {
            row.push(number(record.troughs[i].level));
            row.push(text(&record.troughs[i].time));
        }
        row.push(number(record.mean_level));
        row.push(number(record.max_level));
        row.push(text(&record.max_level_time));
        row.push(number(record.min_level));
        row.push(text(&record.min_level_time));
        let rain = record.rainfall;
        row.extend([rain.r1, rain.r7, rain.r13, rain.r19, rain.r24].map(number));
        writer.write_record(&row)?;
    }
    finish(writer)
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| ABSENT.to_string())
}
