//! Core data types for station readings and baselines

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::period::PeriodCode;

/// A raw backend row, keyed by column name
pub type RawRow = BTreeMap<String, CellValue>;

/// Number of hourly water-level columns (`00h`..`23h`)
pub const HOURS_PER_DAY: usize = 24;

/// Number of peak (`D`) and trough (`C`) markers per day
pub const MARKERS_PER_DAY: usize = 3;

/// Record decoding error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid month: {0}")]
    InvalidMonth(String),

    #[error("Unknown period code: {0}")]
    UnknownPeriod(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Empty value for column {0}")]
    EmptyValue(String),

    #[error("Column {column} expects a number, got {value:?}")]
    NotNumeric { column: String, value: String },
}

/// A single cell as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
}

impl CellValue {
    /// Numeric view of the cell. Numeric strings are accepted; anything
    /// else (including NaN and infinities) is absent.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            CellValue::Float(v) => *v,
            CellValue::Integer(v) => *v as f64,
            CellValue::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Text view of the cell; blank strings are absent
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            CellValue::Integer(v) => Some(v.to_string()),
            CellValue::Float(v) => Some(v.to_string()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::String(v.to_string())
    }
}

/// Parse an ISO calendar day, tolerating a trailing time component
pub fn parse_day(raw: &str) -> Result<NaiveDate, RecordError> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| RecordError::InvalidDate(raw.to_string()))
}

/// Sub-day rainfall windows plus the full-day total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RainWindow {
    R1,
    R7,
    R13,
    R19,
    R24,
}

impl RainWindow {
    pub const ALL: [RainWindow; 5] = [
        RainWindow::R1,
        RainWindow::R7,
        RainWindow::R13,
        RainWindow::R19,
        RainWindow::R24,
    ];

    pub fn column(self) -> &'static str {
        match self {
            RainWindow::R1 => "R1",
            RainWindow::R7 => "R7",
            RainWindow::R13 => "R13",
            RainWindow::R19 => "R19",
            RainWindow::R24 => "R24",
        }
    }
}

/// Rainfall figures for one day, in millimetres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rainfall {
    pub r1: Option<f64>,
    pub r7: Option<f64>,
    pub r13: Option<f64>,
    pub r19: Option<f64>,
    pub r24: Option<f64>,
}

impl Rainfall {
    pub fn get(&self, window: RainWindow) -> Option<f64> {
        match window {
            RainWindow::R1 => self.r1,
            RainWindow::R7 => self.r7,
            RainWindow::R13 => self.r13,
            RainWindow::R19 => self.r19,
            RainWindow::R24 => self.r24,
        }
    }
}

/// A peak or trough marker: level plus the time text it was observed at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub level: Option<f64>,
    pub time: Option<String>,
}

/// One station's readings for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub id: Option<i64>,
    pub station: String,
    pub station_code: Option<String>,
    pub group: Option<String>,
    pub date: NaiveDate,
    pub hourly: [Option<f64>; HOURS_PER_DAY],
    pub peaks: [Marker; MARKERS_PER_DAY],
    pub troughs: [Marker; MARKERS_PER_DAY],
    pub mean_level: Option<f64>,
    pub max_level: Option<f64>,
    pub max_level_time: Option<String>,
    pub min_level: Option<f64>,
    pub min_level_time: Option<String>,
    pub rainfall: Rainfall,
}

impl DailyRecord {
    /// Empty record for a station/day; every reading absent
    pub fn new(station: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: None,
            station: station.into(),
            station_code: None,
            group: None,
            date,
            hourly: [None; HOURS_PER_DAY],
            peaks: Default::default(),
            troughs: Default::default(),
            mean_level: None,
            max_level: None,
            max_level_time: None,
            min_level: None,
            min_level_time: None,
            rainfall: Rainfall::default(),
        }
    }

    /// Decode a row that uses tagged column names (see [`crate::normalize`])
    pub fn from_row(row: &RawRow) -> Result<Self, RecordError> {
        let text = |key: &str| row.get(key).and_then(CellValue::as_text);
        let number = |key: &str| row.get(key).and_then(CellValue::as_f64);

        let station = text("TenTram").ok_or(RecordError::MissingField("TenTram"))?;
        let date = match row.get("Ngay") {
            Some(CellValue::String(s)) => parse_day(s)?,
            Some(other) if !other.is_null() => {
                return Err(RecordError::InvalidDate(format!("{other:?}")))
            }
            _ => return Err(RecordError::MissingField("Ngay")),
        };

        let mut record = DailyRecord::new(station, date);
        record.id = row.get("id").and_then(|v| match v {
            CellValue::Integer(id) => Some(*id),
            _ => None,
        });
        record.station_code = text("MaTram");
        record.group = text("TenDai");

        for (hour, slot) in record.hourly.iter_mut().enumerate() {
            *slot = number(&ReadingField::Hour(hour as u8).column());
        }
        for i in 0..MARKERS_PER_DAY {
            let n = i as u8 + 1;
            record.peaks[i] = Marker {
                level: number(&ReadingField::Peak(n).column()),
                time: text(&ReadingField::PeakTime(n).column()),
            };
            record.troughs[i] = Marker {
                level: number(&ReadingField::Trough(n).column()),
                time: text(&ReadingField::TroughTime(n).column()),
            };
        }

        record.mean_level = number("Htb");
        record.max_level = number("Hmax");
        record.max_level_time = text("TgMax");
        record.min_level = number("Hmin");
        record.min_level_time = text("TgMin");
        record.rainfall = Rainfall {
            r1: number("R1"),
            r7: number("R7"),
            r13: number("R13"),
            r19: number("R19"),
            r24: number("R24"),
        };

        Ok(record)
    }

    /// Overwrite one column with a manual entry value. A value of the wrong
    /// kind for the column clears it.
    pub fn apply(&mut self, field: ReadingField, value: &EntryValue) {
        let number = match value {
            EntryValue::Number(n) => Some(*n),
            EntryValue::Text(_) => None,
        };
        let text = match value {
            EntryValue::Text(t) => Some(t.clone()),
            EntryValue::Number(_) => None,
        };
        let marker = |n: u8| usize::from(n).saturating_sub(1).min(MARKERS_PER_DAY - 1);

        match field {
            ReadingField::Hour(h) => self.hourly[usize::from(h) % HOURS_PER_DAY] = number,
            ReadingField::Peak(n) => self.peaks[marker(n)].level = number,
            ReadingField::PeakTime(n) => self.peaks[marker(n)].time = text,
            ReadingField::Trough(n) => self.troughs[marker(n)].level = number,
            ReadingField::TroughTime(n) => self.troughs[marker(n)].time = text,
            ReadingField::MeanLevel => self.mean_level = number,
            ReadingField::MaxLevel => self.max_level = number,
            ReadingField::MaxLevelTime => self.max_level_time = text,
            ReadingField::MinLevel => self.min_level = number,
            ReadingField::MinLevelTime => self.min_level_time = text,
            ReadingField::Rain(window) => {
                let slot = match window {
                    RainWindow::R1 => &mut self.rainfall.r1,
                    RainWindow::R7 => &mut self.rainfall.r7,
                    RainWindow::R13 => &mut self.rainfall.r13,
                    RainWindow::R19 => &mut self.rainfall.r19,
                    RainWindow::R24 => &mut self.rainfall.r24,
                };
                *slot = number;
            }
        }
    }
}

/// Value type a writable column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Time,
}

/// The fixed set of reading columns that can be written by manual entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingField {
    Hour(u8),
    Peak(u8),
    PeakTime(u8),
    Trough(u8),
    TroughTime(u8),
    MeanLevel,
    MaxLevel,
    MaxLevelTime,
    MinLevel,
    MinLevelTime,
    Rain(RainWindow),
}

impl ReadingField {
    /// Every writable column, in display order
    pub fn all() -> Vec<ReadingField> {
        let mut fields: Vec<ReadingField> =
            (0..HOURS_PER_DAY as u8).map(ReadingField::Hour).collect();
        for n in 1..=MARKERS_PER_DAY as u8 {
            fields.push(ReadingField::Peak(n));
            fields.push(ReadingField::PeakTime(n));
        }
        for n in 1..=MARKERS_PER_DAY as u8 {
            fields.push(ReadingField::Trough(n));
            fields.push(ReadingField::TroughTime(n));
        }
        fields.extend([
            ReadingField::MeanLevel,
            ReadingField::MaxLevel,
            ReadingField::MaxLevelTime,
            ReadingField::MinLevel,
            ReadingField::MinLevelTime,
        ]);
        fields.extend(RainWindow::ALL.into_iter().map(ReadingField::Rain));
        fields
    }

    /// Tagged column name
    pub fn column(&self) -> String {
        match self {
            ReadingField::Hour(h) => format!("{h:02}h"),
            ReadingField::Peak(n) => format!("D{n}"),
            ReadingField::PeakTime(n) => format!("TgD{n}"),
            ReadingField::Trough(n) => format!("C{n}"),
            ReadingField::TroughTime(n) => format!("TgC{n}"),
            ReadingField::MeanLevel => "Htb".to_string(),
            ReadingField::MaxLevel => "Hmax".to_string(),
            ReadingField::MaxLevelTime => "TgMax".to_string(),
            ReadingField::MinLevel => "Hmin".to_string(),
            ReadingField::MinLevelTime => "TgMin".to_string(),
            ReadingField::Rain(w) => w.column().to_string(),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            ReadingField::PeakTime(_)
            | ReadingField::TroughTime(_)
            | ReadingField::MaxLevelTime
            | ReadingField::MinLevelTime => FieldKind::Time,
            _ => FieldKind::Numeric,
        }
    }
}

impl fmt::Display for ReadingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column())
    }
}

impl FromStr for ReadingField {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ReadingField::all()
            .into_iter()
            .find(|field| field.column().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RecordError::UnknownColumn(s.to_string()))
    }
}

/// Parsed value of a manual entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryValue {
    Number(f64),
    Text(String),
}

/// A single-column write keyed by (station, date)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualEntry {
    pub station: String,
    pub group: Option<String>,
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_field")]
    pub field: ReadingField,
    pub value: EntryValue,
}

fn serialize_field<S: serde::Serializer>(field: &ReadingField, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&field.column())
}

impl ManualEntry {
    /// Validate a raw entry; the value is parsed according to the column kind
    pub fn parse(
        station: &str,
        group: Option<&str>,
        date: NaiveDate,
        column: &str,
        value: &str,
    ) -> Result<Self, RecordError> {
        let station = station.trim();
        if station.is_empty() {
            return Err(RecordError::MissingField("TenTram"));
        }
        let field: ReadingField = column.parse()?;
        let raw = value.trim();
        if raw.is_empty() {
            return Err(RecordError::EmptyValue(field.column()));
        }
        let value = match field.kind() {
            FieldKind::Numeric => CellValue::from(raw)
                .as_f64()
                .map(EntryValue::Number)
                .ok_or_else(|| RecordError::NotNumeric {
                    column: field.column(),
                    value: raw.to_string(),
                })?,
            FieldKind::Time => EntryValue::Text(raw.to_string()),
        };

        Ok(Self {
            station: station.to_string(),
            group: group.map(str::trim).filter(|g| !g.is_empty()).map(str::to_string),
            date,
            field,
            value,
        })
    }
}

/// Outcome of a keyed write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Historical-average ("TBNN") entry for a station/month/period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub station: String,
    pub month: u32,
    pub period: PeriodCode,
    pub mean_level: Option<f64>,
    pub max_level: Option<f64>,
    pub min_level: Option<f64>,
    pub mean_rain: Option<f64>,
}

impl BaselineRecord {
    /// Decode a row that uses tagged column names
    pub fn from_row(row: &RawRow) -> Result<Self, RecordError> {
        let number = |key: &str| row.get(key).and_then(CellValue::as_f64);

        let station = row
            .get("TenTram")
            .and_then(CellValue::as_text)
            .ok_or(RecordError::MissingField("TenTram"))?;
        let month_cell = row.get("Thang").ok_or(RecordError::MissingField("Thang"))?;
        let month = month_cell
            .as_f64()
            .filter(|m| m.fract() == 0.0 && (1.0..=12.0).contains(m))
            .map(|m| m as u32)
            .ok_or_else(|| RecordError::InvalidMonth(format!("{month_cell:?}")))?;
        let period = row
            .get("Ky")
            .and_then(CellValue::as_text)
            .ok_or(RecordError::MissingField("Ky"))?
            .parse()?;

        Ok(Self {
            station,
            month,
            period,
            mean_level: number("Htb"),
            max_level: number("Hmax"),
            min_level: number("Hmin"),
            mean_rain: number("Rtb"),
        })
    }
}
