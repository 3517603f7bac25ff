//! Column-name casing normalization
//!
//! The backend schema is not consistent about identifier case: the same
//! column may be exposed as `TenTram` or as `tentram`. Everything downstream
//! of the data-access layer works with the tagged spelling only.

use std::borrow::Cow;

use crate::types::RawRow;

/// Tagged spellings of every mixed-case column the backend exposes
pub const TAGGED_COLUMNS: &[&str] = &[
    // Identity
    "TenTram", "MaTram", "TenDai", "Ngay",
    // Peak and trough markers
    "D1", "TgD1", "D2", "TgD2", "D3", "TgD3",
    "C1", "TgC1", "C2", "TgC2", "C3", "TgC3",
    // Daily level figures
    "Htb", "Hmax", "TgMax", "Hmin", "TgMin",
    // Rainfall
    "R1", "R7", "R13", "R19", "R24",
    // Baseline table
    "Thang", "Ky", "Rtb",
];

/// Column naming convention used to address the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnCasing {
    Tagged,
    Lowercase,
}

impl ColumnCasing {
    /// Render a tagged column name in this convention
    pub fn apply<'a>(self, tagged: &'a str) -> Cow<'a, str> {
        match self {
            ColumnCasing::Tagged => Cow::Borrowed(tagged),
            ColumnCasing::Lowercase => Cow::Owned(tagged.to_ascii_lowercase()),
        }
    }
}

/// Tagged spelling for an all-lowercase key, if it names a known column
pub fn canonical_key(key: &str) -> Option<&'static str> {
    TAGGED_COLUMNS.iter().copied().find(|tagged| {
        tagged.len() == key.len()
            && tagged
                .bytes()
                .zip(key.bytes())
                .all(|(t, k)| t.to_ascii_lowercase() == k)
    })
}

/// Rewrite a row so that it uses tagged keys exclusively.
///
/// Unknown keys pass through unchanged. When a row carries both spellings of
/// the same column the tagged value is kept.
pub fn normalize_row(row: RawRow) -> RawRow {
    let mut out = RawRow::new();
    let mut folded = Vec::new();

    for (key, value) in row {
        match canonical_key(&key) {
            Some(tagged) if tagged != key => folded.push((tagged, value)),
            _ => {
                out.insert(key, value);
            }
        }
    }

    for (tagged, value) in folded {
        out.entry(tagged.to_string()).or_insert(value);
    }
    out
}
