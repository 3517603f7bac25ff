//! Report pipelines over a [`hydro_core::ReadingStore`]
//!
//! Each pipeline resolves a period, fetches rows through the store,
//! aggregates them and attaches the matching baseline comparison.

pub mod export;
pub mod memory;
pub mod summary;

pub use export::*;
pub use memory::*;
pub use summary::*;

use chrono::NaiveDate;
use hydro_core::{PeriodError, RecordError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid period: {0}")]
    Period(#[from] PeriodError),

    #[error("Invalid record: {0}")]
    Record(#[from] RecordError),

    #[error("Backend error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("Invalid range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("Export error: {0}")]
    Export(#[from] csv::Error),
}

impl ReportError {
    /// Whether the error was caused by the request rather than the backend
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, ReportError::Store(_) | ReportError::Export(_))
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
