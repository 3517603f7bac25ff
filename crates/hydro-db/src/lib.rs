//! Database access layer for the station readings schema
//!
//! Works against the existing hosted schema - NO migrations. Column-name
//! casing differs between environments; every query goes through
//! [`DbClient::with_casing_fallback`] and every returned row through
//! [`hydro_core::normalize_row`].

pub mod client;
pub mod queries;
pub mod schema;
pub mod store;

pub use client::*;
pub use schema::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// PostgreSQL SQLSTATE for a reference to a column that does not exist
pub const UNDEFINED_COLUMN: &str = "42703";

/// Whether the backend rejected a query because of an unknown column
pub fn is_undefined_column(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == UNDEFINED_COLUMN)
}
