//! Table and column names of the hosted readings schema
//!
//! Column names are given in their tagged spelling. Render them through
//! [`column`] so that the active [`ColumnCasing`] is honoured.

use hydro_core::ColumnCasing;

/// Table names
pub mod tables {
    pub const READINGS: &str = "so_lieu_thuy_van";
    pub const BASELINES: &str = "so_lieu_tbnn";
    pub const APP_STATS: &str = "app_stats";
}

/// Tagged column names shared by the readings and baseline tables
pub mod columns {
    pub const ID: &str = "id";
    pub const STATION: &str = "TenTram";
    pub const GROUP: &str = "TenDai";
    pub const DATE: &str = "Ngay";
    pub const MONTH: &str = "Thang";
    pub const PERIOD: &str = "Ky";
}

/// Counter row used for visit tracking in `app_stats`
pub const VISIT_COUNTER: &str = "total_visits";

/// Quoted identifier for a tagged column name under `casing`
pub fn column(casing: ColumnCasing, tagged: &str) -> String {
    format!("\"{}\"", casing.apply(tagged).replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(tables::READINGS, "so_lieu_thuy_van");
        assert_eq!(tables::BASELINES, "so_lieu_tbnn");
    }

    #[test]
    fn test_column_quoting() {
        assert_eq!(column(ColumnCasing::Tagged, columns::STATION), "\"TenTram\"");
        assert_eq!(column(ColumnCasing::Lowercase, columns::STATION), "\"tentram\"");
        assert_eq!(column(ColumnCasing::Lowercase, "07h"), "\"07h\"");
    }
}
