//! Query operations for the readings and baseline tables

use std::future::Future;

use chrono::NaiveDate;
use hydro_core::{
    normalize_row, roster_from_pairs, BaselineRecord, CellValue, ColumnCasing, DailyRecord,
    EntryValue, ManualEntry, PeriodCode, RawRow, RecordError, StationMetadata, UpsertOutcome,
};
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use tracing::{debug, instrument, warn};

use crate::schema::{column, columns, tables, VISIT_COUNTER};
use crate::{is_undefined_column, DbClient, DbResult};

/// SQL text for every query, rendered for one column casing
pub mod sql {
    use super::*;

    fn reading_columns(casing: ColumnCasing) -> (String, String, String) {
        (
            column(casing, columns::STATION),
            column(casing, columns::GROUP),
            column(casing, columns::DATE),
        )
    }

    pub fn readings_for_station(casing: ColumnCasing) -> String {
        let (station, _, date) = reading_columns(casing);
        format!(
            "SELECT to_jsonb(t) FROM {table} AS t \
             WHERE t.{station} = $1 AND t.{date}::date BETWEEN $2 AND $3 \
             ORDER BY t.{date} ASC",
            table = tables::READINGS,
        )
    }

    pub fn readings_for_stations(casing: ColumnCasing) -> String {
        let (station, _, date) = reading_columns(casing);
        format!(
            "SELECT to_jsonb(t) FROM {table} AS t \
             WHERE t.{station} = ANY($1) AND t.{date}::date BETWEEN $2 AND $3 \
             ORDER BY t.{date} ASC, t.{station} ASC",
            table = tables::READINGS,
        )
    }

    pub fn readings_on(casing: ColumnCasing) -> String {
        let (station, _, date) = reading_columns(casing);
        format!(
            "SELECT to_jsonb(t) FROM {table} AS t \
             WHERE t.{date}::date = $1 \
             ORDER BY t.{station} ASC",
            table = tables::READINGS,
        )
    }

    pub fn station_pairs(casing: ColumnCasing) -> String {
        let (station, group, _) = reading_columns(casing);
        format!(
            "SELECT DISTINCT t.{station}::text, t.{group}::text FROM {table} AS t",
            table = tables::READINGS,
        )
    }

    pub fn baselines(casing: ColumnCasing) -> String {
        format!(
            "SELECT to_jsonb(t) FROM {table} AS t \
             WHERE t.{station} = ANY($1) AND t.{month}::int = $2 AND t.{period} = $3",
            table = tables::BASELINES,
            station = column(casing, columns::STATION),
            month = column(casing, columns::MONTH),
            period = column(casing, columns::PERIOD),
        )
    }

    pub fn find_reading_id(casing: ColumnCasing) -> String {
        let (station, _, date) = reading_columns(casing);
        format!(
            "SELECT t.{id}::bigint FROM {table} AS t \
             WHERE t.{station} = $1 AND t.{date}::date = $2 LIMIT 1",
            id = column(casing, columns::ID),
            table = tables::READINGS,
        )
    }

    /// `$1` value, `$2` group (kept when NULL), `$3` row id
    pub fn update_reading(casing: ColumnCasing, field: &str) -> String {
        let (_, group, _) = reading_columns(casing);
        format!(
            "UPDATE {table} SET {field} = $1, {group} = COALESCE($2, {group}) WHERE {id} = $3",
            table = tables::READINGS,
            field = column(casing, field),
            id = column(casing, columns::ID),
        )
    }

    /// `$1` station, `$2` group, `$3` date, `$4` value
    pub fn insert_reading(casing: ColumnCasing, field: &str) -> String {
        let (station, group, date) = reading_columns(casing);
        format!(
            "INSERT INTO {table} ({station}, {group}, {date}, {field}) \
             VALUES ($1, $2, $3::date, $4)",
            table = tables::READINGS,
            field = column(casing, field),
        )
    }

    pub fn bump_counter() -> String {
        format!(
            "UPDATE {table} SET count = count + 1 WHERE counter_name = $1 RETURNING count::bigint",
            table = tables::APP_STATS,
        )
    }

    pub fn insert_counter() -> String {
        format!(
            "INSERT INTO {table} (counter_name, count) VALUES ($1, 1)",
            table = tables::APP_STATS,
        )
    }
}

/// Turn a `to_jsonb` object into a raw row; nested values are dropped
fn raw_row(value: Value) -> Option<RawRow> {
    let Value::Object(map) = value else {
        return None;
    };
    let row = map
        .into_iter()
        .filter(|(_, v)| !v.is_object() && !v.is_array())
        .filter_map(|(k, v)| serde_json::from_value::<CellValue>(v).ok().map(|cell| (k, cell)))
        .collect();
    Some(row)
}

/// Normalize and decode rows, skipping any that cannot be decoded
fn decode_rows<T>(
    table: &str,
    values: Vec<Value>,
    decode: impl Fn(&RawRow) -> Result<T, RecordError>,
) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| {
            let Some(row) = raw_row(value) else {
                warn!(table, "Skipping non-object row");
                return None;
            };
            match decode(&normalize_row(row)) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!(table, error = %e, "Skipping malformed row");
                    None
                }
            }
        })
        .collect()
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q EntryValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        EntryValue::Number(n) => query.bind(*n),
        EntryValue::Text(t) => query.bind(t.as_str()),
    }
}

impl DbClient {
    /// Run a query with tagged column names, retrying once with lowercase
    /// names when the backend reports an unknown column
    pub async fn with_casing_fallback<T, F, Fut>(
        &self,
        operation: &'static str,
        mut run: F,
    ) -> DbResult<T>
    where
        F: FnMut(ColumnCasing) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        match run(ColumnCasing::Tagged).await {
            Err(err) if is_undefined_column(&err) => {
                debug!(operation, error = %err, "Tagged columns rejected, retrying lowercase");
                Ok(run(ColumnCasing::Lowercase).await?)
            }
            result => Ok(result?),
        }
    }

    async fn fetch_json(
        &self,
        operation: &'static str,
        render: fn(ColumnCasing) -> String,
        bind: impl Fn(Query<'_, Postgres, PgArguments>) -> Query<'_, Postgres, PgArguments>,
    ) -> DbResult<Vec<Value>> {
        let bind = &bind;
        self.with_casing_fallback(operation, move |casing| {
            let sql = render(casing);
            async move {
                let query = bind(sqlx::query(&sql));
                let rows = query.fetch_all(self.pool()).await?;
                rows.iter()
                    .map(|row| sqlx::Row::try_get::<Value, _>(row, 0))
                    .collect::<Result<Vec<_>, _>>()
            }
        })
        .await
    }

    /// Readings of one station in an inclusive date range
    #[instrument(skip(self))]
    pub async fn get_readings_for_station(
        &self,
        station: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<DailyRecord>> {
        let values = self
            .fetch_json("readings_for_station", sql::readings_for_station, |q| {
                q.bind(station.to_string()).bind(start).bind(end)
            })
            .await?;
        let records = decode_rows(tables::READINGS, values, DailyRecord::from_row);

        debug!(
            "Retrieved {} readings for {} between {} and {}",
            records.len(),
            station,
            start,
            end
        );
        Ok(records)
    }

    /// Readings of several stations in an inclusive date range
    #[instrument(skip(self))]
    pub async fn get_readings_for_stations(
        &self,
        stations: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<DailyRecord>> {
        if stations.is_empty() {
            return Ok(Vec::new());
        }
        let values = self
            .fetch_json("readings_for_stations", sql::readings_for_stations, |q| {
                q.bind(stations.to_vec()).bind(start).bind(end)
            })
            .await?;
        let records = decode_rows(tables::READINGS, values, DailyRecord::from_row);

        debug!(
            "Retrieved {} readings for {} stations between {} and {}",
            records.len(),
            stations.len(),
            start,
            end
        );
        Ok(records)
    }

    /// Every station's readings for one day
    #[instrument(skip(self))]
    pub async fn get_readings_on(&self, date: NaiveDate) -> DbResult<Vec<DailyRecord>> {
        let values = self
            .fetch_json("readings_on", sql::readings_on, |q| q.bind(date))
            .await?;
        Ok(decode_rows(tables::READINGS, values, DailyRecord::from_row))
    }

    /// Distinct (station, group) pairs, sorted by station
    #[instrument(skip(self))]
    pub async fn get_station_roster(&self) -> DbResult<Vec<StationMetadata>> {
        let pairs = self
            .with_casing_fallback("station_roster", move |casing| {
                let sql = sql::station_pairs(casing);
                async move {
                    sqlx::query_as::<_, (Option<String>, Option<String>)>(&sql)
                        .fetch_all(self.pool())
                        .await
                }
            })
            .await?;

        let roster = roster_from_pairs(pairs);
        debug!("Station roster has {} entries", roster.len());
        Ok(roster)
    }

    /// Baselines for the given stations under (month, period)
    #[instrument(skip(self))]
    pub async fn get_baselines(
        &self,
        stations: &[String],
        month: u32,
        period: PeriodCode,
    ) -> DbResult<Vec<BaselineRecord>> {
        if stations.is_empty() {
            return Ok(Vec::new());
        }
        let values = self
            .fetch_json("baselines", sql::baselines, |q| {
                q.bind(stations.to_vec())
                    .bind(month as i32)
                    .bind(period.code())
            })
            .await?;
        Ok(decode_rows(tables::BASELINES, values, BaselineRecord::from_row))
    }

    async fn upsert_with(
        &self,
        casing: ColumnCasing,
        entry: &ManualEntry,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(&sql::find_reading_id(casing))
            .bind(entry.station.as_str())
            .bind(entry.date)
            .fetch_optional(&mut *tx)
            .await?;

        let field = entry.field.column();
        let outcome = match existing {
            Some(id) => {
                let sql = sql::update_reading(casing, &field);
                bind_value(sqlx::query(&sql), &entry.value)
                    .bind(entry.group.as_deref())
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                UpsertOutcome::Updated
            }
            None => {
                let sql = sql::insert_reading(casing, &field);
                let query = sqlx::query(&sql)
                    .bind(entry.station.as_str())
                    .bind(entry.group.as_deref())
                    .bind(entry.date);
                bind_value(query, &entry.value).execute(&mut *tx).await?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Write one column of the reading keyed by (station, date)
    #[instrument(skip(self, entry), fields(station = %entry.station, date = %entry.date, field = %entry.field))]
    pub async fn upsert_reading(&self, entry: &ManualEntry) -> DbResult<UpsertOutcome> {
        let outcome = self
            .with_casing_fallback("upsert_reading", move |casing| self.upsert_with(casing, entry))
            .await?;
        debug!(?outcome, "Manual entry stored");
        Ok(outcome)
    }

    /// Increment the visit counter, creating it on first use
    #[instrument(skip(self))]
    pub async fn increment_visits(&self) -> DbResult<i64> {
        let bumped: Option<i64> = sqlx::query_scalar(&sql::bump_counter())
            .bind(VISIT_COUNTER)
            .fetch_optional(self.pool())
            .await?;

        if let Some(count) = bumped {
            return Ok(count);
        }

        sqlx::query(&sql::insert_counter())
            .bind(VISIT_COUNTER)
            .execute(self.pool())
            .await?;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UNDEFINED_COLUMN;
    use serde_json::json;
    use sqlx::error::{DatabaseError, ErrorKind};
    use sqlx::postgres::PgPoolOptions;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct Rejected(&'static str);

    impl fmt::Display for Rejected {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "query rejected with SQLSTATE {}", self.0)
        }
    }

    impl StdError for Rejected {}

    impl DatabaseError for Rejected {
        fn message(&self) -> &str {
            "query rejected"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn rejected(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Rejected(code)))
    }

    fn lazy_client() -> DbClient {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/hydro_test")
            .unwrap();
        DbClient::from_pool(pool)
    }

    #[test]
    fn test_undefined_column_detection() {
        assert!(is_undefined_column(&rejected(UNDEFINED_COLUMN)));
        assert!(!is_undefined_column(&rejected("42P01")));
        assert!(!is_undefined_column(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn test_casing_fallback_retries_once_in_lowercase() {
        let client = lazy_client();
        let mut calls = Vec::new();

        let result = client
            .with_casing_fallback("test", |casing| {
                calls.push(casing);
                async move {
                    match casing {
                        ColumnCasing::Tagged => Err(rejected(UNDEFINED_COLUMN)),
                        ColumnCasing::Lowercase => Ok(7),
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, vec![ColumnCasing::Tagged, ColumnCasing::Lowercase]);
    }

    #[tokio::test]
    async fn test_casing_fallback_gives_up_after_lowercase() {
        let client = lazy_client();
        let mut calls = Vec::new();

        let result: DbResult<u32> = client
            .with_casing_fallback("test", |casing| {
                calls.push(casing);
                async move { Err(rejected(UNDEFINED_COLUMN)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, vec![ColumnCasing::Tagged, ColumnCasing::Lowercase]);
    }

    #[tokio::test]
    async fn test_casing_fallback_ignores_other_errors() {
        let client = lazy_client();

        let failures: [fn() -> sqlx::Error; 2] =
            [|| rejected("42P01"), || sqlx::Error::RowNotFound];
        for err in failures {
            let mut calls = Vec::new();
            let result: DbResult<u32> = client
                .with_casing_fallback("test", |casing| {
                    calls.push(casing);
                    let err = err();
                    async move { Err(err) }
                })
                .await;

            assert!(result.is_err());
            assert_eq!(calls, vec![ColumnCasing::Tagged]);
        }
    }

    #[test]
    fn test_readings_sql_tagged() {
        let sql = sql::readings_for_station(ColumnCasing::Tagged);
        assert!(sql.contains("FROM so_lieu_thuy_van AS t"));
        assert!(sql.contains("t.\"TenTram\" = $1"));
        assert!(sql.contains("t.\"Ngay\"::date BETWEEN $2 AND $3"));
        assert!(sql.ends_with("ORDER BY t.\"Ngay\" ASC"));
    }

    #[test]
    fn test_readings_sql_lowercase() {
        let sql = sql::readings_for_stations(ColumnCasing::Lowercase);
        assert!(sql.contains("t.\"tentram\" = ANY($1)"));
        assert!(sql.contains("t.\"ngay\"::date"));
        assert!(!sql.contains("TenTram"));
    }

    #[test]
    fn test_baseline_sql() {
        let tagged = sql::baselines(ColumnCasing::Tagged);
        assert!(tagged.contains("FROM so_lieu_tbnn AS t"));
        assert!(tagged.contains("t.\"Thang\"::int = $2 AND t.\"Ky\" = $3"));

        let lower = sql::baselines(ColumnCasing::Lowercase);
        assert!(lower.contains("t.\"thang\"::int = $2 AND t.\"ky\" = $3"));
    }

    #[test]
    fn test_write_sql() {
        let update = sql::update_reading(ColumnCasing::Tagged, "Hmax");
        assert_eq!(
            update,
            "UPDATE so_lieu_thuy_van SET \"Hmax\" = $1, \"TenDai\" = COALESCE($2, \"TenDai\") WHERE \"id\" = $3"
        );

        let insert = sql::insert_reading(ColumnCasing::Lowercase, "TgMax");
        assert_eq!(
            insert,
            "INSERT INTO so_lieu_thuy_van (\"tentram\", \"tendai\", \"ngay\", \"tgmax\") VALUES ($1, $2, $3::date, $4)"
        );
    }

    #[test]
    fn test_raw_row_drops_nested_values() {
        let row = raw_row(json!({"TenTram": "A", "meta": {"a": 1}, "tags": [1, 2], "R24": 1.5}))
            .unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row["R24"], CellValue::Float(1.5));
        assert!(raw_row(json!([1, 2])).is_none());
    }

    #[test]
    fn test_decode_rows_normalizes_and_skips() {
        let values = vec![
            json!({"tentram": "A", "ngay": "2024-01-02", "hmax": "101"}),
            json!({"tentram": "B"}),
            json!({"TenTram": "C", "Ngay": "2024-01-02", "R24": 3}),
        ];
        let records = decode_rows(tables::READINGS, values, DailyRecord::from_row);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].station, "A");
        assert_eq!(records[0].max_level, Some(101.0));
        assert_eq!(records[1].rainfall.r24, Some(3.0));
    }
}
