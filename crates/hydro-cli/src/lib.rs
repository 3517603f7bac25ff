use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use hydro_core::{
    CellValue, DailyRecord, ManualEntry, PeriodCode, PeriodSelection, ReadingStore,
    StationMetadata, UpsertOutcome,
};
use hydro_report::{
    daily_synthesis_csv, group_summary_csv, readings_csv, station_summary_csv, DailySynthesis,
    GroupQuery, GroupReport, ReportError, ReportService, StationQuery, StationReport,
};
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;
use serde_json::json;

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    reports: ReportService,
}

pub fn build_app(store: Arc<dyn ReadingStore>) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter().with_registry(registry.clone()).build()?;
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("hydro-cli");

    let requests_total = meter
        .u64_counter("hydro_requests_total")
        .with_description("Total HTTP requests served")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        provider,
        requests_total,
        reports: ReportService::new(store),
    });

    let api = Router::new()
        .route("/api/v1/stations", get(stations))
        .route("/api/v1/groups", get(groups))
        .route("/api/v1/readings", get(readings).post(submit_entry))
        .route("/api/v1/summary/station", get(station_summary))
        .route("/api/v1/summary/group", get(group_summary))
        .route("/api/v1/daily", get(daily))
        .route("/api/v1/export/readings.csv", get(export_readings))
        .route("/api/v1/export/station.csv", get(export_station))
        .route("/api/v1/export/group.csv", get(export_group))
        .route("/api/v1/export/daily.csv", get(export_daily))
        .route("/api/v1/visits", post(record_visit))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            count_requests,
        ));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .merge(api)
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

/// Error body returned by every API route: `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Report(ReportError),
}

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        ApiError::Report(e)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Report(ReportError::Export(e)) => {
                tracing::error!(error = %e, "CSV export failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Report(e) if e.is_invalid_input() => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Report(e) => {
                tracing::warn!(error = %e, "Backend request failed");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn count_requests(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    state.requests_total.add(1, &[]);
    next.run(request).await
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.requests_total.add(1, &[]);
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> (
    [(axum::http::header::HeaderName, axum::http::HeaderValue); 1],
    String,
) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}

fn selection(
    year: i32,
    month: u32,
    period: Option<PeriodCode>,
    date: Option<NaiveDate>,
) -> PeriodSelection {
    let selection = PeriodSelection::new(year, month, period.unwrap_or(PeriodCode::FullMonth));
    match date {
        Some(anchor) => selection.with_anchor(anchor),
        None => selection,
    }
}

fn csv_response(name: &str, body: Vec<u8>) -> Response {
    let filename: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct StationsParams {
    group: Option<String>,
}

async fn stations(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<StationsParams>, QueryRejection>,
) -> ApiResult<Json<Vec<StationMetadata>>> {
    let Query(params) = query?;
    let roster = match params.group.as_deref().filter(|g| !g.trim().is_empty()) {
        Some(group) => state.reports.stations_in_group(group).await?,
        None => state.reports.roster().await?,
    };
    Ok(Json(roster))
}

async fn groups(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.reports.groups().await?))
}

#[derive(Debug, Deserialize)]
struct ReadingsParams {
    station: String,
    from: NaiveDate,
    to: NaiveDate,
}

async fn readings(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ReadingsParams>, QueryRejection>,
) -> ApiResult<Json<Vec<DailyRecord>>> {
    let Query(params) = query?;
    let rows = state
        .reports
        .readings(&params.station, params.from, params.to)
        .await?;
    Ok(Json(rows))
}

async fn export_readings(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ReadingsParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let rows = state
        .reports
        .readings(&params.station, params.from, params.to)
        .await?;
    let name = format!("SoLieu_{}_{}.csv", params.station, params.from);
    Ok(csv_response(&name, readings_csv(&rows)?))
}

/// Manual entry body
#[derive(Debug, Deserialize)]
struct EntryRequest {
    station: String,
    group: Option<String>,
    date: NaiveDate,
    column: String,
    value: CellValue,
}

async fn submit_entry(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<EntryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let Json(req) = body?;
    let raw = req.value.as_text().unwrap_or_default();
    let entry = ManualEntry::parse(
        &req.station,
        req.group.as_deref(),
        req.date,
        &req.column,
        &raw,
    )
    .map_err(ReportError::from)?;

    let outcome = state.reports.submit_entry(&entry).await?;
    let status = match outcome {
        UpsertOutcome::Inserted => StatusCode::CREATED,
        UpsertOutcome::Updated => StatusCode::OK,
    };
    Ok((status, Json(json!({ "outcome": outcome, "entry": entry }))))
}

#[derive(Debug, Deserialize)]
struct StationSummaryParams {
    station: String,
    year: i32,
    month: u32,
    period: Option<PeriodCode>,
    date: Option<NaiveDate>,
}

impl StationSummaryParams {
    fn query(&self) -> StationQuery {
        StationQuery::new(
            self.station.as_str(),
            selection(self.year, self.month, self.period, self.date),
        )
    }
}

async fn station_summary(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<StationSummaryParams>, QueryRejection>,
) -> ApiResult<Json<StationReport>> {
    let Query(params) = query?;
    Ok(Json(state.reports.station_summary(&params.query()).await?))
}

async fn export_station(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<StationSummaryParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let report = state.reports.station_summary(&params.query()).await?;
    let name = format!(
        "DacTrung_{}_{}_{}.csv",
        report.station, params.month, params.year
    );
    Ok(csv_response(&name, station_summary_csv(&report)?))
}

#[derive(Debug, Deserialize)]
struct GroupSummaryParams {
    group: String,
    year: i32,
    month: u32,
    period: Option<PeriodCode>,
    date: Option<NaiveDate>,
}

impl GroupSummaryParams {
    fn query(&self) -> GroupQuery {
        GroupQuery::new(
            self.group.as_str(),
            selection(self.year, self.month, self.period, self.date),
        )
    }
}

async fn group_summary(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<GroupSummaryParams>, QueryRejection>,
) -> ApiResult<Json<GroupReport>> {
    let Query(params) = query?;
    Ok(Json(state.reports.group_summary(&params.query()).await?))
}

async fn export_group(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<GroupSummaryParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let report = state.reports.group_summary(&params.query()).await?;
    let name = format!("TongHop_{}_{}.csv", report.group, report.selection.period);
    Ok(csv_response(&name, group_summary_csv(&report)?))
}

#[derive(Debug, Deserialize)]
struct DailyParams {
    date: NaiveDate,
    group: Option<String>,
}

async fn daily(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<DailyParams>, QueryRejection>,
) -> ApiResult<Json<DailySynthesis>> {
    let Query(params) = query?;
    let synthesis = state
        .reports
        .daily_synthesis(params.date, params.group.as_deref())
        .await?;
    Ok(Json(synthesis))
}

async fn export_daily(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<DailyParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let synthesis = state
        .reports
        .daily_synthesis(params.date, params.group.as_deref())
        .await?;
    let name = format!("TongHopNgay_{}.csv", params.date);
    Ok(csv_response(&name, daily_synthesis_csv(&synthesis)?))
}

async fn record_visit(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let total = state.reports.record_visit().await?;
    Ok(Json(json!({ "total": total })))
}
