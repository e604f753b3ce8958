//! # HTTP Query Surface
//!
//! Read-only JSON views of the [`TelemetryStore`] and host metrics.
//!
//! Routes:
//! - `GET /` index of the resources below
//! - `GET /latest` current status document
//! - `GET /previous[?date=YYYYMMDD]` an archived run
//! - `GET /previous/dates` start dates of the archived runs
//! - `GET /previous/showers`, `/previous/meteors`, `/previous/summary`,
//!   `/previous/flux`, `/previous/fits` reports from the night archive
//!   (each takes `?date=YYYYMMDD`)
//! - `GET /system` host memory, load and disk usage
//!
//! Status responses carry `Last-Modified` and honour `If-Modified-Since`.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::warn;

use crate::archive::ArchiveReader;
use crate::error::{Result, TelemetryError};
use crate::status::timestamp::{is_sentinel, to_http_date, Timestamp};
use crate::store::TelemetryStore;
use crate::system::{DiskInfo, MemoryInfo, SystemInfo, SystemMonitor};

/// Layout of the `date` query parameter and of `/previous/dates` entries.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Base of the Global Meteor Network weblog pages.
pub const WEBLOG_URL: &str = "https://globalmeteornetwork.org/weblog";

/// Path and description of every resource, in index order.
pub const ROUTES: &[(&str, &str)] = &[
    ("/latest", "Current status"),
    ("/previous", "Most recent archived run (?date=YYYYMMDD for another)"),
    ("/previous/dates", "Dates of the archived runs"),
    ("/previous/showers", "Meteor counts per shower of the last night"),
    ("/previous/meteors", "Meteors detected in the last night"),
    ("/previous/summary", "Observation summary of the last night"),
    ("/previous/flux", "Flux time intervals of the last night"),
    ("/previous/fits", "FITS files of the last night"),
    ("/system", "Host memory, load and disk usage"),
];

/// Shared server state.
#[derive(Debug)]
pub struct AppState {
    pub store: Arc<TelemetryStore>,
    pub monitor: Arc<SystemMonitor>,
    pub archive: Arc<ArchiveReader>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviousParams {
    pub date: Option<String>,
}

/// Body of `GET /system`. Readings that failed are `null`.
#[derive(Debug, Serialize)]
pub struct SystemResponse {
    pub system: Option<SystemInfo>,
    pub memory: Option<MemoryInfo>,
    pub disk: Option<DiskInfo>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for TelemetryError {
    fn into_response(self) -> Response {
        let status = match self {
            TelemetryError::HistoryEmpty | TelemetryError::HistoryNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

/// The `date` query parameter, if given.
fn requested_date(params: &PreviousParams) -> std::result::Result<Option<NaiveDate>, Response> {
    match params.date.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT).map(Some).map_err(|_| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid date '{}', expected YYYYMMDD", raw),
            )
        }),
    }
}

/// `true` if the client copy named by `If-Modified-Since` is still fresh.
fn not_modified(headers: &HeaderMap, last_modified: Timestamp) -> bool {
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
        .is_some_and(|since| since.with_timezone(&Utc) >= last_modified)
}

/// JSON response stamped with `last_modified`, or 304 if the client is current.
fn conditional_json<T: Serialize>(
    headers: &HeaderMap,
    last_modified: Timestamp,
    body: &T,
) -> Response {
    // Nothing parsed yet, so there is no meaningful freshness to report
    if is_sentinel(&last_modified) {
        return Json(body).into_response();
    }

    if not_modified(headers, last_modified) {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    (
        [(header::LAST_MODIFIED, to_http_date(&last_modified))],
        Json(body),
    )
        .into_response()
}

fn render_index(station_id: Option<&str>, latest_archive: Option<&str>) -> String {
    let title = match station_id {
        Some(station) => format!("RMS telemetry for {}", station),
        None => "RMS telemetry".to_string(),
    };
    let mut items: String = ROUTES
        .iter()
        .map(|(path, description)| {
            format!("<li><a href=\"{0}\">{0}</a> {1}</li>", path, description)
        })
        .collect();

    if let (Some(station), Some(archive)) = (station_id, latest_archive) {
        let country = station.get(..2).unwrap_or(station);
        items.push_str(&format!(
            "<li><a href=\"{}/{}/{}/{}_detected/\">Weblog entry</a></li>",
            WEBLOG_URL, country, station, archive
        ));
    }

    format!(
        "<!DOCTYPE html><html><head><title>{0}</title></head>\
         <body><h1>{0}</h1><p>v{1}</p><ul>{2}</ul></body></html>",
        title,
        env!("CARGO_PKG_VERSION"),
        items
    )
}

pub async fn handle_index(State(state): State<Arc<AppState>>) -> Html<String> {
    let station_id = state.store.get_current().station_id.or_else(|| {
        state
            .store
            .get_history(None)
            .ok()
            .and_then(|entry| entry.document.station_id)
    });

    let archive = Arc::clone(&state.archive);
    let lookup = tokio::task::spawn_blocking(move || archive.archive_dir(None)).await;
    let latest_archive = match lookup {
        Ok(Ok(dir)) => dir
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned()),
        Ok(Err(e)) => {
            warn!("Failed to look up the latest archive: {}", e);
            None
        }
        Err(e) => {
            warn!("Archive lookup task failed: {}", e);
            None
        }
    };

    Html(render_index(station_id.as_deref(), latest_archive.as_deref()))
}

pub async fn handle_latest(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let entry = state.store.current_entry();
    conditional_json(&headers, entry.last_modified, &entry.document)
}

pub async fn handle_previous(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PreviousParams>,
    headers: HeaderMap,
) -> Response {
    let date = match requested_date(&params) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match state.store.get_history(date) {
        Ok(entry) => conditional_json(&headers, entry.last_modified, &entry.document),
        Err(e) => e.into_response(),
    }
}

pub async fn handle_previous_dates(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let dates: Vec<String> = state
        .store
        .list_history_dates()
        .iter()
        .map(|date| date.format(DATE_FORMAT).to_string())
        .collect();

    match state.store.history_last_modified() {
        Some(last_modified) => conditional_json(&headers, last_modified, &dates),
        None => Json(dates).into_response(),
    }
}

/// Run an archive lookup off the async runtime and render its result.
async fn archive_json<T, F>(state: &AppState, params: &PreviousParams, read: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&ArchiveReader, Option<NaiveDate>) -> Result<Option<T>> + Send + 'static,
{
    let date = match requested_date(params) {
        Ok(date) => date,
        Err(response) => return response,
    };

    let archive = Arc::clone(&state.archive);
    match tokio::task::spawn_blocking(move || read(&archive, date)).await {
        Ok(Ok(Some(body))) => Json(body).into_response(),
        Ok(Ok(None)) => error_response(
            StatusCode::NOT_FOUND,
            "No archived data found".to_string(),
        ),
        Ok(Err(e)) => {
            warn!("Archive lookup failed: {}", e);
            e.into_response()
        }
        Err(e) => TelemetryError::Io(std::io::Error::other(e)).into_response(),
    }
}

pub async fn handle_previous_showers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PreviousParams>,
) -> Response {
    archive_json(&state, &params, |archive, date| archive.shower_breakdown(date)).await
}

pub async fn handle_previous_meteors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PreviousParams>,
) -> Response {
    archive_json(&state, &params, |archive, date| archive.meteor_details(date)).await
}

pub async fn handle_previous_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PreviousParams>,
) -> Response {
    archive_json(&state, &params, |archive, date| archive.observation_summary(date)).await
}

pub async fn handle_previous_flux(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PreviousParams>,
) -> Response {
    archive_json(&state, &params, |archive, date| archive.flux_time_intervals(date)).await
}

pub async fn handle_previous_fits(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PreviousParams>,
) -> Response {
    archive_json(&state, &params, |archive, date| {
        Ok(archive.fits_listing(date)?.map(|files| {
            files
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect::<Vec<String>>()
        }))
    })
    .await
}

pub async fn handle_system(State(state): State<Arc<AppState>>) -> Response {
    let monitor = Arc::clone(&state.monitor);
    let snapshot = tokio::task::spawn_blocking(move || SystemResponse {
        system: monitor.system().map_err(|e| warn!("System info unavailable: {}", e)).ok(),
        memory: monitor.memory().map_err(|e| warn!("Memory info unavailable: {}", e)).ok(),
        disk: monitor.disk().map_err(|e| warn!("Disk info unavailable: {}", e)).ok(),
    })
    .await;

    match snapshot {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            warn!("Host metrics task failed: {}", e);
            TelemetryError::Metrics(e.to_string()).into_response()
        }
    }
}

/// Build the router over the shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/latest", get(handle_latest))
        .route("/previous", get(handle_previous))
        .route("/previous/dates", get(handle_previous_dates))
        .route("/previous/showers", get(handle_previous_showers))
        .route("/previous/meteors", get(handle_previous_meteors))
        .route("/previous/summary", get(handle_previous_summary))
        .route("/previous/flux", get(handle_previous_flux))
        .route("/previous/fits", get(handle_previous_fits))
        .route("/system", get(handle_system))
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns error if accepting connections fails
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ShowerCatalog, ARCHIVE_DIR_NAME};
    use crate::config::CacheConfig;
    use crate::parser::{parse_line, ParserContext};
    use axum::body::to_bytes;
    use axum::http::HeaderValue;
    use std::fs;
    use tempfile::TempDir;

    const NIGHT: &str = "US0001_20250812_013000_000000";

    fn state_with_logs(log_dir: &Path) -> Arc<AppState> {
        let catalog = ShowerCatalog::parse(
            "7|PER|Perseids|120.0|140.0|145.0|48.0|1.4|58.0|0.26|59.1|0.0|GMN\n",
        );
        Arc::new(AppState {
            store: Arc::new(TelemetryStore::default()),
            monitor: Arc::new(SystemMonitor::new("/", &CacheConfig::default())),
            archive: Arc::new(ArchiveReader::with_catalog(
                log_dir,
                catalog,
                &CacheConfig::default(),
            )),
        })
    }

    fn test_state() -> Arc<AppState> {
        state_with_logs(Path::new("/nonexistent/rms-telemetry/logs"))
    }

    /// Station root with a log directory and one archived night.
    fn archived_station() -> (TempDir, Arc<AppState>) {
        let root = TempDir::new().unwrap();
        let log_dir = root.path().join("logs");
        let night = root.path().join(ARCHIVE_DIR_NAME).join(NIGHT);
        fs::create_dir_all(&log_dir).unwrap();
        fs::create_dir_all(&night).unwrap();

        fs::write(
            night.join(format!("{}_radiants.txt", NIGHT)),
            "20250812 01:02:03.500000, 2460899.54, 139.5, PER, 47.1, 57.9, 48.3, 55.1, 59.0, -1.5, 0.5, 60.0\n\
             # Code, Count, IAU link\n\
             #  PER,  1, link\n\
             #  ...,  2, link\n\
             #\n",
        )
        .unwrap();
        fs::write(
            night.join(format!("{}.csv", NIGHT)),
            "Ver,Y,M,D,h,m,s,Mag,Dur,Az1,Alt1,Az2,Alt2,RA1,Dec1,RA2,Dec2\n\
             1.0,2025,8,12,1,2,3.5,-1.5,0.5,10.0,40.0,12.0,35.0,47.1,57.9,48.3,55.1\n",
        )
        .unwrap();
        fs::write(
            night.join(format!("{}_observation_summary.json", NIGHT)),
            r#"{"total_fits": 300}"#,
        )
        .unwrap();
        fs::write(night.join(format!("FF_{}.fits", NIGHT)), "").unwrap();

        let state = state_with_logs(&log_dir);
        (root, state)
    }

    fn feed(store: &TelemetryStore, ctx: &mut ParserContext, lines: &[&str]) {
        let mut doc = store.get_current();
        for line in lines {
            doc = parse_line(line, doc, ctx);
            if doc.end_of_day {
                let mut settled = doc.clone();
                settled.end_of_day = false;
                store.set_current(settled);
                store.set_current(doc);
                doc = store.get_current();
            }
        }
        store.set_current(doc);
    }

    fn archive_night(store: &TelemetryStore, ctx: &mut ParserContext, day: u32) {
        let lines = [
            format!("2025/08/{:02} 13:19:51-INFO-StartCapture-line:10 - Starting capture for 6.5 hours", day),
            format!("2025/08/{:02} 19:49:51-INFO-StartCapture-line:11 - Ending capture...", day),
            format!(
                "2025/08/{:02} 20:00:00-INFO-StartCapture-line:50 - Next start time: 2025-08-{:02} 13:18:00 UTC",
                day,
                day + 1
            ),
        ];
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        feed(store, ctx, &refs);
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn since(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MODIFIED_SINCE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_index_lists_routes() {
        let Html(page) = handle_index(State(test_state())).await;
        for (path, _) in ROUTES {
            assert!(page.contains(path), "index should link {}", path);
        }
        assert!(!page.contains(WEBLOG_URL));
    }

    #[tokio::test]
    async fn test_index_shows_station_and_weblog() {
        let (_root, state) = archived_station();
        let mut doc = state.store.get_current();
        doc.station_id = Some("US0001".to_string());
        state.store.set_current(doc);

        let Html(page) = handle_index(State(state)).await;
        assert!(page.contains("<h1>RMS telemetry for US0001</h1>"));
        assert!(page.contains(&format!(
            "https://globalmeteornetwork.org/weblog/US/US0001/{}_detected/",
            NIGHT
        )));
    }

    #[tokio::test]
    async fn test_index_station_from_history() {
        let state = test_state();
        let mut ctx = ParserContext::default();
        feed(
            &state.store,
            &mut ctx,
            &["2025/08/09 13:19:51-INFO-StartCapture-line:10 - Starting capture for 6.5 hours"],
        );
        let mut running = state.store.get_current();
        running.station_id = Some("CA0002".to_string());
        state.store.set_current(running);

        let mut next_day = state.store.get_current();
        next_day.station_id = None;
        next_day.end_of_day = true;
        state.store.set_current(next_day);
        assert_eq!(state.store.get_current().station_id, None);

        let Html(page) = handle_index(State(state)).await;
        assert!(page.contains("RMS telemetry for CA0002"));
        assert!(!page.contains(WEBLOG_URL), "no archive, no weblog link");
    }

    #[tokio::test]
    async fn test_latest_before_any_log() {
        let state = test_state();
        let response = handle_latest(State(state), HeaderMap::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::LAST_MODIFIED).is_none());
        assert_eq!(body_json(response).await, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_latest_carries_last_modified() {
        let state = test_state();
        let mut ctx = ParserContext::new();
        feed(
            &state.store,
            &mut ctx,
            &["2025/08/09 13:20:00-INFO-DetectStarsAndMeteors-line:20 - Detected stars: 42"],
        );

        let response = handle_latest(State(Arc::clone(&state)), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::LAST_MODIFIED],
            "Sat, 09 Aug 2025 13:20:00 GMT"
        );
        let json = body_json(response).await;
        assert_eq!(json["detections"]["n_star"], 42);
    }

    #[tokio::test]
    async fn test_latest_if_modified_since() {
        let state = test_state();
        let mut ctx = ParserContext::new();
        feed(
            &state.store,
            &mut ctx,
            &["2025/08/09 13:20:00-INFO-DetectStarsAndMeteors-line:20 - Detected stars: 42"],
        );

        let fresh = handle_latest(
            State(Arc::clone(&state)),
            since("Sat, 09 Aug 2025 13:20:00 GMT"),
        )
        .await;
        assert_eq!(fresh.status(), StatusCode::NOT_MODIFIED);

        let stale = handle_latest(
            State(Arc::clone(&state)),
            since("Sat, 09 Aug 2025 13:19:59 GMT"),
        )
        .await;
        assert_eq!(stale.status(), StatusCode::OK);

        let garbage = handle_latest(State(state), since("yesterday")).await;
        assert_eq!(garbage.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_previous_with_empty_history() {
        let response = handle_previous(
            State(test_state()),
            Query(PreviousParams::default()),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_previous_by_date() {
        let state = test_state();
        let mut ctx = ParserContext::new();
        archive_night(&state.store, &mut ctx, 8);
        archive_night(&state.store, &mut ctx, 9);

        let newest = handle_previous(
            State(Arc::clone(&state)),
            Query(PreviousParams::default()),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(newest.status(), StatusCode::OK);
        assert_eq!(
            body_json(newest).await["capture"]["started"],
            "2025-08-09T13:19:51Z"
        );

        let older = handle_previous(
            State(Arc::clone(&state)),
            Query(PreviousParams { date: Some("20250808".to_string()) }),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(
            older.headers()[header::LAST_MODIFIED],
            "Fri, 08 Aug 2025 20:00:00 GMT"
        );
        assert_eq!(
            body_json(older).await["capture"]["started"],
            "2025-08-08T13:19:51Z"
        );

        let missing = handle_previous(
            State(Arc::clone(&state)),
            Query(PreviousParams { date: Some("20250801".to_string()) }),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let malformed = handle_previous(
            State(state),
            Query(PreviousParams { date: Some("2025-08-08".to_string()) }),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_previous_dates() {
        let state = test_state();
        let empty = handle_previous_dates(State(Arc::clone(&state)), HeaderMap::new()).await;
        assert_eq!(body_json(empty).await, serde_json::json!([]));

        let mut ctx = ParserContext::new();
        archive_night(&state.store, &mut ctx, 8);
        archive_night(&state.store, &mut ctx, 9);

        let response = handle_previous_dates(State(Arc::clone(&state)), HeaderMap::new()).await;
        assert_eq!(
            response.headers()[header::LAST_MODIFIED],
            "Sat, 09 Aug 2025 20:00:00 GMT"
        );
        assert_eq!(
            body_json(response).await,
            serde_json::json!(["20250808", "20250809"])
        );

        let cached = handle_previous_dates(State(state), since("Sat, 09 Aug 2025 20:00:00 GMT")).await;
        assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_archive_reports() {
        let (_root, state) = archived_station();

        let showers = handle_previous_showers(State(Arc::clone(&state)), Query(PreviousParams::default())).await;
        assert_eq!(showers.status(), StatusCode::OK);
        let json = body_json(showers).await;
        assert_eq!(json["Perseids"], 1);
        assert_eq!(json["sporadic"], 2);

        let params = PreviousParams {
            date: Some("20250812".to_string()),
        };
        let meteors = handle_previous_meteors(State(Arc::clone(&state)), Query(params)).await;
        let json = body_json(meteors).await;
        assert_eq!(json[0]["shower"], "Perseids");
        assert_eq!(json[0]["mag"], -1.5);

        let summary = handle_previous_summary(State(Arc::clone(&state)), Query(PreviousParams::default())).await;
        assert_eq!(body_json(summary).await["total_fits"], 300);

        let fits = handle_previous_fits(State(state), Query(PreviousParams::default())).await;
        assert_eq!(
            body_json(fits).await,
            serde_json::json!([format!("FF_{}.fits", NIGHT)])
        );
    }

    #[tokio::test]
    async fn test_archive_report_missing() {
        let (_root, state) = archived_station();
        let flux = handle_previous_flux(State(Arc::clone(&state)), Query(PreviousParams::default())).await;
        assert_eq!(flux.status(), StatusCode::NOT_FOUND);

        let other_night = PreviousParams {
            date: Some("20250801".to_string()),
        };
        let showers = handle_previous_showers(State(Arc::clone(&state)), Query(other_night)).await;
        assert_eq!(showers.status(), StatusCode::NOT_FOUND);

        let bad = PreviousParams {
            date: Some("yesterday".to_string()),
        };
        let response = handle_previous_meteors(State(state), Query(bad)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_archive_reports_without_archive_root() {
        let response = handle_previous_summary(State(test_state()), Query(PreviousParams::default())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_system_has_all_sections() {
        let response = handle_system(State(test_state())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        for key in ["system", "memory", "disk"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_error_status_codes() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        assert_eq!(
            TelemetryError::HistoryEmpty.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TelemetryError::HistoryNotFound(date).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TelemetryError::Metrics("df".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
