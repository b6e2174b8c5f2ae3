//! HTTP endpoints for sensors and the dashboard.
//!
//! # Lock Ordering
//!
//! Handlers that need both the settings document and the store acquire them
//! in this order:
//! 1. `settings` (through [`SettingsStore`](crate::settings::SettingsStore) methods)
//! 2. `store`
//!
//! The ingestion path releases the store before refreshing the settings
//! device cache, so it never holds both.
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Missing
//! settings (no persisted document and no usable template) return HTTP 503
//! with `"state": "unconfigured"`; the sensor endpoints keep working.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use ht_store::{
    DeviceAttribute, LIVENESS_THRESHOLD, NewMeasurement, StoredDevice, StoredMeasurement,
};
use ht_types::ReadingPayload;

use crate::dashboard::{self, Dashboard};
use crate::settings::{SetOutcome, SettingsError};
use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Sensor endpoints
        .route("/data", post(ingest))
        .route("/next", get(next_sync))
        // Health and status
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        // Dashboard
        .route("/api/dashboard", get(get_dashboard))
        // Devices
        .route("/api/devices", get(list_devices))
        .route("/api/devices/{id}", get(get_device).put(update_device))
        .route("/api/devices/{id}/current", get(get_current_reading))
        .route("/api/devices/{id}/readings", get(get_readings))
        .route("/api/devices/{id}/export", get(export_readings))
        // Settings
        .route("/api/config", get(get_config).put(update_config))
        .route("/api/config/export", post(export_config))
        .route("/api/config/import", post(import_config))
}

/// Response to an accepted reading.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    /// Row id of the stored measurement.
    pub id: i64,
    /// Seconds until the device should post again.
    pub next_sync: u32,
}

/// Accept a reading from a sensor.
///
/// The device is registered on first sight. Registration and the insert
/// happen under one store lock, so a measurement never references a
/// missing device.
async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReadingPayload>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let measurement = NewMeasurement::from_payload(&payload);
    let (first_seen, id) = {
        let store = state.store.lock().await;
        let first_seen = store.upsert_on_first_seen(&payload.device_id)?;
        let id = store.insert_measurement(&measurement)?;
        (first_seen, id)
    };

    if first_seen.created {
        info!("Registered new device {}", payload.device_id);
        refresh_device_cache(&state).await;
    }

    debug!(
        "Stored reading {} from {}: {:.1}C {:.1}%",
        id, payload.device_id, payload.temperature_c, payload.humidity_pct
    );

    Ok(Json(IngestResponse {
        status: "ok",
        id,
        next_sync: state.sync.seconds_remaining(),
    }))
}

/// Plain-text countdown polled by sensors.
async fn next_sync(State(state): State<Arc<AppState>>) -> String {
    format!("sync_time {}", state.sync.seconds_remaining())
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    /// Whether the settings document is available.
    pub configured: bool,
    /// Selected preset key, when configured.
    pub data_period: Option<&'static str>,
    pub database_size: String,
    pub database_bytes: u64,
    pub device_count: usize,
    pub measurement_count: u64,
    pub sync_remaining: u32,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let settings = state.settings.load().await.ok();

    let store = state.store.lock().await;
    let database_bytes = store.size_bytes()?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        configured: settings.is_some(),
        data_period: settings.map(|s| s.data_period.key()),
        database_size: ht_store::format_size(database_bytes),
        database_bytes,
        device_count: store.list_devices()?.len(),
        measurement_count: store.count_measurements(None)?,
        sync_remaining: state.sync.seconds_remaining(),
    }))
}

async fn get_dashboard(State(state): State<Arc<AppState>>) -> Result<Json<Dashboard>, AppError> {
    let settings = state.settings.load().await?;
    let store = state.store.lock().await;
    let dashboard = dashboard::build(&settings, &store, state.sync.next_refresh_hint())?;
    Ok(Json(dashboard))
}

/// Device response.
#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub device_id: String,
    pub nickname: String,
    pub name: String,
    pub temp_comp: f64,
    pub hum_comp: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    /// Whether a reading arrived within the liveness threshold.
    pub online: bool,
}

impl DeviceResponse {
    fn new(device: StoredDevice, latest: Option<&StoredMeasurement>) -> Self {
        let last_seen = latest.map(|m| m.captured_at);
        let online = last_seen
            .is_some_and(|t| t >= OffsetDateTime::now_utc() - LIVENESS_THRESHOLD);
        let name = device.to_device().display_name().to_string();

        Self {
            device_id: device.device_id,
            nickname: device.nickname,
            name,
            temp_comp: device.temp_comp,
            hum_comp: device.hum_comp,
            first_seen: device.first_seen,
            last_seen,
            online,
        }
    }
}

/// List all registered devices.
async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeviceResponse>>, AppError> {
    let store = state.store.lock().await;
    let devices = store
        .list_devices()?
        .into_iter()
        .map(|device| {
            let latest = store.latest_any(&device.device_id)?;
            Ok(DeviceResponse::new(device, latest.as_ref()))
        })
        .collect::<Result<Vec<_>, AppError>>()?;
    Ok(Json(devices))
}

/// Get a single device.
async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeviceResponse>, AppError> {
    let store = state.store.lock().await;
    let device = store
        .get_device(&id)?
        .ok_or_else(|| AppError::NotFound(format!("Device not found: {}", id)))?;
    let latest = store.latest_any(&id)?;
    Ok(Json(DeviceResponse::new(device, latest.as_ref())))
}

/// Request to edit a device's metadata.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDeviceRequest {
    pub nickname: Option<String>,
    pub temp_comp: Option<f64>,
    pub hum_comp: Option<f64>,
}

impl UpdateDeviceRequest {
    fn into_attributes(self) -> Vec<DeviceAttribute> {
        let mut attributes = Vec::new();
        if let Some(nickname) = self.nickname {
            attributes.push(DeviceAttribute::Nickname(nickname.trim().to_string()));
        }
        if let Some(offset) = self.temp_comp {
            attributes.push(DeviceAttribute::TempComp(offset));
        }
        if let Some(offset) = self.hum_comp {
            attributes.push(DeviceAttribute::HumComp(offset));
        }
        attributes
    }
}

/// Edit a device's nickname or calibration offsets.
async fn update_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDeviceRequest>,
) -> Result<Json<DeviceResponse>, AppError> {
    let (device, latest) = {
        let store = state.store.lock().await;
        for attribute in request.into_attributes() {
            store.set_device_attribute(&id, attribute)?;
        }
        let device = store
            .get_device(&id)?
            .ok_or_else(|| AppError::NotFound(format!("Device not found: {}", id)))?;
        (device, store.latest_any(&id)?)
    };

    refresh_device_cache(&state).await;
    info!("Updated device {}", id);

    Ok(Json(DeviceResponse::new(device, latest.as_ref())))
}

/// Get the latest reading for a device, if it is online.
async fn get_current_reading(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StoredMeasurement>, AppError> {
    let store = state.store.lock().await;
    let reading = store
        .latest(&id)?
        .ok_or_else(|| AppError::NotFound(format!("No recent reading for device: {}", id)))?;
    Ok(Json(reading))
}

/// Query parameters for readings.
#[derive(Debug, Deserialize, Default)]
pub struct ReadingsQuery {
    /// Window length; defaults to the selected preset.
    pub hours: Option<u32>,
}

/// Get a device's readings from the last `hours`, oldest first.
async fn get_readings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ReadingsQuery>,
) -> Result<Json<Vec<StoredMeasurement>>, AppError> {
    let hours = match params.hours {
        Some(hours) => hours,
        None => state.settings.current_window_hours().await?,
    };

    let store = state.store.lock().await;
    Ok(Json(store.query_range(&id, hours)?))
}

/// Download every reading of a device as CSV.
async fn export_readings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store.lock().await;
    if store.get_device(&id)?.is_none() {
        return Err(AppError::NotFound(format!("Device not found: {}", id)));
    }

    let mut body = Vec::new();
    let rows = store.export_measurements_csv(Some(&id), &mut body)?;
    debug!("Exported {} rows for {}", rows, id);

    let filename = format!("{}.csv", id.replace(':', ""));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    ))
}

/// Get the full settings document.
async fn get_config(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let settings = state.settings.load().await?;
    Ok(Json(settings.to_document()?))
}

/// Per-key result of a settings update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOutcome {
    Applied,
    Rejected,
    Ignored,
    /// The document was written to the backup file.
    Saved,
}

impl From<SetOutcome> for KeyOutcome {
    fn from(outcome: SetOutcome) -> Self {
        match outcome {
            SetOutcome::Applied => KeyOutcome::Applied,
            SetOutcome::Rejected => KeyOutcome::Rejected,
            SetOutcome::Ignored => KeyOutcome::Ignored,
        }
    }
}

/// Response to a settings update.
#[derive(Debug, Serialize)]
pub struct UpdateConfigResponse {
    pub results: BTreeMap<String, KeyOutcome>,
    pub settings: Value,
}

/// Apply a batch of settings edits.
///
/// Keys are applied one at a time; a rejected value stops the batch with
/// HTTP 400 and earlier keys stay applied. Keys of the form
/// `{device_id}-{field}` edit a registered device, and `save_config` writes
/// the document to the backup file.
async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(edits): Json<serde_json::Map<String, Value>>,
) -> Result<Json<UpdateConfigResponse>, AppError> {
    let mut results = BTreeMap::new();

    for (key, value) in &edits {
        let outcome = if key == "save_config" {
            state
                .settings
                .export_to_file(&state.config.settings.backup)
                .await?;
            KeyOutcome::Saved
        } else if let Some((device_id, attribute)) = device_edit(&state, key, value).await? {
            state.store.lock().await.set_device_attribute(&device_id, attribute)?;
            refresh_device_cache(&state).await;
            KeyOutcome::Applied
        } else {
            state.settings.set_and_persist(key, value).await?.into()
        };
        results.insert(key.clone(), outcome);
    }

    let settings = state.settings.load().await?.to_document()?;
    Ok(Json(UpdateConfigResponse { results, settings }))
}

/// Resolve a `{device_id}-{field}` key against the registry.
///
/// Returns `None` when the key does not name a registered device.
async fn device_edit(
    state: &AppState,
    key: &str,
    value: &Value,
) -> Result<Option<(String, DeviceAttribute)>, AppError> {
    let Some((device_id, field)) = key.rsplit_once('-') else {
        return Ok(None);
    };
    if !matches!(field, "nickname" | "nick" | "temp_comp" | "hum_comp") {
        return Ok(None);
    }
    if state.store.lock().await.get_device(device_id)?.is_none() {
        return Ok(None);
    }

    let attribute = match field {
        "temp_comp" => DeviceAttribute::TempComp(parse_offset(key, value)?),
        "hum_comp" => DeviceAttribute::HumComp(parse_offset(key, value)?),
        _ => DeviceAttribute::Nickname(match value {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        }),
    };
    Ok(Some((device_id.to_string(), attribute)))
}

fn parse_offset(key: &str, value: &Value) -> Result<f64, AppError> {
    let offset = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    offset.filter(|o| o.is_finite()).ok_or_else(|| {
        AppError::BadRequest(format!("Invalid value for '{}': expected a number", key))
    })
}

/// The device list in the settings document lags the registry when this
/// fails; the next refresh or settings load rebuilds it. Callers have
/// already committed their registry change and must still succeed.
async fn refresh_device_cache(state: &AppState) {
    if let Err(e) = state.settings.refresh_devices().await {
        warn!("Failed to refresh device cache: {}", e);
    }
}

/// Response to a settings export.
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub path: PathBuf,
}

/// Write the settings document to the configured backup file.
///
/// The location is fixed by the server configuration; other paths are only
/// reachable from the command line.
async fn export_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ExportResponse>, AppError> {
    let path = state.config.settings.backup.clone();
    state.settings.export_to_file(&path).await?;
    Ok(Json(ExportResponse { path }))
}

/// Replace the settings document from the configured backup file.
async fn import_config(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let settings = state
        .settings
        .import_from_file(&state.config.settings.backup)
        .await?;
    Ok(Json(settings.to_document()?))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    /// No settings document and no usable template.
    Unconfigured(String),
    Store(ht_store::Error),
    Internal(String),
}

impl From<ht_store::Error> for AppError {
    fn from(e: ht_store::Error) -> Self {
        match e {
            ht_store::Error::DeviceNotFound(id) => {
                AppError::NotFound(format!("Device not found: {}", id))
            }
            e => AppError::Store(e),
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::Validation { .. } => AppError::BadRequest(e.to_string()),
            SettingsError::Bootstrap { .. } | SettingsError::Persisted { .. } => {
                AppError::Unconfigured(e.to_string())
            }
            SettingsError::Store(e) => e.into(),
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unconfigured(msg) => {
                let body = serde_json::json!({
                    "error": msg,
                    "state": "unconfigured",
                });
                return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
            }
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
