//! Dashboard view model.
//!
//! Raw measurements are stored in Celsius exactly as received. Everything
//! here is derived on the way out: Fahrenheit conversion, optional
//! per-device calibration, and one time series per device and quantity.

use serde::Serialize;
use time::OffsetDateTime;

use ht_store::{Store, StoredMeasurement};
use ht_types::{Compensation, DataPeriod, Device};

use crate::settings::Settings;

/// One plotted sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub value: f64,
}

/// A selectable display window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetOption {
    pub key: &'static str,
    pub label: &'static str,
    pub hours: u32,
    pub selected: bool,
}

/// All series for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSeries {
    pub device_id: String,
    /// Nickname, or the device ID when no nickname is set.
    pub name: String,
    pub temperature_f: Vec<Point>,
    pub humidity: Vec<Point>,
    /// Only readings that carried a pressure value.
    pub pressure_hpa: Vec<Point>,
    /// Only readings that carried a PM2.5 value.
    pub pm25: Vec<Point>,
}

/// Everything the dashboard page renders.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub current_period: &'static str,
    pub window_hours: u32,
    /// Presets with the current one first.
    pub presets: Vec<PresetOption>,
    pub compensate: bool,
    /// Seconds until the page should reload.
    pub next_refresh: u32,
    pub devices: Vec<DeviceSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_message: Option<String>,
}

/// Preset selector entries, selected first.
pub fn preset_options(selected: DataPeriod) -> Vec<PresetOption> {
    DataPeriod::ordered_with_selected_first(selected)
        .into_iter()
        .map(|p| PresetOption {
            key: p.key(),
            label: p.label(),
            hours: p.hours(),
            selected: p == selected,
        })
        .collect()
}

/// Build display series for one device.
pub fn device_series(
    device: &Device,
    measurements: &[StoredMeasurement],
    compensate: bool,
) -> DeviceSeries {
    let comp = Compensation::for_device(device, compensate);
    let point = |m: &StoredMeasurement, value: f64| Point {
        time: m.captured_at,
        value,
    };

    DeviceSeries {
        device_id: device.device_id.clone(),
        name: device.display_name().to_string(),
        temperature_f: measurements
            .iter()
            .map(|m| point(m, comp.temperature_f(m.temperature_c)))
            .collect(),
        humidity: measurements
            .iter()
            .map(|m| point(m, comp.humidity(m.humidity_pct)))
            .collect(),
        pressure_hpa: measurements
            .iter()
            .filter_map(|m| m.pressure_hpa.map(|v| point(m, v)))
            .collect(),
        pm25: measurements
            .iter()
            .filter_map(|m| m.pm25.map(|v| point(m, v)))
            .collect(),
    }
}

/// Assemble the dashboard for the current settings.
pub fn build(
    settings: &Settings,
    store: &Store,
    next_refresh: u32,
) -> ht_store::Result<Dashboard> {
    let hours = settings.window_hours();

    let devices = store
        .list_devices()?
        .iter()
        .map(|stored| {
            let device = stored.to_device();
            let measurements = store.query_range(&device.device_id, hours)?;
            Ok(device_series(&device, &measurements, settings.compensate))
        })
        .collect::<ht_store::Result<Vec<_>>>()?;

    Ok(Dashboard {
        current_period: settings.data_period.key(),
        window_hours: hours,
        presets: preset_options(settings.data_period),
        compensate: settings.compensate,
        next_refresh,
        devices,
        startup_message: settings
            .extra
            .get("startup_message")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}
