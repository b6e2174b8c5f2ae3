//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use ht_types::{Device, ReadingPayload, pa_to_hpa};

/// A device row from the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDevice {
    /// Device identifier.
    pub device_id: String,
    /// Human-readable nickname, empty when unset.
    pub nickname: String,
    /// Additive temperature offset.
    pub temp_comp: f64,
    /// Additive humidity offset.
    pub hum_comp: f64,
    /// When the first reading from this device arrived.
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen: OffsetDateTime,
}

impl StoredDevice {
    /// Strip registry bookkeeping, leaving the shared device metadata.
    pub fn to_device(&self) -> Device {
        Device {
            device_id: self.device_id.clone(),
            nickname: self.nickname.clone(),
            temp_comp: self.temp_comp,
            hum_comp: self.hum_comp,
        }
    }
}

/// Result of [`Store::upsert_on_first_seen`](crate::Store::upsert_on_first_seen).
#[derive(Debug, Clone, PartialEq)]
pub struct FirstSeen {
    /// The registry entry, new or existing.
    pub device: StoredDevice,
    /// True when this call created the entry.
    pub created: bool,
}

/// An editable device attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceAttribute {
    Nickname(String),
    TempComp(f64),
    HumComp(f64),
}

impl DeviceAttribute {
    /// Column name in the `devices` table.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            DeviceAttribute::Nickname(_) => "nickname",
            DeviceAttribute::TempComp(_) => "temp_comp",
            DeviceAttribute::HumComp(_) => "hum_comp",
        }
    }
}

/// A reading ready to be appended; the store assigns the capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub device_id: String,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: Option<f64>,
    pub pm25: Option<f64>,
}

impl NewMeasurement {
    /// Build from a sensor payload, scaling pressure from Pa to hPa.
    pub fn from_payload(payload: &ReadingPayload) -> Self {
        Self {
            device_id: payload.device_id.clone(),
            temperature_c: payload.temperature_c,
            humidity_pct: payload.humidity_pct,
            pressure_hpa: payload.pressure_pa.map(pa_to_hpa),
            pm25: payload.pm25,
        }
    }
}

/// A reading stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeasurement {
    /// Database row ID.
    pub id: i64,
    /// Device identifier.
    pub device_id: String,
    /// Server time at which the reading was received.
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    /// Temperature in Celsius.
    pub temperature_c: f64,
    /// Relative humidity percentage.
    pub humidity_pct: f64,
    /// Pressure in hPa, absent for boards without a barometer.
    pub pressure_hpa: Option<f64>,
    /// PM2.5 in µg/m³, absent for boards without a particulate sensor.
    pub pm25: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_measurement_scales_pressure() {
        let payload = ReadingPayload {
            device_id: "AA:BB".to_string(),
            temperature_c: 20.0,
            humidity_pct: 40.0,
            pressure_pa: Some(100_000.0),
            pm25: None,
        };
        let m = NewMeasurement::from_payload(&payload);
        assert_eq!(m.pressure_hpa, Some(1000.0));
        assert_eq!(m.pm25, None);
    }

    #[test]
    fn test_stored_device_to_device() {
        let stored = StoredDevice {
            device_id: "AA:BB".to_string(),
            nickname: "Kitchen".to_string(),
            temp_comp: 1.5,
            hum_comp: -3.0,
            first_seen: OffsetDateTime::now_utc(),
        };
        let device = stored.to_device();
        assert_eq!(device.display_name(), "Kitchen");
        assert_eq!(device.temp_comp, 1.5);
        assert_eq!(device.hum_comp, -3.0);
    }
}
