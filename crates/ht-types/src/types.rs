//! Core types shared between the store and the service.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Display window preset selectable on the dashboard.
///
/// The set of presets is fixed; a configuration can only ever hold one of
/// these keys, so looking up the window length never fails.
///
/// # Examples
///
/// ```
/// use ht_types::DataPeriod;
///
/// let period: DataPeriod = "last_week".parse().unwrap();
/// assert_eq!(period.hours(), 168);
/// assert_eq!(period.label(), "Last Week");
/// assert!("last_year".parse::<DataPeriod>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataPeriod {
    /// The last hour.
    #[cfg_attr(feature = "serde", serde(rename = "last_hour"))]
    LastHour,
    /// The last twelve hours.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "last_12"))]
    Last12Hours,
    /// The last 24 hours.
    #[cfg_attr(feature = "serde", serde(rename = "last_day"))]
    LastDay,
    /// The last seven days.
    #[cfg_attr(feature = "serde", serde(rename = "last_week"))]
    LastWeek,
    /// The last thirty days.
    #[cfg_attr(feature = "serde", serde(rename = "last_month"))]
    LastMonth,
}

impl DataPeriod {
    /// Every preset, shortest window first.
    pub const ALL: [DataPeriod; 5] = [
        DataPeriod::LastHour,
        DataPeriod::Last12Hours,
        DataPeriod::LastDay,
        DataPeriod::LastWeek,
        DataPeriod::LastMonth,
    ];

    /// The persisted key of this preset.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            DataPeriod::LastHour => "last_hour",
            DataPeriod::Last12Hours => "last_12",
            DataPeriod::LastDay => "last_day",
            DataPeriod::LastWeek => "last_week",
            DataPeriod::LastMonth => "last_month",
        }
    }

    /// Human-readable label for selectors.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            DataPeriod::LastHour => "Last Hour",
            DataPeriod::Last12Hours => "Last 12 Hours",
            DataPeriod::LastDay => "Last Day",
            DataPeriod::LastWeek => "Last Week",
            DataPeriod::LastMonth => "Last Month",
        }
    }

    /// Window length in hours.
    #[must_use]
    pub fn hours(&self) -> u32 {
        match self {
            DataPeriod::LastHour => 1,
            DataPeriod::Last12Hours => 12,
            DataPeriod::LastDay => 24,
            DataPeriod::LastWeek => 24 * 7,
            DataPeriod::LastMonth => 24 * 30,
        }
    }

    /// All presets with `selected` moved to the front, the rest in table order.
    #[must_use]
    pub fn ordered_with_selected_first(selected: DataPeriod) -> Vec<DataPeriod> {
        let mut presets = Vec::with_capacity(Self::ALL.len());
        presets.push(selected);
        presets.extend(Self::ALL.iter().copied().filter(|p| *p != selected));
        presets
    }
}

impl FromStr for DataPeriod {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.key() == s)
            .ok_or_else(|| ParseError::UnknownPeriod(s.to_string()))
    }
}

impl fmt::Display for DataPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A sensor device as known to the registry.
///
/// Devices are created the first time a reading arrives from an unseen
/// identifier and are then only edited (nickname, calibration offsets).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Device {
    /// Device identifier, usually the MAC address of the sensor board.
    pub device_id: String,
    /// Human-readable name; empty until the user sets one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub nickname: String,
    /// Additive temperature offset, applied in display units.
    #[cfg_attr(feature = "serde", serde(default))]
    pub temp_comp: f64,
    /// Additive relative humidity offset in percent.
    #[cfg_attr(feature = "serde", serde(default))]
    pub hum_comp: f64,
}

impl Device {
    /// Create a freshly seen device with no nickname and zero offsets.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Default::default()
        }
    }

    /// The nickname if set, otherwise the device identifier.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.nickname.is_empty() {
            &self.device_id
        } else {
            &self.nickname
        }
    }
}

/// A reading as posted by a sensor device.
///
/// Device clocks are not trusted, so the payload carries no timestamp; the
/// server stamps the reading on receipt. The legacy firmware field names
/// (`mac`, `temp`, `hum`) are accepted as aliases.
///
/// ```
/// use ht_types::ReadingPayload;
///
/// let legacy: ReadingPayload =
///     serde_json::from_str(r#"{"mac": "AA:BB", "temp": 21.5, "hum": 40}"#).unwrap();
/// assert_eq!(legacy.device_id, "AA:BB");
/// assert_eq!(legacy.pressure_pa, None);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadingPayload {
    /// Sending device.
    #[cfg_attr(feature = "serde", serde(alias = "mac"))]
    pub device_id: String,
    /// Temperature in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(alias = "temp"))]
    pub temperature_c: f64,
    /// Relative humidity in percent.
    #[cfg_attr(feature = "serde", serde(alias = "hum"))]
    pub humidity_pct: f64,
    /// Barometric pressure in pascal, for boards that have the sensor.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub pressure_pa: Option<f64>,
    /// PM2.5 concentration in µg/m³, for boards that have the sensor.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub pm25: Option<f64>,
}

impl ReadingPayload {
    /// Check the payload before it reaches the store.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidReading`] for an empty device identifier
    /// or any non-finite value.
    pub fn validate(&self) -> ParseResult<()> {
        if self.device_id.trim().is_empty() {
            return Err(ParseError::InvalidReading(
                "device_id cannot be empty".to_string(),
            ));
        }

        let required = [
            ("temperature_c", Some(self.temperature_c)),
            ("humidity_pct", Some(self.humidity_pct)),
            ("pressure_pa", self.pressure_pa),
            ("pm25", self.pm25),
        ];
        for (field, value) in required {
            if let Some(v) = value
                && !v.is_finite()
            {
                return Err(ParseError::InvalidReading(format!(
                    "{} must be a finite number",
                    field
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_table() {
        let table: Vec<(&str, u32)> = DataPeriod::ALL
            .iter()
            .map(|p| (p.key(), p.hours()))
            .collect();
        assert_eq!(
            table,
            vec![
                ("last_hour", 1),
                ("last_12", 12),
                ("last_day", 24),
                ("last_week", 168),
                ("last_month", 720),
            ]
        );
    }

    #[test]
    fn test_period_parse_roundtrip() {
        for period in DataPeriod::ALL {
            assert_eq!(period.key().parse::<DataPeriod>().unwrap(), period);
        }
    }

    #[test]
    fn test_period_parse_unknown() {
        let err = "last_century".parse::<DataPeriod>().unwrap_err();
        assert_eq!(err, ParseError::UnknownPeriod("last_century".to_string()));
        assert!(err.to_string().contains("last_century"));
    }

    #[test]
    fn test_period_serde_uses_keys() {
        let json = serde_json::to_string(&DataPeriod::Last12Hours).unwrap();
        assert_eq!(json, "\"last_12\"");

        let period: DataPeriod = serde_json::from_str("\"last_month\"").unwrap();
        assert_eq!(period, DataPeriod::LastMonth);

        assert!(serde_json::from_str::<DataPeriod>("\"yesterday\"").is_err());
    }

    #[test]
    fn test_selected_period_first() {
        let ordered = DataPeriod::ordered_with_selected_first(DataPeriod::LastWeek);
        assert_eq!(ordered[0], DataPeriod::LastWeek);
        assert_eq!(ordered.len(), DataPeriod::ALL.len());
        assert_eq!(ordered.iter().filter(|p| **p == DataPeriod::LastWeek).count(), 1);
        assert_eq!(ordered[1], DataPeriod::LastHour);
    }

    #[test]
    fn test_device_defaults() {
        let device = Device::new("AA:BB");
        assert_eq!(device.nickname, "");
        assert_eq!(device.temp_comp, 0.0);
        assert_eq!(device.hum_comp, 0.0);
        assert_eq!(device.display_name(), "AA:BB");
    }

    #[test]
    fn test_device_deserialize_missing_fields() {
        let device: Device = serde_json::from_str(r#"{"device_id": "AA:BB"}"#).unwrap();
        assert_eq!(device, Device::new("AA:BB"));
    }

    #[test]
    fn test_payload_requires_fields() {
        let missing_humidity = r#"{"device_id": "AA:BB", "temperature_c": 22.0}"#;
        assert!(serde_json::from_str::<ReadingPayload>(missing_humidity).is_err());
    }

    #[test]
    fn test_payload_validate() {
        let mut payload = ReadingPayload {
            device_id: "AA:BB".to_string(),
            temperature_c: 22.0,
            humidity_pct: 55.0,
            pressure_pa: Some(101_325.0),
            pm25: None,
        };
        assert!(payload.validate().is_ok());

        payload.pressure_pa = Some(f64::NAN);
        let err = payload.validate().unwrap_err();
        assert!(err.to_string().contains("pressure_pa"));

        payload.pressure_pa = None;
        payload.device_id = "   ".to_string();
        assert!(payload.validate().is_err());
    }
}
