//! Unit conversion and per-device calibration.
//!
//! Raw readings are stored exactly as received (Celsius, percent). Display
//! values are derived on the way out: temperature is shown in Fahrenheit and,
//! when compensation is enabled, each device's additive offsets are applied.
//!
//! ```
//! use ht_types::{Compensation, Device};
//!
//! let device = Device { temp_comp: 1.5, ..Device::new("AA:BB") };
//! let comp = Compensation::for_device(&device, true);
//! assert!((comp.temperature_f(22.0) - 73.1).abs() < 1e-9);
//! ```

use crate::types::Device;

/// Convert degrees Celsius to degrees Fahrenheit.
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert pascal to hectopascal.
#[must_use]
pub fn pa_to_hpa(pa: f64) -> f64 {
    pa / 100.0
}

/// Offsets applied to a single device's series.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Compensation {
    /// Whether the offsets are applied at all.
    pub enabled: bool,
    /// Added to the Fahrenheit temperature.
    pub temp_comp: f64,
    /// Added to the relative humidity.
    pub hum_comp: f64,
}

impl Compensation {
    /// Build the compensation for `device` under the global toggle.
    pub fn for_device(device: &Device, enabled: bool) -> Self {
        Self {
            enabled,
            temp_comp: device.temp_comp,
            hum_comp: device.hum_comp,
        }
    }

    /// Display temperature in Fahrenheit.
    #[must_use]
    pub fn temperature_f(&self, raw_celsius: f64) -> f64 {
        let offset = if self.enabled { self.temp_comp } else { 0.0 };
        celsius_to_fahrenheit(raw_celsius) + offset
    }

    /// Display relative humidity in percent.
    #[must_use]
    pub fn humidity(&self, raw_pct: f64) -> f64 {
        let offset = if self.enabled { self.hum_comp } else { 0.0 };
        raw_pct + offset
    }
}
