//! Local persistence for ht-monitor.
//!
//! This crate provides SQLite-based storage for:
//!
//! - Sensor measurements, append-only and stamped with server time
//! - The device registry (nicknames and calibration offsets)
//! - The single dashboard settings document
//!
//! # Example
//!
//! ```no_run
//! use ht_store::{NewMeasurement, Store};
//!
//! let store = Store::open_default()?;
//!
//! store.upsert_on_first_seen("AA:BB:CC:DD:EE:FF")?;
//! store.insert_measurement(&NewMeasurement {
//!     device_id: "AA:BB:CC:DD:EE:FF".to_string(),
//!     temperature_c: 21.5,
//!     humidity_pct: 48.0,
//!     pressure_hpa: None,
//!     pm25: None,
//! })?;
//!
//! let last_twelve_hours = store.query_range("AA:BB:CC:DD:EE:FF", 12)?;
//! # Ok::<(), ht_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{DeviceAttribute, FirstSeen, NewMeasurement, StoredDevice, StoredMeasurement};
pub use queries::MeasurementQuery;
pub use store::{LIVENESS_THRESHOLD, Store, format_size};

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/ht-monitor/data.db`
/// - macOS: `~/Library/Application Support/ht-monitor/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\ht-monitor\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("ht-monitor")
        .join("data.db")
}
