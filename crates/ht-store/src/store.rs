//! Main store implementation.

use std::io::Write;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use ht_types::Device;

use crate::error::{Error, Result};
use crate::models::{DeviceAttribute, FirstSeen, NewMeasurement, StoredDevice, StoredMeasurement};
use crate::queries::MeasurementQuery;
use crate::schema;

/// A device whose newest reading is older than this is considered offline.
pub const LIVENESS_THRESHOLD: Duration = Duration::seconds(120);

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// SQLite-based store for measurements, devices and the settings document.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

/// Unix time in milliseconds, the resolution of `captured_at`.
pub(crate) fn unix_millis(time: OffsetDateTime) -> i64 {
    (time.unix_timestamp_nanos() / 1_000_000) as i64
}

fn column_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let millis: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<StoredDevice> {
    Ok(StoredDevice {
        device_id: row.get(0)?,
        nickname: row.get(1)?,
        temp_comp: row.get(2)?,
        hum_comp: row.get(3)?,
        first_seen: column_time(row, 4)?,
    })
}

fn measurement_from_row(row: &Row<'_>) -> rusqlite::Result<StoredMeasurement> {
    Ok(StoredMeasurement {
        id: row.get(0)?,
        device_id: row.get(1)?,
        captured_at: column_time(row, 2)?,
        temperature_c: row.get(3)?,
        humidity_pct: row.get(4)?,
        pressure_hpa: row.get(5)?,
        pm25: row.get(6)?,
    })
}

// Device registry
impl Store {
    /// Register `device_id` if it has never been seen, otherwise return it unchanged.
    ///
    /// Creation is a single conditional insert against the primary key, so
    /// concurrent callers racing on the same new identifier produce exactly
    /// one row and exactly one `created == true`.
    pub fn upsert_on_first_seen(&self, device_id: &str) -> Result<FirstSeen> {
        let now = unix_millis(OffsetDateTime::now_utc());

        // Metadata staged by a settings restore is applied in the same statement.
        let inserted = self.conn.execute(
            "INSERT INTO devices (id, nickname, temp_comp, hum_comp, first_seen)
             SELECT ?1, COALESCE(p.nickname, ''), COALESCE(p.temp_comp, 0),
                    COALESCE(p.hum_comp, 0), ?2
             FROM (SELECT 1) LEFT JOIN pending_devices p ON p.id = ?1
             WHERE true
             ON CONFLICT(id) DO NOTHING",
            rusqlite::params![device_id, now],
        )?;

        if inserted == 1 {
            self.conn
                .execute("DELETE FROM pending_devices WHERE id = ?1", [device_id])?;
        }

        let device = self
            .get_device(device_id)?
            .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))?;

        if inserted == 1 {
            info!("Registered new device {}", device_id);
        }

        Ok(FirstSeen {
            device,
            created: inserted == 1,
        })
    }

    /// Update a nickname or calibration offset.
    ///
    /// Returns [`Error::DeviceNotFound`] if the device was never registered.
    pub fn set_device_attribute(&self, device_id: &str, attribute: DeviceAttribute) -> Result<()> {
        let sql = format!("UPDATE devices SET {} = ?2 WHERE id = ?1", attribute.column());

        let updated = match &attribute {
            DeviceAttribute::Nickname(nickname) => {
                self.conn.execute(&sql, rusqlite::params![device_id, nickname])?
            }
            DeviceAttribute::TempComp(value) | DeviceAttribute::HumComp(value) => {
                self.conn.execute(&sql, rusqlite::params![device_id, value])?
            }
        };

        if updated == 0 {
            return Err(Error::DeviceNotFound(device_id.to_string()));
        }

        debug!("Updated {} for {}", attribute.column(), device_id);
        Ok(())
    }

    /// Get a device by ID.
    pub fn get_device(&self, device_id: &str) -> Result<Option<StoredDevice>> {
        let device = self
            .conn
            .query_row(
                "SELECT id, nickname, temp_comp, hum_comp, first_seen FROM devices WHERE id = ?",
                [device_id],
                device_from_row,
            )
            .optional()?;

        Ok(device)
    }

    /// List all devices in registration order.
    pub fn list_devices(&self) -> Result<Vec<StoredDevice>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, nickname, temp_comp, hum_comp, first_seen
             FROM devices ORDER BY first_seen, id",
        )?;

        let devices = stmt
            .query_map([], device_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(devices)
    }

    /// Remember metadata for a device that has not reported yet.
    ///
    /// It is applied when [`upsert_on_first_seen`](Self::upsert_on_first_seen)
    /// creates the device. `position` orders pending entries in
    /// [`pending_devices`](Self::pending_devices).
    pub fn stage_device_metadata(&self, device: &Device, position: u32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO pending_devices (id, nickname, temp_comp, hum_comp, position)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                nickname = excluded.nickname,
                temp_comp = excluded.temp_comp,
                hum_comp = excluded.hum_comp,
                position = excluded.position",
            rusqlite::params![
                device.device_id,
                device.nickname,
                device.temp_comp,
                device.hum_comp,
                position
            ],
        )?;

        debug!("Staged metadata for unregistered device {}", device.device_id);
        Ok(())
    }

    /// Staged metadata for devices that have not reported yet.
    pub fn pending_devices(&self) -> Result<Vec<Device>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, nickname, temp_comp, hum_comp FROM pending_devices
             WHERE id NOT IN (SELECT id FROM devices)
             ORDER BY position, id",
        )?;

        let devices = stmt
            .query_map([], |row| {
                Ok(Device {
                    device_id: row.get(0)?,
                    nickname: row.get(1)?,
                    temp_comp: row.get(2)?,
                    hum_comp: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(devices)
    }

    /// Drop all staged metadata.
    pub fn clear_pending_devices(&self) -> Result<()> {
        self.conn.execute("DELETE FROM pending_devices", [])?;
        Ok(())
    }
}

// Measurement operations
impl Store {
    /// Append a reading stamped with the current server time.
    pub fn insert_measurement(&self, measurement: &NewMeasurement) -> Result<i64> {
        self.insert_measurement_at(measurement, OffsetDateTime::now_utc())
    }

    /// Append a reading with an explicit capture time.
    ///
    /// Ingestion never uses this; device clocks are not trusted. It exists
    /// for restoring dumps and for building fixtures.
    pub fn insert_measurement_at(
        &self,
        measurement: &NewMeasurement,
        captured_at: OffsetDateTime,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO measurements (device_id, captured_at, temperature_c, humidity_pct,
             pressure_hpa, pm25)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                measurement.device_id,
                unix_millis(captured_at),
                measurement.temperature_c,
                measurement.humidity_pct,
                measurement.pressure_hpa,
                measurement.pm25,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Query measurements with filters.
    pub fn query_measurements(&self, query: &MeasurementQuery) -> Result<Vec<StoredMeasurement>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let measurements = stmt
            .query_map(params_ref.as_slice(), measurement_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(measurements)
    }

    /// Measurements for `device_id` from the last `window_hours`, oldest first.
    ///
    /// A window reaching past the earliest representable time covers the
    /// whole history.
    pub fn query_range(
        &self,
        device_id: &str,
        window_hours: u32,
    ) -> Result<Vec<StoredMeasurement>> {
        let mut query = MeasurementQuery::new().device(device_id).oldest_first();
        if let Some(since) =
            OffsetDateTime::now_utc().checked_sub(Duration::hours(i64::from(window_hours)))
        {
            query = query.since(since);
        }
        self.query_measurements(&query)
    }

    /// The newest reading if the device is online.
    ///
    /// Returns `None` when the device has no readings or its newest reading
    /// is older than [`LIVENESS_THRESHOLD`].
    pub fn latest(&self, device_id: &str) -> Result<Option<StoredMeasurement>> {
        self.latest_within(device_id, LIVENESS_THRESHOLD)
    }

    /// The newest reading if it is no older than `max_age`.
    pub fn latest_within(
        &self,
        device_id: &str,
        max_age: Duration,
    ) -> Result<Option<StoredMeasurement>> {
        let cutoff = OffsetDateTime::now_utc() - max_age;
        Ok(self
            .latest_any(device_id)?
            .filter(|m| m.captured_at >= cutoff))
    }

    /// The newest reading regardless of age.
    pub fn latest_any(&self, device_id: &str) -> Result<Option<StoredMeasurement>> {
        let query = MeasurementQuery::new().device(device_id).limit(1);
        let mut measurements = self.query_measurements(&query)?;
        Ok(measurements.pop())
    }

    /// Count measurements, optionally for one device.
    pub fn count_measurements(&self, device_id: Option<&str>) -> Result<u64> {
        let count: i64 = match device_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM measurements WHERE device_id = ?",
                [id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM measurements", [], |row| row.get(0))?,
        };

        Ok(count as u64)
    }

    /// Write measurements as CSV, oldest first. Returns the number of rows.
    pub fn export_measurements_csv<W: Write>(
        &self,
        device_id: Option<&str>,
        writer: W,
    ) -> Result<usize> {
        let mut query = MeasurementQuery::new().oldest_first();
        if let Some(id) = device_id {
            query = query.device(id);
        }
        let measurements = self.query_measurements(&query)?;

        let mut csv = csv::Writer::from_writer(writer);
        for measurement in &measurements {
            csv.serialize(measurement)?;
        }
        csv.flush()?;

        Ok(measurements.len())
    }
}

// Diagnostics
impl Store {
    /// Size of the database file in bytes.
    pub fn size_bytes(&self) -> Result<u64> {
        let page_count: i64 = self
            .conn
            .pragma_query_value(None, "page_count", |row| row.get(0))?;
        let page_size: i64 = self
            .conn
            .pragma_query_value(None, "page_size", |row| row.get(0))?;
        Ok((page_count * page_size) as u64)
    }

    /// Human-readable database size, e.g. `"4.1 Mb"`.
    pub fn size_estimate(&self) -> Result<String> {
        Ok(format_size(self.size_bytes()?))
    }
}

/// Format a byte count with decimal units.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1_000;
    const MB: u64 = 1_000_000;
    const GB: u64 = 1_000_000_000;

    if bytes > GB {
        format!("{:.1} Gb", bytes as f64 / GB as f64)
    } else if bytes > MB {
        format!("{:.1} Mb", bytes as f64 / MB as f64)
    } else if bytes > KB {
        format!("{:.1} kb", bytes as f64 / KB as f64)
    } else {
        format!("{} b", bytes)
    }
}

// Settings document
impl Store {
    /// Read the persisted settings document, if one was ever written.
    pub fn load_settings_document(&self) -> Result<Option<serde_json::Value>> {
        let document: Option<String> = self
            .conn
            .query_row("SELECT document FROM settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        document
            .map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(Error::from)
    }

    /// Write `document` only if no settings row exists yet.
    ///
    /// Returns true if this call seeded the row.
    pub fn seed_settings_document(&self, document: &serde_json::Value) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO settings (id, document, updated_at) VALUES (1, ?1, ?2)",
            rusqlite::params![
                serde_json::to_string(document)?,
                unix_millis(OffsetDateTime::now_utc())
            ],
        )?;

        if inserted == 1 {
            info!("Seeded settings document");
        }
        Ok(inserted == 1)
    }

    /// Replace the settings document.
    pub fn save_settings_document(&self, document: &serde_json::Value) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (id, document, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at",
            rusqlite::params![
                serde_json::to_string(document)?,
                unix_millis(OffsetDateTime::now_utc())
            ],
        )?;

        debug!("Persisted settings document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(device_id: &str, temperature_c: f64) -> NewMeasurement {
        NewMeasurement {
            device_id: device_id.to_string(),
            temperature_c,
            humidity_pct: 50.0,
            pressure_hpa: None,
            pm25: None,
        }
    }

    fn store_with_device(device_id: &str) -> Store {
        let store = Store::open_in_memory().unwrap();
        store.upsert_on_first_seen(device_id).unwrap();
        store
    }

    #[test]
    fn test_open_in_memory() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.list_devices().unwrap().is_empty());
        assert_eq!(store.count_measurements(None).unwrap(), 0);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.db");

        let store = Store::open(&path).unwrap();
        store.upsert_on_first_seen("AA:BB").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_upsert_on_first_seen_creates_once() {
        let store = Store::open_in_memory().unwrap();

        let first = store.upsert_on_first_seen("AA:BB").unwrap();
        assert!(first.created);
        assert_eq!(first.device.nickname, "");
        assert_eq!(first.device.temp_comp, 0.0);
        assert_eq!(first.device.hum_comp, 0.0);

        store
            .set_device_attribute("AA:BB", DeviceAttribute::Nickname("Attic".to_string()))
            .unwrap();

        let second = store.upsert_on_first_seen("AA:BB").unwrap();
        assert!(!second.created);
        assert_eq!(second.device.nickname, "Attic");
        assert_eq!(store.list_devices().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_on_first_seen_concurrent_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        Store::open(&path).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = Store::open(&path).unwrap();
                    store.upsert_on_first_seen("AA:BB").unwrap().created
                })
            })
            .collect();

        let created: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(created.iter().filter(|c| **c).count(), 1);

        let store = Store::open(&path).unwrap();
        assert_eq!(store.list_devices().unwrap().len(), 1);
    }

    #[test]
    fn test_set_device_attribute() {
        let store = store_with_device("AA:BB");

        store
            .set_device_attribute("AA:BB", DeviceAttribute::TempComp(1.5))
            .unwrap();
        store
            .set_device_attribute("AA:BB", DeviceAttribute::HumComp(-2.0))
            .unwrap();

        let device = store.get_device("AA:BB").unwrap().unwrap();
        assert_eq!(device.temp_comp, 1.5);
        assert_eq!(device.hum_comp, -2.0);
    }

    #[test]
    fn test_set_device_attribute_unknown_device() {
        let store = Store::open_in_memory().unwrap();
        let result = store.set_device_attribute("nope", DeviceAttribute::TempComp(1.0));
        assert!(matches!(result, Err(Error::DeviceNotFound(id)) if id == "nope"));
    }

    #[test]
    fn test_insert_requires_registered_device() {
        let store = Store::open_in_memory().unwrap();
        let result = store.insert_measurement(&reading("unregistered", 20.0));
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[test]
    fn test_insert_never_overwrites() {
        let store = store_with_device("AA:BB");

        let a = store.insert_measurement(&reading("AA:BB", 20.0)).unwrap();
        let b = store.insert_measurement(&reading("AA:BB", 20.0)).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count_measurements(Some("AA:BB")).unwrap(), 2);
    }

    #[test]
    fn test_query_range_window_and_order() {
        let store = store_with_device("AA:BB");
        store.upsert_on_first_seen("CC:DD").unwrap();
        let now = OffsetDateTime::now_utc();

        store
            .insert_measurement_at(&reading("AA:BB", 10.0), now - Duration::hours(3))
            .unwrap();
        store
            .insert_measurement_at(&reading("AA:BB", 11.0), now - Duration::minutes(50))
            .unwrap();
        store
            .insert_measurement_at(&reading("AA:BB", 12.0), now - Duration::minutes(5))
            .unwrap();
        store
            .insert_measurement_at(&reading("CC:DD", 99.0), now - Duration::minutes(5))
            .unwrap();

        let last_hour = store.query_range("AA:BB", 1).unwrap();
        let temps: Vec<f64> = last_hour.iter().map(|m| m.temperature_c).collect();
        assert_eq!(temps, vec![11.0, 12.0]);

        let last_day = store.query_range("AA:BB", 24).unwrap();
        assert_eq!(last_day.len(), 3);
        assert!(
            last_day
                .windows(2)
                .all(|w| w[0].captured_at <= w[1].captured_at)
        );
        assert!(last_day.iter().all(|m| m.device_id == "AA:BB"));

        assert!(store.query_range("EE:FF", 24).unwrap().is_empty());
    }

    #[test]
    fn test_query_range_extreme_windows() {
        let store = store_with_device("AA:BB");
        let now = OffsetDateTime::now_utc();
        store
            .insert_measurement_at(&reading("AA:BB", 10.0), now - Duration::days(400))
            .unwrap();
        store
            .insert_measurement_at(&reading("AA:BB", 11.0), now - Duration::minutes(1))
            .unwrap();

        assert!(store.query_range("AA:BB", 0).unwrap().is_empty());

        let everything = store.query_range("AA:BB", u32::MAX).unwrap();
        let temps: Vec<f64> = everything.iter().map(|m| m.temperature_c).collect();
        assert_eq!(temps, vec![10.0, 11.0]);

        assert_eq!(store.query_range("AA:BB", 200_000_000).unwrap().len(), 2);
    }

    #[test]
    fn test_staged_metadata_applied_on_first_seen() {
        let store = store_with_device("AA:BB");
        let staged = Device {
            nickname: "Cellar".to_string(),
            temp_comp: 1.5,
            hum_comp: -4.0,
            ..Device::new("CC:DD")
        };
        store.stage_device_metadata(&staged, 0).unwrap();
        store.stage_device_metadata(&Device::new("AA:BB"), 1).unwrap();

        // Registered devices never show up as pending.
        assert_eq!(store.pending_devices().unwrap(), vec![staged.clone()]);

        let first = store.upsert_on_first_seen("CC:DD").unwrap();
        assert!(first.created);
        assert_eq!(first.device.to_device(), staged);
        assert!(store.pending_devices().unwrap().is_empty());

        store.stage_device_metadata(&staged, 0).unwrap();
        let again = store.upsert_on_first_seen("CC:DD").unwrap();
        assert!(!again.created);
        assert_eq!(again.device.nickname, "Cellar");

        store.clear_pending_devices().unwrap();
        let plain = store.upsert_on_first_seen("EE:FF").unwrap();
        assert_eq!(plain.device.to_device(), Device::new("EE:FF"));
    }

    #[test]
    fn test_optional_fields_roundtrip() {
        let store = store_with_device("AA:BB");
        let mut with_pressure = reading("AA:BB", 21.0);
        with_pressure.pressure_hpa = Some(1013.25);
        with_pressure.pm25 = Some(7.0);
        store.insert_measurement(&with_pressure).unwrap();
        store.insert_measurement(&reading("AA:BB", 21.5)).unwrap();

        let stored = store.query_range("AA:BB", 1).unwrap();
        assert_eq!(stored[0].pressure_hpa, Some(1013.25));
        assert_eq!(stored[0].pm25, Some(7.0));
        assert_eq!(stored[1].pressure_hpa, None);
        assert_eq!(stored[1].pm25, None);
    }

    #[test]
    fn test_latest_respects_liveness() {
        let store = store_with_device("AA:BB");
        let now = OffsetDateTime::now_utc();

        assert!(store.latest("AA:BB").unwrap().is_none());

        store
            .insert_measurement_at(&reading("AA:BB", 19.0), now - Duration::minutes(10))
            .unwrap();
        assert!(store.latest("AA:BB").unwrap().is_none());
        assert_eq!(
            store.latest_any("AA:BB").unwrap().unwrap().temperature_c,
            19.0
        );

        store.insert_measurement(&reading("AA:BB", 22.0)).unwrap();
        let latest = store.latest("AA:BB").unwrap().unwrap();
        assert_eq!(latest.temperature_c, 22.0);
    }

    #[test]
    fn test_export_csv() {
        let store = store_with_device("AA:BB");
        let mut first = reading("AA:BB", 20.0);
        first.pressure_hpa = Some(1000.0);
        store.insert_measurement(&first).unwrap();
        store.insert_measurement(&reading("AA:BB", 21.0)).unwrap();

        let mut out = Vec::new();
        let rows = store.export_measurements_csv(Some("AA:BB"), &mut out).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,device_id,captured_at,temperature_c"));
        assert!(lines[1].contains("1000"));
        assert!(lines[2].ends_with(",,"));
    }

    #[test]
    fn test_size_estimate() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.size_bytes().unwrap() > 0);
        assert!(store.size_estimate().unwrap().ends_with('b'));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 b");
        assert_eq!(format_size(4_096), "4.1 kb");
        assert_eq!(format_size(2_500_000), "2.5 Mb");
        assert_eq!(format_size(3_000_000_001), "3.0 Gb");
    }

    #[test]
    fn test_settings_document_seed_once() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.load_settings_document().unwrap().is_none());

        let first = serde_json::json!({"data_period": "last_day"});
        let second = serde_json::json!({"data_period": "last_week"});

        assert!(store.seed_settings_document(&first).unwrap());
        assert!(!store.seed_settings_document(&second).unwrap());
        assert_eq!(store.load_settings_document().unwrap(), Some(first));

        store.save_settings_document(&second).unwrap();
        assert_eq!(store.load_settings_document().unwrap(), Some(second));
    }
}
