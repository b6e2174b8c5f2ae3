//! Dashboard settings: the single mutable configuration document.
//!
//! The document is persisted as one JSON row in the store and cached in
//! memory after the first [`SettingsStore::load`]. Every mutation runs under
//! one async mutex covering load, mutate and persist, so concurrent writers
//! never interleave. Lock order is settings cache first, then the store.
//!
//! If no document has ever been persisted, the first load seeds one from a
//! template file (or the bundled default when no template is configured).
//! Seeding uses a conditional insert, so even separate processes sharing the
//! database write the seed at most once.
//!
//! The `devices` list inside the document is a cache of the device registry
//! for display and backup. It is rebuilt from the registry by
//! [`SettingsStore::refresh_devices`] and cannot be set directly. Restored
//! entries for devices that have not reported yet stay in the list, after
//! the registered ones, until the device first checks in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use ht_store::{DeviceAttribute, Store};
use ht_types::{DataPeriod, Device};

/// Smallest accepted sync refresh rate, in seconds.
pub const MIN_REFRESH_RATE: u32 = 1;
/// Largest accepted sync refresh rate, in seconds.
pub const MAX_REFRESH_RATE: u32 = 1000;
/// Refresh rate used when a document does not specify one.
pub const DEFAULT_REFRESH_RATE: u32 = 120;

/// Template used when no template path is configured.
const DEFAULT_TEMPLATE: &str = include_str!("../assets/default_config.json");

/// The dashboard configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Selected display window.
    pub data_period: DataPeriod,
    /// Whether per-device calibration offsets are applied.
    #[serde(default)]
    pub compensate: bool,
    /// Expected seconds between device check-ins.
    #[serde(default = "default_refresh_rate", alias = "m_sync_refresh_rate")]
    pub sync_refresh_rate_seconds: u32,
    /// Cached copy of the device registry.
    #[serde(default)]
    pub devices: Vec<Device>,
    /// Keys this server does not interpret, kept so documents round-trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_refresh_rate() -> u32 {
    DEFAULT_REFRESH_RATE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_period: DataPeriod::default(),
            compensate: false,
            sync_refresh_rate_seconds: DEFAULT_REFRESH_RATE,
            devices: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}

/// What a single [`SettingsStore::set_and_persist`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOutcome {
    /// The value was stored.
    Applied,
    /// The value was out of bounds and silently dropped.
    Rejected,
    /// The key is not settable; nothing happened.
    Ignored,
}

impl Settings {
    /// Parse and validate a persisted document.
    pub fn from_document(document: Value) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_value(document)?;
        if !refresh_rate_in_bounds(i64::from(settings.sync_refresh_rate_seconds)) {
            return Err(SettingsError::Validation {
                key: "sync_refresh_rate_seconds".to_string(),
                message: format!(
                    "{} is outside [{}, {}]",
                    settings.sync_refresh_rate_seconds, MIN_REFRESH_RATE, MAX_REFRESH_RATE
                ),
            });
        }
        Ok(settings)
    }

    /// Serialize to the persisted document shape.
    pub fn to_document(&self) -> Result<Value, SettingsError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Window length of the selected preset, in hours.
    pub fn window_hours(&self) -> u32 {
        self.data_period.hours()
    }

    /// Apply one key/value edit in memory.
    ///
    /// Out-of-bounds refresh rates leave the value untouched and report
    /// [`SetOutcome::Rejected`]; unknown keys report [`SetOutcome::Ignored`].
    pub fn apply(&mut self, key: &str, value: &Value) -> Result<SetOutcome, SettingsError> {
        match key {
            "data_period" => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| invalid(key, format!("expected a preset key, got {}", value)))?;
                self.data_period = raw.parse().map_err(|e| invalid(key, e))?;
                Ok(SetOutcome::Applied)
            }
            "compensate" => {
                self.compensate = parse_bool(key, value)?;
                Ok(SetOutcome::Applied)
            }
            "sync_refresh_rate_seconds" | "m_sync_refresh_rate" => {
                let rate = parse_integer(key, value)?;
                if !refresh_rate_in_bounds(rate) {
                    debug!("Ignoring out-of-range refresh rate {}", rate);
                    return Ok(SetOutcome::Rejected);
                }
                self.sync_refresh_rate_seconds = rate as u32;
                Ok(SetOutcome::Applied)
            }
            _ => {
                debug!("Ignoring unknown settings key '{}'", key);
                Ok(SetOutcome::Ignored)
            }
        }
    }
}

fn refresh_rate_in_bounds(rate: i64) -> bool {
    (i64::from(MIN_REFRESH_RATE)..=i64::from(MAX_REFRESH_RATE)).contains(&rate)
}

fn invalid(key: &str, message: impl ToString) -> SettingsError {
    SettingsError::Validation {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Accepts JSON booleans and the strings HTML forms send.
fn parse_bool(key: &str, value: &Value) -> Result<bool, SettingsError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(true),
            "false" | "off" | "no" | "0" => Ok(false),
            other => Err(invalid(key, format!("'{}' is not a boolean", other))),
        },
        other => Err(invalid(key, format!("expected a boolean, got {}", other))),
    }
}

/// Accepts JSON integers and numeric strings.
fn parse_integer(key: &str, value: &Value) -> Result<i64, SettingsError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(key, format!("expected an integer, got {}", value)))
}

/// Settings errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A value was refused; nothing was changed.
    #[error("Invalid value for '{key}': {message}")]
    Validation { key: String, message: String },

    /// Nothing is persisted and the template could not be used.
    #[error("Dashboard is unconfigured: template {template} unusable: {reason}")]
    Bootstrap { template: String, reason: String },

    /// The persisted document no longer parses or validates.
    #[error("Dashboard is unconfigured: persisted settings unusable: {reason}")]
    Persisted { reason: String },

    /// The persisted or imported document is malformed.
    #[error("Malformed settings document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] ht_store::Error),
}

/// Owner of the process-wide settings document.
pub struct SettingsStore {
    store: Arc<Mutex<Store>>,
    template: Option<PathBuf>,
    cached: Mutex<Option<Settings>>,
}

impl SettingsStore {
    /// Create a settings store backed by `store`.
    ///
    /// `template` seeds the first document; `None` uses the bundled default.
    pub fn new(store: Arc<Mutex<Store>>, template: Option<PathBuf>) -> Self {
        Self {
            store,
            template,
            cached: Mutex::new(None),
        }
    }

    /// Current settings, loading or seeding them on first access.
    ///
    /// A failed bootstrap is not cached; the next call tries again.
    pub async fn load(&self) -> Result<Settings, SettingsError> {
        let mut cached = self.cached.lock().await;
        Ok(self.ensure_loaded(&mut cached).await?.clone())
    }

    /// Validate, apply and persist a single key.
    ///
    /// Memory is only updated after the document was written, so a failed
    /// write leaves the previous settings in place.
    pub async fn set_and_persist(
        &self,
        key: &str,
        value: &Value,
    ) -> Result<SetOutcome, SettingsError> {
        let mut cached = self.cached.lock().await;
        let current = self.ensure_loaded(&mut cached).await?;

        let mut next = current.clone();
        let outcome = next.apply(key, value)?;

        if outcome == SetOutcome::Applied {
            let document = next.to_document()?;
            self.store.lock().await.save_settings_document(&document)?;
            *current = next;
            info!("Updated setting '{}'", key);
        }

        Ok(outcome)
    }

    /// Window length of the selected preset, in hours.
    pub async fn current_window_hours(&self) -> Result<u32, SettingsError> {
        Ok(self.load().await?.window_hours())
    }

    /// Configured sync refresh rate, in seconds.
    pub async fn refresh_rate(&self) -> Result<u32, SettingsError> {
        Ok(self.load().await?.sync_refresh_rate_seconds)
    }

    /// Rebuild the cached device list from the registry.
    pub async fn refresh_devices(&self) -> Result<Vec<Device>, SettingsError> {
        let mut cached = self.cached.lock().await;
        let current = self.ensure_loaded(&mut cached).await?;

        let store = self.store.lock().await;
        if let Some(next) = refreshed_device_cache(&store, current)? {
            *current = next;
        }

        Ok(current.devices.clone())
    }

    /// Write the full settings document to `path` as pretty JSON.
    pub async fn export_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let settings = self.load().await?;
        let content = serde_json::to_string_pretty(&settings.to_document()?)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path, content).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!("Exported settings to {}", path.display());
        Ok(())
    }

    /// Replace the settings with a previously exported document.
    ///
    /// Nicknames and offsets in the file are written back to registered
    /// devices. Entries for devices the registry has never seen are staged
    /// and applied when the device first reports.
    pub async fn import_from_file(&self, path: &Path) -> Result<Settings, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let imported = Settings::from_document(serde_json::from_str(&content)?)?;

        let mut cached = self.cached.lock().await;
        let store = self.store.lock().await;

        store.clear_pending_devices()?;
        restore_device_metadata(&store, &imported.devices)?;
        store.save_settings_document(&imported.to_document()?)?;
        let settings = refreshed_device_cache(&store, &imported)?.unwrap_or(imported);

        *cached = Some(settings.clone());
        info!("Imported settings from {}", path.display());
        Ok(settings)
    }

    async fn ensure_loaded<'a>(
        &self,
        cached: &'a mut Option<Settings>,
    ) -> Result<&'a mut Settings, SettingsError> {
        let settings = match cached.take() {
            Some(settings) => settings,
            None => self.bootstrap().await?,
        };
        Ok(cached.insert(settings))
    }

    async fn bootstrap(&self) -> Result<Settings, SettingsError> {
        let store = self.store.lock().await;

        let settings = match store.load_settings_document()? {
            Some(document) => persisted(document)?,
            None => {
                let template = self.read_template()?;
                if store.seed_settings_document(&template.to_document()?)? {
                    restore_device_metadata(&store, &template.devices)?;
                    template
                } else {
                    // Seeded by another process between our read and insert.
                    match store.load_settings_document()? {
                        Some(document) => persisted(document)?,
                        None => template,
                    }
                }
            }
        };

        let settings = refreshed_device_cache(&store, &settings)?.unwrap_or(settings);
        info!(
            "Loaded settings: period={}, refresh rate={}s",
            settings.data_period.key(),
            settings.sync_refresh_rate_seconds
        );
        Ok(settings)
    }

    fn read_template(&self) -> Result<Settings, SettingsError> {
        let (source, content) = match &self.template {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| SettingsError::Bootstrap {
                        template: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                (path.display().to_string(), content)
            }
            None => ("(bundled)".to_string(), DEFAULT_TEMPLATE.to_string()),
        };

        serde_json::from_str(&content)
            .map_err(SettingsError::from)
            .and_then(Settings::from_document)
            .map_err(|e| SettingsError::Bootstrap {
                template: source,
                reason: e.to_string(),
            })
    }
}

/// A stored document that fails to load leaves the dashboard unconfigured.
fn persisted(document: Value) -> Result<Settings, SettingsError> {
    Settings::from_document(document).map_err(|e| SettingsError::Persisted {
        reason: e.to_string(),
    })
}

/// Returns updated settings if the registry differs from the cached list.
///
/// Registered devices come first, then staged entries for devices that have
/// not reported yet.
fn refreshed_device_cache(
    store: &Store,
    settings: &Settings,
) -> Result<Option<Settings>, SettingsError> {
    let mut devices: Vec<Device> = store
        .list_devices()?
        .iter()
        .map(|d| d.to_device())
        .collect();
    devices.extend(store.pending_devices()?);

    if devices == settings.devices {
        return Ok(None);
    }

    let mut next = settings.clone();
    next.devices = devices;
    store.save_settings_document(&next.to_document()?)?;
    debug!("Refreshed device cache ({} devices)", next.devices.len());
    Ok(Some(next))
}

fn restore_device_metadata(store: &Store, devices: &[Device]) -> Result<(), SettingsError> {
    for (position, device) in (0u32..).zip(devices) {
        if store.get_device(&device.device_id)?.is_none() {
            store.stage_device_metadata(device, position)?;
            continue;
        }
        store.set_device_attribute(
            &device.device_id,
            DeviceAttribute::Nickname(device.nickname.clone()),
        )?;
        store.set_device_attribute(&device.device_id, DeviceAttribute::TempComp(device.temp_comp))?;
        store.set_device_attribute(&device.device_id, DeviceAttribute::HumComp(device.hum_comp))?;
    }
    Ok(())
}
