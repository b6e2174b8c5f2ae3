//! Ingestion server and dashboard API for ht-monitor sensors.
//!
//! This crate provides a service that:
//! - Accepts temperature/humidity readings posted by sensor boards
//! - Registers devices the first time they report
//! - Tells devices when to post next through a shared sync countdown
//! - Serves dashboard series, device management and settings over JSON
//!
//! # Sensor Endpoints
//!
//! - `POST /data` - Submit a reading (`mac`, `temp`, `hum` accepted)
//! - `GET /next` - Plain text `sync_time N`
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Database size, counts and sync state
//! - `GET /api/dashboard` - Calibrated series for the selected window
//! - `GET /api/devices` - List all known devices
//! - `GET|PUT /api/devices/:id` - Get or edit a device
//! - `GET /api/devices/:id/current` - Latest reading if the device is online
//! - `GET /api/devices/:id/readings?hours=N` - Readings in a window
//! - `GET /api/devices/:id/export` - CSV download
//! - `GET|PUT /api/config` - Dashboard settings
//! - `POST /api/config/export`, `POST /api/config/import` - Settings backup to the configured file
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/ht-monitor/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5000"
//!
//! [storage]
//! path = "~/.local/share/ht-monitor/data.db"
//!
//! [settings]
//! template = "/etc/ht-monitor/default_config.json"
//! backup = "~/.config/ht-monitor/config_backup.json"
//! ```

pub mod api;
pub mod config;
pub mod dashboard;
pub mod settings;
pub mod state;
pub mod sync;

pub use config::{Config, ConfigError, ServerConfig, SettingsConfig, StorageConfig};
pub use settings::{SetOutcome, Settings, SettingsError, SettingsStore};
pub use state::AppState;
pub use sync::{SyncCountdown, SyncTimer};
