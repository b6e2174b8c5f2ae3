//! Application state shared across handlers.

use std::sync::Arc;

use ht_store::Store;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::settings::SettingsStore;
use crate::sync::SyncTimer;

/// Shared application state.
///
/// The store is shared with the settings store; when both are needed the
/// settings lock is always taken first.
pub struct AppState {
    /// The data store (wrapped in Mutex for thread-safe access).
    pub store: Arc<Mutex<Store>>,
    /// Dashboard settings document.
    pub settings: SettingsStore,
    /// Device sync countdown.
    pub sync: SyncTimer,
    /// Static server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        let store = Arc::new(Mutex::new(store));
        let settings = SettingsStore::new(Arc::clone(&store), config.settings.template.clone());
        Arc::new(Self {
            store,
            settings,
            sync: SyncTimer::new(),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_shares_store_with_settings() {
        let state = AppState::new(Store::open_in_memory().unwrap(), Config::default());

        state.settings.load().await.unwrap();
        let persisted = state.store.lock().await.load_settings_document().unwrap();
        assert!(persisted.is_some());
    }
}
