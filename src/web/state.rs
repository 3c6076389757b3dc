use crate::config::SettingsStore;
use crate::process::Supervisor;

/// Shared handles passed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Supervisor,
    pub settings: SettingsStore,
}

impl AppState {
    pub fn new(supervisor: Supervisor, settings: SettingsStore) -> Self {
        Self {
            supervisor,
            settings,
        }
    }
}
