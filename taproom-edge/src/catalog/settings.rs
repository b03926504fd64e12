//! Local settings record

use parking_lot::RwLock;
use shared::models::{Settings, SettingsUpdate};
use std::sync::Arc;

use crate::storage::{self, LocalStorage, Persist, StorageResult, keys};
use crate::utils::{AppError, AppResult};

pub struct SettingsStore {
    settings: RwLock<Settings>,
    persist: Arc<dyn Persist>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &*self.settings.read())
            .finish()
    }
}

impl SettingsStore {
    pub fn load(storage: &LocalStorage, persist: Arc<dyn Persist>) -> StorageResult<Self> {
        let settings: Settings = storage::load_collection(storage, keys::SETTINGS)?;
        Ok(Self {
            settings: RwLock::new(settings),
            persist,
        })
    }

    pub fn get(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn update(&self, update: SettingsUpdate) -> AppResult<Settings> {
        let mut settings = self.settings.write();
        let mut draft = settings.clone();
        if let Some(bar_name) = update.bar_name {
            draft.bar_name = bar_name;
        }
        if let Some(currency) = update.currency {
            draft.currency = currency;
        }
        if let Some(rate) = update.tax_rate_percent {
            if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
                let e = AppError::validation(format!("taxRatePercent must be within 0..=100, got {rate}"));
                tracing::warn!(error = %e, "Rejected settings update");
                return Err(e);
            }
            draft.tax_rate_percent = rate;
        }
        if let Some(auto_sync) = update.auto_sync {
            draft.auto_sync = auto_sync;
        }

        *settings = draft.clone();
        storage::persist_collection(self.persist.as_ref(), keys::SETTINGS, &*settings);
        tracing::info!(auto_sync = draft.auto_sync, "Settings updated");
        Ok(draft)
    }

    /// Bulk replace (backup restore)
    pub fn replace(&self, value: Settings) {
        let mut settings = self.settings.write();
        *settings = value;
        storage::persist_collection(self.persist.as_ref(), keys::SETTINGS, &*settings);
    }
}
