//! In-process settings store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{CommunitySettings, Result, SettingsPatch, SettingsStore};
use crate::types::CommunityId;

/// Settings held in memory only. Used for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<HashMap<CommunityId, CommunitySettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a community's settings outright.
    pub fn insert(&self, community: CommunityId, settings: CommunitySettings) {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(community, settings);
    }

    fn read(&self, community: &CommunityId) -> CommunitySettings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(community)
            .cloned()
            .unwrap_or_default()
    }
}

impl SettingsStore for MemorySettingsStore {
    async fn get_settings(&self, community: &CommunityId) -> Result<CommunitySettings> {
        Ok(self.read(community))
    }

    async fn update_settings(&self, community: &CommunityId, patch: SettingsPatch) -> Result<()> {
        let mut settings = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        patch.apply(settings.entry(community.clone()).or_default());
        Ok(())
    }
}
