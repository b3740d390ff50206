//! Settings persisted in a single JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::{CommunitySettings, Result, SettingsPatch, SettingsStore};
use crate::persistence::{try_read_json, write_json_atomic};
use crate::types::CommunityId;

/// Settings for every community, stored at `<state_dir>/settings.json`.
///
/// The whole file is rewritten atomically on each update.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    settings: Mutex<BTreeMap<CommunityId, CommunitySettings>>,
}

impl FileSettingsStore {
    /// Loads settings from `path`; a missing file means no settings yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings: BTreeMap<CommunityId, CommunitySettings> =
            try_read_json(&path)?.unwrap_or_default();
        debug!(path = %path.display(), communities = settings.len(), "Loaded settings");

        Ok(FileSettingsStore {
            path,
            settings: Mutex::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    async fn get_settings(&self, community: &CommunityId) -> Result<CommunitySettings> {
        Ok(self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(community)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_settings(&self, community: &CommunityId, patch: SettingsPatch) -> Result<()> {
        let mut settings = self.settings.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = settings.clone();
        patch.apply(next.entry(community.clone()).or_default());
        write_json_atomic(&self.path, &next)?;

        *settings = next;
        Ok(())
    }
}
