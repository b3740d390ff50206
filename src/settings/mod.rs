//! Per-community settings collaborator.
//!
//! The engine reads one setting, `notify_channel_id`, and writes it only to
//! clear a channel that no longer resolves. Other keys written by the
//! surrounding application are carried through untouched.

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::PersistenceError;
use crate::types::{ChannelId, CommunityId};

mod file;
mod memory;

pub use file::FileSettingsStore;
pub use memory::MemorySettingsStore;

/// Errors that can occur reading or writing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("settings backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Settings for one community.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunitySettings {
    /// Channel that receives join/leave notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_channel_id: Option<ChannelId>,

    /// Keys owned by other parts of the application.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A partial update. `None` leaves a field alone; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub notify_channel_id: Option<Option<ChannelId>>,
}

impl SettingsPatch {
    pub fn set_notify_channel(channel: ChannelId) -> Self {
        SettingsPatch {
            notify_channel_id: Some(Some(channel)),
        }
    }

    pub fn clear_notify_channel() -> Self {
        SettingsPatch {
            notify_channel_id: Some(None),
        }
    }

    pub fn apply(&self, settings: &mut CommunitySettings) {
        if let Some(channel) = &self.notify_channel_id {
            settings.notify_channel_id = channel.clone();
        }
    }
}

/// Key/value settings storage.
pub trait SettingsStore: Send + Sync {
    /// Returns the community's settings; unknown communities get defaults.
    fn get_settings(
        &self,
        community: &CommunityId,
    ) -> impl Future<Output = Result<CommunitySettings>> + Send;

    fn update_settings(
        &self,
        community: &CommunityId,
        patch: SettingsPatch,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_changes_nothing() {
        let mut settings = CommunitySettings {
            notify_channel_id: Some(ChannelId::new("1")),
            ..Default::default()
        };
        SettingsPatch::default().apply(&mut settings);
        assert_eq!(settings.notify_channel_id, Some(ChannelId::new("1")));
    }

    #[test]
    fn clear_patch_removes_channel() {
        let mut settings = CommunitySettings {
            notify_channel_id: Some(ChannelId::new("1")),
            ..Default::default()
        };
        SettingsPatch::clear_notify_channel().apply(&mut settings);
        assert!(settings.notify_channel_id.is_none());
    }

    #[test]
    fn unknown_keys_round_trip() {
        let json = serde_json::json!({
            "notify_channel_id": "55",
            "welcome_message": "hi",
            "ticket_category": 9
        });
        let settings: CommunitySettings = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(settings.notify_channel_id, Some(ChannelId::new("55")));
        assert_eq!(settings.extra.len(), 2);
        assert_eq!(serde_json::to_value(&settings).unwrap(), json);
    }
}
