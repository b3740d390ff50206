//! Join/leave notifications.
//!
//! A community opts in by setting `notify_channel_id`. Delivery is best
//! effort: failures are logged and the event is otherwise unaffected. A
//! configured channel that no longer resolves is cleared from settings so
//! later events stop trying it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

mod format;
mod message;

pub use format::{UNKNOWN, format_duration, plural};
pub use message::{
    FAKE_LEAVE_COLOR, JOIN_COLOR, JoinDetails, LEAVE_COLOR, LeaveDetails, Notification,
    NotificationField,
};

use crate::platform::{ChannelResolver, Notifier, PlatformApiError};
use crate::settings::{SettingsError, SettingsPatch, SettingsStore};
use crate::types::CommunityId;

/// Errors that can occur delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to read or update settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformApiError),
}

/// Result type for notification delivery.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// What happened to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The community has no notification channel configured.
    NotConfigured,
    /// The configured channel no longer resolves and was cleared.
    ChannelCleared,
}

/// Routes notifications to each community's configured channel.
pub struct LifecycleNotifier<S, R, N> {
    settings: Arc<S>,
    channels: Arc<R>,
    notifier: Arc<N>,
}

impl<S, R, N> Clone for LifecycleNotifier<S, R, N> {
    fn clone(&self) -> Self {
        LifecycleNotifier {
            settings: Arc::clone(&self.settings),
            channels: Arc::clone(&self.channels),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<S, R, N> LifecycleNotifier<S, R, N>
where
    S: SettingsStore,
    R: ChannelResolver,
    N: Notifier,
{
    pub fn new(settings: Arc<S>, channels: Arc<R>, notifier: Arc<N>) -> Self {
        LifecycleNotifier {
            settings,
            channels,
            notifier,
        }
    }

    pub fn settings(&self) -> &Arc<S> {
        &self.settings
    }

    /// Delivers a notification, logging instead of returning failures.
    pub async fn notify(&self, community: &CommunityId, notification: &Notification) {
        match self.try_notify(community, notification).await {
            Ok(Delivery::Sent) => {
                debug!(community = %community, title = %notification.title, "Sent notification")
            }
            Ok(_) => {}
            Err(e) => warn!(
                community = %community,
                title = %notification.title,
                error = %e,
                "Failed to deliver notification"
            ),
        }
    }

    /// Delivers a notification to the community's configured channel.
    pub async fn try_notify(
        &self,
        community: &CommunityId,
        notification: &Notification,
    ) -> Result<Delivery> {
        let settings = self.settings.get_settings(community).await?;
        let Some(channel_id) = settings.notify_channel_id else {
            return Ok(Delivery::NotConfigured);
        };

        let Some(channel) = self.channels.resolve_channel(community, &channel_id).await? else {
            info!(
                community = %community,
                channel = %channel_id,
                "Notification channel no longer exists; clearing it"
            );
            self.settings
                .update_settings(community, SettingsPatch::clear_notify_channel())
                .await?;
            return Ok(Delivery::ChannelCleared);
        };

        self.notifier.send(&channel, notification).await?;
        Ok(Delivery::Sent)
    }
}
