//! Collaborator traits for the platform the engine observes.
//!
//! The engine never talks to the network directly. It is constructed with
//! implementations of these traits, so tests can substitute in-memory doubles
//! and the production binary plugs in [`HttpPlatformClient`].
//!
//! [`HttpPlatformClient`]: super::HttpPlatformClient

use std::future::Future;

use serde::{Deserialize, Serialize};

use super::error::PlatformApiError;
use crate::notify::Notification;
use crate::types::{ChannelId, CommunityId, InviteInfo, VanityInvite};

/// Result type for platform calls.
pub type Result<T> = std::result::Result<T, PlatformApiError>;

/// A resolved text channel that notifications can be sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub community: CommunityId,
    pub name: Option<String>,
}

/// Read access to a community's invitations.
pub trait PlatformApi: Send + Sync {
    /// Lists every active invitation with its current use count.
    fn fetch_invites(
        &self,
        community: &CommunityId,
    ) -> impl Future<Output = Result<Vec<InviteInfo>>> + Send;

    /// Returns the community's vanity link, if it has one.
    fn fetch_vanity(
        &self,
        community: &CommunityId,
    ) -> impl Future<Output = Result<Option<VanityInvite>>> + Send;

    /// Lists the communities the bot account is currently a member of.
    fn list_communities(&self) -> impl Future<Output = Result<Vec<CommunityId>>> + Send;
}

/// Looks up notification channels.
pub trait ChannelResolver: Send + Sync {
    /// Resolves a channel id within a community.
    ///
    /// Returns `Ok(None)` when the channel no longer exists or belongs to a
    /// different community. Errors are reserved for failures to ask.
    fn resolve_channel(
        &self,
        community: &CommunityId,
        channel: &ChannelId,
    ) -> impl Future<Output = Result<Option<Channel>>> + Send;
}

/// Delivers notifications to a channel.
pub trait Notifier: Send + Sync {
    fn send(
        &self,
        channel: &Channel,
        notification: &Notification,
    ) -> impl Future<Output = Result<()>> + Send;
}
