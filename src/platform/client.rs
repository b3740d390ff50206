//! REST client for the platform's bot API.
//!
//! `HttpPlatformClient` implements every collaborator trait the engine needs
//! ([`PlatformApi`], [`ChannelResolver`], [`Notifier`]) over a single
//! bot-token authenticated `reqwest::Client`.

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::api::{Channel, ChannelResolver, Notifier, PlatformApi, Result};
use super::error::PlatformApiError;
use crate::notify::Notification;
use crate::types::{ChannelId, CommunityId, InviteCode, InviteInfo, Inviter, UserId, VanityInvite};

/// Largest page `users/@me/guilds` returns.
pub const GUILDS_PAGE_LIMIT: usize = 200;

/// A platform API client authenticated as a bot account.
#[derive(Clone)]
pub struct HttpPlatformClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPlatformClient {
    /// Creates a client that sends `Authorization: Bot <token>` on every request.
    pub fn from_token(base_url: impl Into<String>, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {}", token)).map_err(|_| {
            PlatformApiError::permanent_without_source("bot token contains invalid characters")
        })?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("invite-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::from_client(http, base_url))
    }

    /// Wraps a pre-configured reqwest client.
    pub fn from_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpPlatformClient { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        trace!(path, "GET");
        let response = self.http.get(self.url(path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformApiError::from_status(status.as_u16(), body));
        }
        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for HttpPlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPlatformClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Raw response structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInvite {
    code: String,
    #[serde(default)]
    uses: Option<u64>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    inviter: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawVanity {
    code: Option<String>,
    #[serde(default)]
    uses: u64,
}

#[derive(Debug, Deserialize)]
struct RawGuild {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Walks a cursor-paged community listing. Each page starts after the last
/// id of the previous one; a short page ends the walk, as does a page that
/// fails to move the cursor.
async fn collect_pages<F, Fut>(limit: usize, mut fetch_page: F) -> Result<Vec<CommunityId>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Vec<RawGuild>>>,
{
    let mut communities = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let page = fetch_page(after.clone()).await?;
        let full = page.len() >= limit;
        let last = page.last().map(|guild| guild.id.clone());
        communities.extend(page.into_iter().map(|guild| CommunityId::new(guild.id)));

        match last {
            Some(last) if full && after.as_deref() != Some(last.as_str()) => after = Some(last),
            _ => break,
        }
    }

    Ok(communities)
}

impl RawInvite {
    /// Invites without metadata (no `created_at`) are reported as created
    /// at the epoch so that best-guess attribution never prefers them.
    fn into_invite(self) -> InviteInfo {
        InviteInfo {
            code: InviteCode::new(self.code),
            inviter: self.inviter.map(|user| Inviter {
                display_name: user.global_name.unwrap_or(user.username),
                id: UserId::new(user.id),
            }),
            use_count: self.uses.unwrap_or(0),
            created_at: self.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl PlatformApi for HttpPlatformClient {
    async fn fetch_invites(&self, community: &CommunityId) -> Result<Vec<InviteInfo>> {
        let raw: Vec<RawInvite> = self.get_json(&format!("guilds/{}/invites", community)).await?;
        debug!(community = %community, count = raw.len(), "Fetched invites");
        Ok(raw.into_iter().map(RawInvite::into_invite).collect())
    }

    async fn fetch_vanity(&self, community: &CommunityId) -> Result<Option<VanityInvite>> {
        let raw: RawVanity = match self
            .get_json(&format!("guilds/{}/vanity-url", community))
            .await
        {
            Ok(raw) => raw,
            // Communities without the vanity feature answer 403 or 404.
            Err(e) if matches!(e.status_code, Some(403) | Some(404)) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(raw.code.map(|code| VanityInvite {
            code: InviteCode::new(code),
            use_count: raw.uses,
        }))
    }

    async fn list_communities(&self) -> Result<Vec<CommunityId>> {
        let communities = collect_pages(GUILDS_PAGE_LIMIT, move |after| {
            let path = match after {
                Some(after) => format!("users/@me/guilds?limit={GUILDS_PAGE_LIMIT}&after={after}"),
                None => format!("users/@me/guilds?limit={GUILDS_PAGE_LIMIT}"),
            };
            async move { self.get_json::<Vec<RawGuild>>(&path).await }
        })
        .await?;
        debug!(count = communities.len(), "Listed communities");
        Ok(communities)
    }
}

impl ChannelResolver for HttpPlatformClient {
    async fn resolve_channel(
        &self,
        community: &CommunityId,
        channel: &ChannelId,
    ) -> Result<Option<Channel>> {
        let raw: RawChannel = match self.get_json(&format!("channels/{}", channel)).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        if raw.guild_id.as_deref() != Some(community.as_str()) {
            debug!(
                community = %community,
                channel = %channel,
                "Channel belongs to a different community"
            );
            return Ok(None);
        }

        Ok(Some(Channel {
            id: ChannelId::new(raw.id),
            community: community.clone(),
            name: raw.name,
        }))
    }
}

impl Notifier for HttpPlatformClient {
    async fn send(&self, channel: &Channel, notification: &Notification) -> Result<()> {
        let body = serde_json::json!({ "embeds": [notification.to_embed()] });
        let response = self
            .http
            .post(self.url(&format!("channels/{}/messages", channel.id)))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformApiError::from_status(status.as_u16(), body));
        }
        Ok(())
    }
}
