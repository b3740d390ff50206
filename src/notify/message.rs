//! Join and leave notification content.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::format::{UNKNOWN, format_duration, plural};
use crate::lifecycle::Classification;
use crate::types::{Attribution, AttributionRecord, InviterSummary, Member};

/// Green.
pub const JOIN_COLOR: u32 = 0x57F287;

/// Red.
pub const LEAVE_COLOR: u32 = 0xED4245;

/// Orange, for leaves classified as fake joins.
pub const FAKE_LEAVE_COLOR: u32 = 0xFFA500;

/// One name/value row of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl NotificationField {
    fn inline(name: &str, value: impl Into<String>) -> Self {
        NotificationField {
            name: name.to_string(),
            value: value.into(),
            inline: true,
        }
    }

    fn block(name: &str, value: impl Into<String>) -> Self {
        NotificationField {
            name: name.to_string(),
            value: value.into(),
            inline: false,
        }
    }
}

/// A rich message posted to a community's notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<NotificationField>,
    pub timestamp: DateTime<Utc>,
}

/// Everything a join notification shows.
#[derive(Debug, Clone, Copy)]
pub struct JoinDetails<'a> {
    pub member: &'a Member,
    pub attribution: &'a Attribution,
    /// Totals for the attributed inviter, when there is one.
    pub inviter_summary: Option<InviterSummary>,
    pub member_count: Option<u64>,
    pub at: DateTime<Utc>,
}

/// Everything a leave notification shows.
#[derive(Debug, Clone, Copy)]
pub struct LeaveDetails<'a> {
    pub member: &'a Member,
    /// The member's latest attribution row, if one was recorded.
    pub record: Option<&'a AttributionRecord>,
    pub classification: Classification,
    pub at: DateTime<Utc>,
}

fn describe(member: &Member, verb: &str) -> String {
    let bot = if member.bot { " (bot)" } else { "" };
    format!("{} **{}**{bot} {verb} the server", member.id.mention(), member.username)
}

impl Notification {
    pub fn member_joined(details: &JoinDetails<'_>) -> Self {
        let member = details.member;

        let account_age = format_duration(member.created_at.map(|created| details.at - created));

        let invited_by = match (details.attribution.inviter_display_name(), details.inviter_summary) {
            (Some(name), Some(summary)) => {
                format!("{name} ({})", plural(summary.total_invites, "invite"))
            }
            (Some(name), None) => name.to_string(),
            (None, _) => UNKNOWN.to_string(),
        };

        let invite_code = details
            .attribution
            .code()
            .map_or_else(|| UNKNOWN.to_string(), |code| code.to_string());

        let server_stats = details
            .member_count
            .map_or_else(|| UNKNOWN.to_string(), |count| format!("Member #{count}"));

        Notification {
            title: "Member Joined".to_string(),
            description: describe(member, "joined"),
            color: JOIN_COLOR,
            fields: vec![
                NotificationField::inline("User ID", member.id.as_str()),
                NotificationField::inline("Account Age", account_age),
                NotificationField::inline("Invited By", invited_by),
                NotificationField::inline("Invite Code", invite_code),
                NotificationField::block("Server Stats", server_stats),
            ],
            timestamp: details.at,
        }
    }

    pub fn member_left(details: &LeaveDetails<'_>) -> Self {
        let member = details.member;
        let classification = details.classification;

        let invited_by = details
            .record
            .and_then(|record| record.inviter_display_name.clone())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let invite_code = details
            .record
            .and_then(|record| record.invitation_code.as_ref())
            .map_or_else(|| UNKNOWN.to_string(), |code| code.to_string());

        let mut fields = vec![
            NotificationField::inline("User ID", member.id.as_str()),
            NotificationField::inline(
                "Time in Server",
                format_duration(classification.time_in_server),
            ),
            NotificationField::inline("Invited By", invited_by),
            NotificationField::inline("Invite Code", invite_code),
        ];

        if classification.is_fake {
            fields.push(NotificationField::block(
                "Suspected Fake Join",
                format!(
                    "Left {} after joining",
                    format_duration(classification.time_in_server)
                ),
            ));
        }

        Notification {
            title: "Member Left".to_string(),
            description: describe(member, "left"),
            color: if classification.is_fake {
                FAKE_LEAVE_COLOR
            } else {
                LEAVE_COLOR
            },
            fields,
            timestamp: details.at,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    /// The notification as a chat embed object.
    pub fn to_embed(&self) -> Value {
        json!({
            "title": self.title,
            "description": self.description,
            "color": self.color,
            "fields": self.fields,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}
