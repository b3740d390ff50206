//! Members as described by join/leave payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UserId;

/// The member a join or leave event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub username: String,

    /// Account creation time, when the platform reports it.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Platform-reported join time. Leave payloads carry it for members the
    /// platform still had cached.
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub bot: bool,
}

impl Member {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Member {
            id: UserId::new(id),
            username: username.into(),
            created_at: None,
            joined_at: None,
            bot: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default() {
        let member: Member =
            serde_json::from_value(serde_json::json!({"id": "5", "username": "bob"})).unwrap();
        assert_eq!(member, Member::new("5", "bob"));
    }
}
