//! In-memory join times for members who joined while this process ran.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::types::{CommunityId, UserId};

type Index = HashMap<CommunityId, HashMap<UserId, DateTime<Utc>>>;

/// community → member → join time.
///
/// An entry lives from the handled join until the matching leave takes it.
#[derive(Debug, Default)]
pub struct JoinTimestampIndex {
    entries: Mutex<Index>,
}

impl JoinTimestampIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Index> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a join, replacing any earlier time for the member.
    pub fn record(&self, community: &CommunityId, member: &UserId, at: DateTime<Utc>) {
        self.lock()
            .entry(community.clone())
            .or_default()
            .insert(member.clone(), at);
    }

    /// Removes and returns the member's join time.
    pub fn take(&self, community: &CommunityId, member: &UserId) -> Option<DateTime<Utc>> {
        let mut entries = self.lock();
        let members = entries.get_mut(community)?;
        let at = members.remove(member);
        if members.is_empty() {
            entries.remove(community);
        }
        at
    }

    pub fn get(&self, community: &CommunityId, member: &UserId) -> Option<DateTime<Utc>> {
        self.lock().get(community)?.get(member).copied()
    }

    pub fn forget_community(&self, community: &CommunityId) {
        self.lock().remove(community);
    }

    /// Number of tracked members across all communities.
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn take_removes_entry() {
        let index = JoinTimestampIndex::new();
        let (c, m) = (CommunityId::from("1"), UserId::from("2"));
        index.record(&c, &m, at(0));

        assert_eq!(index.get(&c, &m), Some(at(0)));
        assert_eq!(index.take(&c, &m), Some(at(0)));
        assert_eq!(index.take(&c, &m), None);
        assert!(index.is_empty());
    }

    #[test]
    fn rejoin_overwrites() {
        let index = JoinTimestampIndex::new();
        let (c, m) = (CommunityId::from("1"), UserId::from("2"));
        index.record(&c, &m, at(0));
        index.record(&c, &m, at(60));
        assert_eq!(index.get(&c, &m), Some(at(60)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn forget_community_is_scoped() {
        let index = JoinTimestampIndex::new();
        let m = UserId::from("2");
        index.record(&"1".into(), &m, at(0));
        index.record(&"3".into(), &m, at(0));

        index.forget_community(&"1".into());
        assert_eq!(index.get(&"1".into(), &m), None);
        assert_eq!(index.get(&"3".into(), &m), Some(at(0)));
    }
}
