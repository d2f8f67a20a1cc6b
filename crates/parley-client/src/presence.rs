//! Per-user online/offline flags.
//!
//! Updated only by inbound presence events. Users never reported are
//! considered offline.

use std::collections::BTreeMap;

use parley_proto::{PresenceStatus, UserId};

/// Latest reported presence per user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceMap {
    statuses: BTreeMap<UserId, PresenceStatus>,
}

impl PresenceMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a user's presence. Returns the previous value, if any.
    pub fn set_presence(&mut self, user_id: UserId, status: PresenceStatus) -> Option<PresenceStatus> {
        self.statuses.insert(user_id, status)
    }

    /// Presence of a user, `Offline` if never reported.
    pub fn status(&self, user_id: UserId) -> PresenceStatus {
        self.statuses.get(&user_id).copied().unwrap_or_default()
    }

    /// Reported presence, `None` if never reported.
    pub fn reported(&self, user_id: UserId) -> Option<PresenceStatus> {
        self.statuses.get(&user_id).copied()
    }

    /// Users currently reported online, ascending by id.
    pub fn online(&self) -> impl Iterator<Item = UserId> + '_ {
        self.statuses.iter().filter(|(_, s)| **s == PresenceStatus::Online).map(|(id, _)| *id)
    }

    /// Forget a user.
    pub fn remove(&mut self, user_id: UserId) {
        self.statuses.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_users_are_offline() {
        let presence = PresenceMap::new();
        assert_eq!(presence.status(3), PresenceStatus::Offline);
        assert_eq!(presence.reported(3), None);
    }

    #[test]
    fn last_event_wins() {
        let mut presence = PresenceMap::new();
        presence.set_presence(3, PresenceStatus::Online);
        let previous = presence.set_presence(3, PresenceStatus::Offline);

        assert_eq!(previous, Some(PresenceStatus::Online));
        assert_eq!(presence.status(3), PresenceStatus::Offline);
    }

    #[test]
    fn online_lists_only_online_users() {
        let mut presence = PresenceMap::new();
        presence.set_presence(5, PresenceStatus::Online);
        presence.set_presence(2, PresenceStatus::Online);
        presence.set_presence(4, PresenceStatus::Offline);

        assert_eq!(presence.online().collect::<Vec<_>>(), vec![2, 5]);
    }
}
