//! Channel subscription table: which sessions receive which channel's events.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::models::ChannelId;

use super::events::{self, ServerEvent};
use super::session::Session;

/// Routing key for a subscriber set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Channel(ChannelId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(id) => write!(f, "channel:{id}"),
        }
    }
}

/// Topic → subscribed sessions, keyed by session id.
///
/// A session is under `Topic::Channel(c)` exactly when `c` is in its joined
/// set. Both sides are changed together, with the session's joined lock held
/// across the table update, so no reader sees them disagree. Lock order is
/// always session first, then the table shard.
pub struct SubscriptionTable {
    topics: DashMap<Topic, HashMap<String, Arc<Session>>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Join `session` to a channel. Returns `false` if it had already joined.
    pub fn subscribe(&self, session: &Arc<Session>, channel_id: ChannelId) -> bool {
        let mut joined = session.joined_mut();
        let added = joined.insert(channel_id);
        self.topics
            .entry(Topic::Channel(channel_id))
            .or_default()
            .insert(session.session_id.clone(), session.clone());
        added
    }

    /// Remove `session` from a channel. A no-op returning `false` when the
    /// session had not joined it.
    pub fn unsubscribe(&self, session: &Session, channel_id: ChannelId) -> bool {
        let mut joined = session.joined_mut();
        if !joined.remove(&channel_id) {
            return false;
        }
        self.evict(Topic::Channel(channel_id), &session.session_id);
        true
    }

    /// Remove `session` from every channel it joined and return those
    /// channels. Used on disconnect.
    pub fn unsubscribe_all(&self, session: &Session) -> HashSet<ChannelId> {
        let mut joined = session.joined_mut();
        let channels = std::mem::take(&mut *joined);
        for channel_id in &channels {
            self.evict(Topic::Channel(*channel_id), &session.session_id);
        }
        channels
    }

    /// Queue `event` for every session subscribed to `topic`.
    ///
    /// Delivery is best-effort: sessions whose transport is gone drop the
    /// event silently. Returns the number of sessions it was queued for.
    pub fn publish(&self, topic: Topic, event: &ServerEvent) -> usize {
        let Some(subscribers) = self.topics.get(&topic) else {
            return 0;
        };
        let Some(frame) = events::encode(event) else {
            return 0;
        };

        subscribers
            .values()
            .filter(|session| session.deliver(frame.clone()))
            .count()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics.get(&topic).map_or(0, |subs| subs.len())
    }

    /// Drop one session from a topic, removing the topic once it is empty.
    fn evict(&self, topic: Topic, session_id: &str) {
        if let Entry::Occupied(mut entry) = self.topics.entry(topic) {
            entry.get_mut().remove(session_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }
}

impl Default for SubscriptionTable {
    fn default() -> Self {
        Self::new()
    }
}
