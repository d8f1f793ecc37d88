use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::GatewayError;
use crate::models::message::{Message, MESSAGE_TYPE_USER};
use crate::models::presence::PresenceStatus;
use crate::models::{ChannelId, UserId};

use super::store::ChatStore;

/// Last presence written for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceRecord {
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
}

/// In-memory [`ChatStore`] for development without a database and for tests.
pub struct MemoryStore {
    next_message_id: AtomicI32,
    messages: Mutex<Vec<Message>>,
    presence: Mutex<HashMap<UserId, PresenceRecord>>,
    /// Every presence write in order, for asserting transitions.
    presence_log: Mutex<Vec<(UserId, PresenceStatus)>>,
    members: Mutex<HashMap<ChannelId, HashSet<UserId>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI32::new(1),
            messages: Mutex::new(Vec::new()),
            presence: Mutex::new(HashMap::new()),
            presence_log: Mutex::new(Vec::new()),
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_member(&self, channel_id: ChannelId, user_id: UserId) {
        self.members
            .lock()
            .entry(channel_id)
            .or_default()
            .insert(user_id);
    }

    pub fn presence(&self, user_id: UserId) -> Option<PresenceRecord> {
        self.presence.lock().get(&user_id).copied()
    }

    /// Statuses written for `user_id`, oldest first.
    pub fn presence_history(&self, user_id: UserId) -> Vec<PresenceStatus> {
        self.presence_log
            .lock()
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn persist_message(
        &self,
        channel_id: ChannelId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message, GatewayError> {
        let message = Message {
            id: self.next_message_id.fetch_add(1, Ordering::Relaxed),
            channel_id,
            sender_id,
            content: Some(content.to_string()),
            type_: MESSAGE_TYPE_USER.to_string(),
            created_at: Utc::now().naive_utc(),
        };
        self.messages.lock().push(message.clone());
        Ok(message)
    }

    async fn persist_presence(
        &self,
        user_id: UserId,
        status: PresenceStatus,
        last_seen: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        self.presence
            .lock()
            .insert(user_id, PresenceRecord { status, last_seen });
        self.presence_log.lock().push((user_id, status));
        Ok(())
    }

    async fn is_member(&self, channel_id: ChannelId, user_id: UserId) -> Result<bool, GatewayError> {
        Ok(self
            .members
            .lock()
            .get(&channel_id)
            .is_some_and(|users| users.contains(&user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn message_ids_are_sequential() {
        let store = MemoryStore::new();
        let first = store.persist_message(7, 1, "hello").await.unwrap();
        let second = store.persist_message(7, 2, "world").await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.content.as_deref(), Some("world"));
        assert_eq!(second.type_, MESSAGE_TYPE_USER);
        assert_eq!(store.messages().len(), 2);
    }

    #[tokio::test]
    async fn presence_keeps_latest_and_history() {
        let store = MemoryStore::new();
        store
            .persist_presence(1, PresenceStatus::Online, Utc::now())
            .await
            .unwrap();
        store
            .persist_presence(1, PresenceStatus::Offline, Utc::now())
            .await
            .unwrap();

        assert_eq!(store.presence(1).unwrap().status, PresenceStatus::Offline);
        assert_eq!(
            store.presence_history(1),
            vec![PresenceStatus::Online, PresenceStatus::Offline]
        );
        assert!(store.presence(2).is_none());
    }

    #[tokio::test]
    async fn membership_lookup() {
        let store = MemoryStore::new();
        store.add_member(7, 1);

        assert!(store.is_member(7, 1).await.unwrap());
        assert!(!store.is_member(7, 2).await.unwrap());
        assert!(!store.is_member(8, 1).await.unwrap());
    }
}
