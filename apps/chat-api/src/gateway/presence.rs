//! Per-user presence derived from session occupancy.
//!
//! Presence is per-**user**, not per-session. A user goes offline only when
//! their last session closes; explicit `status-update` events move them
//! between statuses while connected.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::db::ChatStore;
use crate::error::GatewayError;
use crate::models::presence::PresenceStatus;
use crate::models::{ChannelId, UserId};

use super::events::ServerEvent;
use super::registry::SessionRegistry;
use super::topics::{SubscriptionTable, Topic};

/// Number of lock stripes serializing presence writes per user.
const LOCK_STRIPES: usize = 64;

/// Persists presence transitions and broadcasts `status-changed`.
///
/// Writes for one user are serialized through a striped async lock, and the
/// offline write re-checks the registry under that lock. A reconnect racing
/// a final disconnect therefore never leaves a connected user stored as
/// offline.
pub struct PresenceTracker {
    store: Arc<dyn ChatStore>,
    registry: Arc<SessionRegistry>,
    topics: Arc<SubscriptionTable>,
    /// Current status of users with at least one live session.
    statuses: DashMap<UserId, PresenceStatus>,
    stripes: Vec<Mutex<()>>,
}

impl PresenceTracker {
    pub fn new(
        store: Arc<dyn ChatStore>,
        registry: Arc<SessionRegistry>,
        topics: Arc<SubscriptionTable>,
    ) -> Self {
        Self {
            store,
            registry,
            topics,
            statuses: DashMap::new(),
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe(&self, user_id: UserId) -> &Mutex<()> {
        &self.stripes[user_id.unsigned_abs() as usize % LOCK_STRIPES]
    }

    /// Current status of a user. Users without a live session are offline.
    pub fn status(&self, user_id: UserId) -> PresenceStatus {
        self.statuses
            .get(&user_id)
            .map_or(PresenceStatus::Offline, |s| *s)
    }

    /// Store `online` for a user whose session just opened.
    pub async fn mark_connected(&self, user_id: UserId) -> Result<(), GatewayError> {
        let _guard = self.stripe(user_id).lock().await;
        self.statuses.insert(user_id, PresenceStatus::Online);
        self.store
            .persist_presence(user_id, PresenceStatus::Online, Utc::now())
            .await
    }

    /// Store `offline` after a user's last session closed and tell every
    /// channel in `channels`.
    ///
    /// Returns `false` without writing or broadcasting when the user has
    /// reconnected in the meantime.
    pub async fn mark_disconnected(
        &self,
        user_id: UserId,
        username: &str,
        channels: &HashSet<ChannelId>,
    ) -> bool {
        {
            let _guard = self.stripe(user_id).lock().await;
            if self.registry.is_online(user_id) {
                tracing::debug!(user_id, "user reconnected before going offline");
                return false;
            }
            self.statuses.remove(&user_id);

            if let Err(err) = self
                .store
                .persist_presence(user_id, PresenceStatus::Offline, Utc::now())
                .await
            {
                tracing::warn!(user_id, %err, "failed to persist offline presence");
            }
        }

        let delivered = self.broadcast(user_id, username, PresenceStatus::Offline, channels);
        tracing::info!(user_id, channels = channels.len(), delivered, "user went offline");
        true
    }

    /// Apply a client-requested status and tell every channel in `channels`.
    ///
    /// Nothing is broadcast if the write fails.
    pub async fn set_status(
        &self,
        user_id: UserId,
        username: &str,
        status: PresenceStatus,
        channels: &HashSet<ChannelId>,
    ) -> Result<usize, GatewayError> {
        {
            let _guard = self.stripe(user_id).lock().await;
            self.store
                .persist_presence(user_id, status, Utc::now())
                .await?;
            if self.registry.is_online(user_id) {
                self.statuses.insert(user_id, status);
            }
        }

        Ok(self.broadcast(user_id, username, status, channels))
    }

    fn broadcast(
        &self,
        user_id: UserId,
        username: &str,
        status: PresenceStatus,
        channels: &HashSet<ChannelId>,
    ) -> usize {
        let event = ServerEvent::StatusChanged {
            user_id,
            username: username.to_string(),
            status,
        };
        channels
            .iter()
            .map(|channel_id| self.topics.publish(Topic::Channel(*channel_id), &event))
            .sum()
    }
}
