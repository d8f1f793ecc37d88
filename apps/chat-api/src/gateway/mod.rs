//! Real-time gateway: sessions, channel fan-out and presence.

pub mod events;
pub mod lifecycle;
pub mod presence;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod topics;

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::db::ChatStore;
use crate::models::presence::PresenceStatus;
use crate::models::{ChannelId, UserId};

use presence::PresenceTracker;
use registry::SessionRegistry;
use topics::{SubscriptionTable, Topic};

/// Process-wide gateway state shared by every connection task.
///
/// Starts empty; nothing here survives a restart.
pub struct Gateway {
    auth: Arc<dyn Authenticator>,
    store: Arc<dyn ChatStore>,
    registry: Arc<SessionRegistry>,
    topics: Arc<SubscriptionTable>,
    presence: PresenceTracker,
    /// Check channel membership before channel events.
    require_membership: bool,
}

impl Gateway {
    pub fn new(auth: Arc<dyn Authenticator>, store: Arc<dyn ChatStore>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let topics = Arc::new(SubscriptionTable::new());
        let presence = PresenceTracker::new(store.clone(), registry.clone(), topics.clone());

        Self {
            auth,
            store,
            registry,
            topics,
            presence,
            require_membership: false,
        }
    }

    pub fn require_membership(mut self, required: bool) -> Self {
        self.require_membership = required;
        self
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.registry.is_online(user_id)
    }

    pub fn session_count(&self, user_id: UserId) -> usize {
        self.registry.session_count(user_id)
    }

    pub fn subscriber_count(&self, channel_id: ChannelId) -> usize {
        self.topics.subscriber_count(Topic::Channel(channel_id))
    }

    pub fn status(&self, user_id: UserId) -> PresenceStatus {
        self.presence.status(user_id)
    }
}
