use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::models::message::Message;
use crate::models::presence::PresenceStatus;
use crate::models::{ChannelId, UserId};

/// Durable storage the gateway writes through to.
///
/// Backed by PostgreSQL in production and an in-memory map in tests.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert a user message and return the stored row (assigned id and
    /// creation time included).
    async fn persist_message(
        &self,
        channel_id: ChannelId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message, GatewayError>;

    async fn persist_presence(
        &self,
        user_id: UserId,
        status: PresenceStatus,
        last_seen: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    async fn is_member(&self, channel_id: ChannelId, user_id: UserId) -> Result<bool, GatewayError>;
}
