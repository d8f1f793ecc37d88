use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::error::GatewayError;
use crate::models::message::{Message, NewMessage, MESSAGE_TYPE_USER};
use crate::models::presence::PresenceStatus;
use crate::models::{ChannelId, UserId};

use super::pool::DbPool;
use super::schema::{channel_members, messages, users};
use super::store::ChatStore;

/// [`ChatStore`] backed by the shared PostgreSQL database.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn persist_message(
        &self,
        channel_id: ChannelId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message, GatewayError> {
        let mut conn = self.pool.get().await?;

        let message: Message = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(messages::table)
                .values(NewMessage {
                    channel_id,
                    sender_id,
                    content: Some(content),
                    type_: MESSAGE_TYPE_USER,
                })
                .returning(Message::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(message)
    }

    async fn persist_presence(
        &self,
        user_id: UserId,
        status: PresenceStatus,
        last_seen: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let mut conn = self.pool.get().await?;

        let updated = diesel_async::RunQueryDsl::execute(
            diesel::update(users::table.find(user_id)).set((
                users::status.eq(status.as_str()),
                users::last_seen.eq(last_seen.naive_utc()),
            )),
            &mut conn,
        )
        .await?;

        if updated == 0 {
            tracing::warn!(user_id, %status, "presence update matched no user row");
        }
        Ok(())
    }

    async fn is_member(&self, channel_id: ChannelId, user_id: UserId) -> Result<bool, GatewayError> {
        let mut conn = self.pool.get().await?;

        let member: bool = diesel_async::RunQueryDsl::get_result(
            diesel::select(diesel::dsl::exists(
                channel_members::table
                    .filter(channel_members::channel_id.eq(channel_id))
                    .filter(channel_members::user_id.eq(user_id)),
            )),
            &mut conn,
        )
        .await?;

        Ok(member)
    }
}
