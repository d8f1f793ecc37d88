use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::messages;

use super::{ChannelId, MessageId, UserId};

/// `messages.type` for messages written by a connected user.
pub const MESSAGE_TYPE_USER: &str = "user";

/// A persisted chat message.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub sender_id: UserId,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    /// Stored without a zone; always UTC.
    pub created_at: NaiveDateTime,
}

impl Message {
    pub fn created_at_utc(&self) -> DateTime<Utc> {
        self.created_at.and_utc()
    }

    /// Creation time in the `2024-01-31T12:00:00.000Z` form clients expect.
    pub fn timestamp(&self) -> String {
        self.created_at_utc()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub channel_id: ChannelId,
    pub sender_id: UserId,
    pub content: Option<&'a str>,
    pub type_: &'a str,
}
