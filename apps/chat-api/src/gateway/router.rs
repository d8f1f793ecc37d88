//! Inbound event dispatch for authenticated sessions.

use std::sync::Arc;

use crate::error::GatewayError;
use crate::models::presence::PresenceStatus;
use crate::models::ChannelId;

use super::events::{ChatMessage, ClientEvent, MemberSummary, ServerEvent};
use super::session::Session;
use super::topics::Topic;
use super::Gateway;

impl Gateway {
    /// Handle one inbound text frame from `session`.
    ///
    /// Failures are reported to the sender as an `error` event; the
    /// connection stays open. Frames arriving after close are ignored.
    pub async fn dispatch(&self, session: &Arc<Session>, text: &str) {
        if session.is_closed() {
            tracing::debug!(session_id = %session.session_id, "frame after close ignored");
            return;
        }

        let result = match ClientEvent::parse(text) {
            Ok(event) => {
                let name = event.name();
                tracing::debug!(session_id = %session.session_id, event = name, "client event");
                self.handle(session, event).await
            }
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            match &err {
                GatewayError::Persistence(_) => tracing::warn!(
                    session_id = %session.session_id,
                    user_id = session.user_id,
                    %err,
                    "client event failed"
                ),
                _ => tracing::debug!(session_id = %session.session_id, %err, "client event rejected"),
            }
            session.send(&ServerEvent::error(err.client_message()));
        }
    }

    async fn handle(&self, session: &Arc<Session>, event: ClientEvent) -> Result<(), GatewayError> {
        match event {
            ClientEvent::JoinChannel { channel_id } => self.join_channel(session, channel_id).await,
            ClientEvent::LeaveChannel { channel_id } => self.leave_channel(session, channel_id),
            ClientEvent::Message {
                channel_id,
                content,
            } => self.send_message(session, channel_id, content).await,
            ClientEvent::TypingStart { channel_id } => {
                self.ensure_member(session, channel_id).await?;
                self.topics.publish(
                    Topic::Channel(channel_id),
                    &ServerEvent::UserTyping {
                        channel_id,
                        user_id: session.user_id,
                        username: session.username.clone(),
                    },
                );
                Ok(())
            }
            ClientEvent::TypingStop { channel_id } => {
                self.ensure_member(session, channel_id).await?;
                self.topics.publish(
                    Topic::Channel(channel_id),
                    &ServerEvent::UserStoppedTyping {
                        channel_id,
                        user_id: session.user_id,
                    },
                );
                Ok(())
            }
            ClientEvent::StatusUpdate { status } => self.update_status(session, status).await,
        }
    }

    async fn join_channel(&self, session: &Arc<Session>, channel_id: ChannelId) -> Result<(), GatewayError> {
        self.ensure_member(session, channel_id).await?;

        if self.topics.subscribe(session, channel_id) {
            self.topics.publish(
                Topic::Channel(channel_id),
                &ServerEvent::UserJoined {
                    channel_id,
                    user: MemberSummary {
                        id: session.user_id,
                        username: session.username.clone(),
                        status: self.presence.status(session.user_id),
                    },
                },
            );
        }

        session.send(&ServerEvent::JoinedChannel { channel_id });
        Ok(())
    }

    fn leave_channel(&self, session: &Session, channel_id: ChannelId) -> Result<(), GatewayError> {
        if !self.topics.unsubscribe(session, channel_id) {
            return Err(GatewayError::protocol(format!(
                "Not in channel {channel_id}"
            )));
        }

        self.topics.publish(
            Topic::Channel(channel_id),
            &ServerEvent::UserLeft {
                channel_id,
                user_id: session.user_id,
            },
        );
        Ok(())
    }

    /// Persist a message, then fan it out. The sender receives it exactly
    /// once: through the channel if joined, directly otherwise.
    async fn send_message(
        &self,
        session: &Session,
        channel_id: ChannelId,
        content: String,
    ) -> Result<(), GatewayError> {
        self.ensure_member(session, channel_id).await?;

        let stored = self
            .store
            .persist_message(channel_id, session.user_id, &content)
            .await?;

        let topic = Topic::Channel(channel_id);
        let event = ServerEvent::Message(ChatMessage::new(&stored, &session.username));
        let delivered = self.topics.publish(topic, &event);
        if !session.has_joined(channel_id) {
            session.send(&event);
        }

        tracing::debug!(
            message_id = stored.id,
            %topic,
            sender_id = session.user_id,
            delivered,
            "message fanned out"
        );
        Ok(())
    }

    async fn update_status(&self, session: &Session, status: PresenceStatus) -> Result<(), GatewayError> {
        let channels = session.joined_channels();
        self.presence
            .set_status(session.user_id, &session.username, status, &channels)
            .await?;
        Ok(())
    }

    async fn ensure_member(&self, session: &Session, channel_id: ChannelId) -> Result<(), GatewayError> {
        if !self.require_membership {
            return Ok(());
        }
        if self.store.is_member(channel_id, session.user_id).await? {
            Ok(())
        } else {
            Err(GatewayError::protocol(format!(
                "Not a member of channel {channel_id}"
            )))
        }
    }
}
