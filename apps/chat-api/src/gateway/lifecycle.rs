//! Connection open and teardown.

use std::sync::Arc;

use bitchat_common::id::{prefixed_ulid, prefix};

use crate::error::GatewayError;

use super::events::ServerEvent;
use super::registry::Removal;
use super::session::{Outbound, Session};
use super::Gateway;

impl Gateway {
    /// Authenticate a new connection and register its session.
    ///
    /// On failure nothing is registered and the caller closes the socket.
    /// On success the user is marked online and the session is sent a
    /// single `connected` event.
    pub async fn open(
        &self,
        token: Option<&str>,
        outbound: Outbound,
    ) -> Result<Arc<Session>, GatewayError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::authentication("Missing token"))?;
        let user = self.auth.authenticate(token).await?;

        let session = Arc::new(Session::new(
            prefixed_ulid(prefix::SESSION),
            user,
            outbound,
        ));
        self.registry.add(&session);

        if let Err(err) = self.presence.mark_connected(session.user_id).await {
            tracing::warn!(
                user_id = session.user_id,
                %err,
                "failed to persist online presence"
            );
        }

        session.send(&ServerEvent::Connected {
            user_id: session.user_id,
            username: session.username.clone(),
        });

        tracing::info!(
            session_id = %session.session_id,
            user_id = session.user_id,
            username = %session.username,
            sessions = self.registry.session_count(session.user_id),
            "gateway session established"
        );

        Ok(session)
    }

    /// Tear down a session. Safe to call more than once.
    ///
    /// The user goes offline only if this was their last session.
    pub async fn close(&self, session: &Session) {
        if !session.mark_closed() {
            return;
        }

        let channels = self.topics.unsubscribe_all(session);
        match self.registry.remove(session, channels) {
            Removal::LastSession { channels } => {
                self.presence
                    .mark_disconnected(session.user_id, &session.username, &channels)
                    .await;
            }
            Removal::Remaining(remaining) => {
                tracing::debug!(
                    session_id = %session.session_id,
                    user_id = session.user_id,
                    remaining,
                    "other sessions still open; presence unchanged"
                );
            }
            Removal::NotFound => {}
        }

        tracing::info!(
            session_id = %session.session_id,
            user_id = session.user_id,
            "gateway session ended"
        );
    }
}
