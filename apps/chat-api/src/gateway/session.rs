//! Per-connection gateway session state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::auth::AuthUser;
use crate::models::{ChannelId, UserId};

use super::events::{self, ServerEvent};

/// Frames a session may have queued before further frames are dropped.
pub const OUTBOUND_CAPACITY: usize = 1024;

/// Sending half of a session's outbound frame queue.
///
/// Drained in order by the connection's writer task, so frames reach a
/// session in the order they were queued. Queueing never waits: when a
/// stalled socket lets the queue fill up, new frames for that session are
/// dropped.
pub type Outbound = mpsc::Sender<Utf8Bytes>;

/// Receiving half of a session's outbound frame queue.
pub type OutboundQueue = mpsc::Receiver<Utf8Bytes>;

/// A fresh bounded outbound queue.
pub fn outbound_queue() -> (Outbound, OutboundQueue) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// One authenticated, live connection.
pub struct Session {
    /// Unique session identifier (`ws_` prefixed ULID).
    pub session_id: String,
    pub user_id: UserId,
    /// Username resolved at authentication time.
    pub username: String,
    /// Channels this session has joined. Mirrors the subscription table;
    /// only [`super::topics::SubscriptionTable`] mutates it.
    joined: Mutex<HashSet<ChannelId>>,
    outbound: Outbound,
    /// Set while frames are being dropped because the queue is full.
    lagging: AtomicBool,
    closed: AtomicBool,
}

impl Session {
    pub fn new(session_id: String, user: AuthUser, outbound: Outbound) -> Self {
        Self {
            session_id,
            user_id: user.user_id,
            username: user.username,
            joined: Mutex::new(HashSet::new()),
            outbound,
            lagging: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Build a session together with the receiving end of its outbound queue.
    pub fn with_queue(
        session_id: String,
        user: AuthUser,
    ) -> (Arc<Self>, OutboundQueue) {
        let (tx, rx) = outbound_queue();
        (Arc::new(Self::new(session_id, user, tx)), rx)
    }

    /// Queue an event for this session only. Returns `false` if the
    /// transport is gone; the event is dropped.
    pub fn send(&self, event: &ServerEvent) -> bool {
        match events::encode(event) {
            Some(frame) => self.deliver(frame),
            None => false,
        }
    }

    /// Queue an already-encoded frame.
    pub(crate) fn deliver(&self, frame: Utf8Bytes) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => {
                self.lagging.store(false, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                if !self.lagging.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        session_id = %self.session_id,
                        user_id = self.user_id,
                        capacity = OUTBOUND_CAPACITY,
                        "gateway session lagging; dropping frames"
                    );
                }
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn has_joined(&self, channel_id: ChannelId) -> bool {
        self.joined.lock().contains(&channel_id)
    }

    /// Snapshot of the channels this session has joined.
    pub fn joined_channels(&self) -> HashSet<ChannelId> {
        self.joined.lock().clone()
    }

    pub(crate) fn joined_mut(&self) -> MutexGuard<'_, HashSet<ChannelId>> {
        self.joined.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flip the session to closed. Returns `true` only for the first call.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}
