//! Live sessions grouped by user, for multi-device presence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::models::{ChannelId, UserId};

use super::session::Session;

/// A user's live sessions.
#[derive(Default)]
struct UserSessions {
    sessions: HashMap<String, Arc<Session>>,
    /// Union of channels joined by this user's already-closed sessions.
    departed_channels: HashSet<ChannelId>,
}

/// Outcome of [`SessionRegistry::remove`].
#[derive(Debug, PartialEq, Eq)]
pub enum Removal {
    /// The session was not registered (already removed).
    NotFound,
    /// Other sessions of the same user are still live.
    Remaining(usize),
    /// That was the user's last session. Carries every channel any of the
    /// user's sessions had joined since the entry was created.
    LastSession { channels: HashSet<ChannelId> },
}

/// Shared registry of all live gateway sessions, keyed by user.
///
/// Uses `DashMap` for shard-level concurrency. Each mutation happens under
/// the user's shard lock, so exactly one removal can observe the entry
/// becoming empty.
pub struct SessionRegistry {
    users: DashMap<UserId, UserSessions>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    /// Register a session under its own user.
    pub fn add(&self, session: &Arc<Session>) {
        self.users
            .entry(session.user_id)
            .or_default()
            .sessions
            .insert(session.session_id.clone(), session.clone());
    }

    /// Deregister a session. `channels` are the channels it had joined,
    /// captured before unsubscribing.
    ///
    /// Deletes the user's entry when it becomes empty.
    pub fn remove(&self, session: &Session, channels: HashSet<ChannelId>) -> Removal {
        let Entry::Occupied(mut entry) = self.users.entry(session.user_id) else {
            return Removal::NotFound;
        };

        let user = entry.get_mut();
        if user.sessions.remove(&session.session_id).is_none() {
            return Removal::NotFound;
        }
        user.departed_channels.extend(channels);

        if user.sessions.is_empty() {
            let user = entry.remove();
            Removal::LastSession {
                channels: user.departed_channels,
            }
        } else {
            Removal::Remaining(user.sessions.len())
        }
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.users
            .get(&user_id)
            .is_some_and(|user| !user.sessions.is_empty())
    }

    pub fn session_count(&self, user_id: UserId) -> usize {
        self.users.get(&user_id).map_or(0, |user| user.sessions.len())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
