//! Group membership oracle.
//!
//! Answers "is this user an admin of that group" against the platform roster,
//! through a short-lived snapshot cache. Fail closed: when the roster cannot
//! be fetched the answer is `false`, never an error.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::{
    domain::{GroupId, RosterEntry, UserId},
    ports::TransportPort,
};

struct CachedRoster {
    fetched_at: Instant,
    entries: Vec<RosterEntry>,
}

pub struct RosterOracle {
    transport: Arc<dyn TransportPort>,
    cache_ttl: Duration,
    // Learned from the bridge handshake; until then bot-admin checks fail closed.
    self_id: RwLock<Option<UserId>>,
    cache: Mutex<HashMap<GroupId, CachedRoster>>,
}

impl RosterOracle {
    pub fn new(transport: Arc<dyn TransportPort>, cache_ttl: Duration) -> Self {
        Self {
            transport,
            cache_ttl,
            self_id: RwLock::new(None),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_self_id(&self, id: UserId) {
        if let Ok(mut guard) = self.self_id.write() {
            *guard = Some(id);
        }
    }

    pub fn self_id(&self) -> Option<UserId> {
        self.self_id.read().ok().and_then(|guard| guard.clone())
    }

    pub async fn is_admin(&self, group_id: &GroupId, user_id: &UserId) -> bool {
        let Some(roster) = self.roster(group_id).await else {
            return false;
        };
        roster
            .iter()
            .any(|entry| entry.is_admin && entry.id.same_user(user_id))
    }

    /// Whether the bot itself holds admin rights in the group. Always consults
    /// the live roster: the bot's own identity is not treated as admin by
    /// assumption.
    pub async fn is_bot_admin(&self, group_id: &GroupId) -> bool {
        let Some(me) = self.self_id() else {
            return false;
        };
        self.is_admin(group_id, &me).await
    }

    /// The current roster snapshot, or `None` when it cannot be fetched.
    pub async fn roster(&self, group_id: &GroupId) -> Option<Vec<RosterEntry>> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.get(group_id) {
            if cached.fetched_at.elapsed() < self.cache_ttl {
                return Some(cached.entries.clone());
            }
        }

        match self.transport.get_group_roster(group_id).await {
            Ok(entries) => {
                cache.insert(
                    group_id.clone(),
                    CachedRoster {
                        fetched_at: Instant::now(),
                        entries: entries.clone(),
                    },
                );
                Some(entries)
            }
            Err(e) => {
                tracing::warn!("roster fetch for {group_id} failed: {e}");
                None
            }
        }
    }

    /// Drop the cached snapshot after a membership or role change.
    pub async fn invalidate(&self, group_id: &GroupId) {
        self.cache.lock().await.remove(group_id);
    }
}
