//! Shared fakes for the port traits, used by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    domain::{ChatTarget, GroupId, MessageRef, PollId, RosterEntry, UserId},
    errors::Error,
    ports::{StateStore, TransportPort},
    Result,
};

pub(crate) fn group(id: &str) -> GroupId {
    GroupId(id.to_string())
}

pub(crate) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(crate) fn admin_entry(id: &str) -> RosterEntry {
    RosterEntry {
        id: user(id),
        is_admin: true,
    }
}

pub(crate) fn member_entry(id: &str) -> RosterEntry {
    RosterEntry {
        id: user(id),
        is_admin: false,
    }
}

/// Records every outbound call; individual operations can be flipped to fail.
#[derive(Default)]
pub(crate) struct FakeTransport {
    pub rosters: Mutex<HashMap<GroupId, Vec<RosterEntry>>>,
    pub sent: Mutex<Vec<(ChatTarget, String, Vec<UserId>)>>,
    pub deleted: Mutex<Vec<MessageRef>>,
    pub removed: Mutex<Vec<(GroupId, UserId)>>,
    pub promoted: Mutex<Vec<(GroupId, UserId)>>,
    pub demoted: Mutex<Vec<(GroupId, UserId)>>,
    pub added: Mutex<Vec<(GroupId, UserId)>>,
    pub subjects: Mutex<Vec<(GroupId, String)>>,
    pub descriptions: Mutex<Vec<(GroupId, String)>>,
    pub polls_sent: Mutex<Vec<(GroupId, String, Vec<String>)>>,

    pub fail_roster: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_remove: AtomicBool,
    pub fail_send_poll: AtomicBool,

    next_message: AtomicUsize,
    next_poll: AtomicUsize,
}

impl FakeTransport {
    pub fn with_roster(group_id: GroupId, entries: Vec<RosterEntry>) -> Self {
        let t = Self::default();
        t.rosters.lock().unwrap().insert(group_id, entries);
        t
    }

    pub fn sent_bodies(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body, _)| body.clone())
            .collect()
    }
}

#[async_trait]
impl TransportPort for FakeTransport {
    async fn send_message(
        &self,
        target: ChatTarget,
        content: &str,
        mentions: &[UserId],
    ) -> Result<MessageRef> {
        let chat = match &target {
            ChatTarget::Group(g) => g.0.clone(),
            ChatTarget::Direct(u) => u.0.clone(),
        };
        self.sent
            .lock()
            .unwrap()
            .push((target, content.to_string(), mentions.to_vec()));
        let id = self.next_message.fetch_add(1, Ordering::SeqCst);
        Ok(MessageRef {
            chat,
            id: format!("m{id}"),
        })
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::Transport("delete refused".to_string()));
        }
        self.deleted.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn remove_participant(&self, group_id: &GroupId, user_id: &UserId) -> Result<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(Error::Transport("remove refused".to_string()));
        }
        self.removed
            .lock()
            .unwrap()
            .push((group_id.clone(), user_id.clone()));
        Ok(())
    }

    async fn promote_participant(&self, group_id: &GroupId, user_id: &UserId) -> Result<()> {
        self.promoted
            .lock()
            .unwrap()
            .push((group_id.clone(), user_id.clone()));
        Ok(())
    }

    async fn demote_participant(&self, group_id: &GroupId, user_id: &UserId) -> Result<()> {
        self.demoted
            .lock()
            .unwrap()
            .push((group_id.clone(), user_id.clone()));
        Ok(())
    }

    async fn add_participant(&self, group_id: &GroupId, user_id: &UserId) -> Result<()> {
        self.added
            .lock()
            .unwrap()
            .push((group_id.clone(), user_id.clone()));
        Ok(())
    }

    async fn set_group_subject(&self, group_id: &GroupId, subject: &str) -> Result<()> {
        self.subjects
            .lock()
            .unwrap()
            .push((group_id.clone(), subject.to_string()));
        Ok(())
    }

    async fn set_group_description(&self, group_id: &GroupId, description: &str) -> Result<()> {
        self.descriptions
            .lock()
            .unwrap()
            .push((group_id.clone(), description.to_string()));
        Ok(())
    }

    async fn get_group_roster(&self, group_id: &GroupId) -> Result<Vec<RosterEntry>> {
        if self.fail_roster.load(Ordering::SeqCst) {
            return Err(Error::Transport("roster unavailable".to_string()));
        }
        Ok(self
            .rosters
            .lock()
            .unwrap()
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_poll(
        &self,
        group_id: &GroupId,
        question: &str,
        options: &[String],
    ) -> Result<PollId> {
        if self.fail_send_poll.load(Ordering::SeqCst) {
            return Err(Error::Transport("poll refused".to_string()));
        }
        self.polls_sent.lock().unwrap().push((
            group_id.clone(),
            question.to_string(),
            options.to_vec(),
        ));
        let id = self.next_poll.fetch_add(1, Ordering::SeqCst);
        Ok(PollId(format!("poll-{id}")))
    }
}

/// In-memory document store; saves can be flipped to fail.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub docs: Mutex<HashMap<String, serde_json::Value>>,
    pub fail_saves: AtomicBool,
}

impl StateStore for MemoryStore {
    fn load(&self, doc: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.docs.lock().unwrap().get(doc).cloned())
    }

    fn save(&self, doc: &str, value: &serde_json::Value) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Persist("store is read-only".to_string()));
        }
        self.docs
            .lock()
            .unwrap()
            .insert(doc.to_string(), value.clone());
        Ok(())
    }
}
