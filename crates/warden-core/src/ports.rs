use async_trait::async_trait;

use crate::{
    domain::{ChatTarget, GroupId, MessageRef, PollId, RosterEntry, UserId},
    Result,
};

/// Outbound platform operations.
///
/// The out-of-process bridge is the first implementation; the shape leaves
/// room for an in-process client behind the same interface. All calls are
/// fallible and the core never retries them: a failed action is logged by the
/// caller and abandoned.
#[async_trait]
pub trait TransportPort: Send + Sync {
    async fn send_message(
        &self,
        target: ChatTarget,
        content: &str,
        mentions: &[UserId],
    ) -> Result<MessageRef>;

    async fn delete_message(&self, message: &MessageRef) -> Result<()>;

    async fn remove_participant(&self, group: &GroupId, user: &UserId) -> Result<()>;
    async fn promote_participant(&self, group: &GroupId, user: &UserId) -> Result<()>;
    async fn demote_participant(&self, group: &GroupId, user: &UserId) -> Result<()>;
    async fn add_participant(&self, group: &GroupId, user: &UserId) -> Result<()>;

    async fn set_group_subject(&self, group: &GroupId, subject: &str) -> Result<()>;
    async fn set_group_description(&self, group: &GroupId, description: &str) -> Result<()>;

    async fn get_group_roster(&self, group: &GroupId) -> Result<Vec<RosterEntry>>;

    /// Emit a poll to the group. The returned id is the stable reference that
    /// later vote-update events carry.
    async fn send_poll(
        &self,
        group: &GroupId,
        question: &str,
        options: &[String],
    ) -> Result<PollId>;
}

/// Opaque document store for persisted bot state.
///
/// Implementations must provide read-your-writes consistency within a single
/// process; nothing stronger is assumed.
pub trait StateStore: Send + Sync {
    fn load(&self, doc: &str) -> Result<Option<serde_json::Value>>;
    fn save(&self, doc: &str, value: &serde_json::Value) -> Result<()>;
}
