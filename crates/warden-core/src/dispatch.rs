//! Event dispatcher: routes parsed platform events to the engines.
//!
//! Nothing here is fatal. A failed outbound action is logged and abandoned;
//! the bot stays responsive to subsequent events.

use std::sync::Arc;

use crate::{
    commands,
    domain::{ChatTarget, GroupId, MembershipAction, MessageRef, PollId, UserId},
    policy::{Decision, PolicyEngine},
    poll::PollAggregator,
    ports::TransportPort,
    roster::RosterOracle,
    settings::SettingsStore,
};

/// One inbound platform event, already parsed by the adapter.
#[derive(Clone, Debug)]
pub enum IncomingEvent {
    Command {
        group: GroupId,
        sender: UserId,
        name: String,
        args: Vec<String>,
        mentions: Vec<UserId>,
    },
    PlainMessage {
        group: GroupId,
        sender: UserId,
        body: String,
        message: MessageRef,
    },
    MembershipChange {
        group: GroupId,
        action: MembershipAction,
        participants: Vec<UserId>,
    },
    VoteUpdate {
        poll: PollId,
        voter: UserId,
        selected: Vec<usize>,
    },
}

pub struct Dispatcher {
    pub(crate) transport: Arc<dyn TransportPort>,
    pub(crate) oracle: Arc<RosterOracle>,
    pub(crate) policy: PolicyEngine,
    pub(crate) polls: Arc<PollAggregator>,
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) prefix: char,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn TransportPort>,
        oracle: Arc<RosterOracle>,
        policy: PolicyEngine,
        polls: Arc<PollAggregator>,
        settings: Arc<SettingsStore>,
        prefix: char,
    ) -> Self {
        Self {
            transport,
            oracle,
            policy,
            polls,
            settings,
            prefix,
        }
    }

    /// Route one event. Never fails; failures degrade to a log line.
    pub async fn handle_incoming(&self, event: IncomingEvent) {
        match event {
            IncomingEvent::Command {
                group,
                sender,
                name,
                args,
                mentions,
            } => commands::handle_command(self, &group, &sender, &name, &args, &mentions).await,
            IncomingEvent::PlainMessage {
                group,
                sender,
                body,
                message,
            } => self.handle_plain_message(&group, &sender, &body, &message).await,
            IncomingEvent::MembershipChange {
                group,
                action,
                participants,
            } => self.handle_membership(&group, action, &participants).await,
            IncomingEvent::VoteUpdate {
                poll,
                voter,
                selected,
            } => {
                // The platform can report several selected indices; we track one
                // vote per voter, so the first selection wins. An empty selection
                // (a deselect) is not tracked.
                let Some(&first) = selected.first() else {
                    return;
                };
                self.polls.record_vote(&poll, &voter, first).await;
            }
        }
    }

    async fn handle_plain_message(
        &self,
        group: &GroupId,
        sender: &UserId,
        body: &str,
        message: &MessageRef,
    ) {
        let settings = self.settings.snapshot(group).await;

        match self.policy.evaluate(group, sender, body, &settings).await {
            Decision::Allow => {
                if let Some(canned) = settings.chatbot.reply_for(body) {
                    if let Err(e) = self
                        .transport
                        .send_message(ChatTarget::Group(group.clone()), canned, &[])
                        .await
                    {
                        tracing::warn!("chatbot reply in {group} failed: {e}");
                    }
                }
            }
            Decision::Delete => self.enforce(group, sender, message, false).await,
            Decision::DeleteAndBan => self.enforce(group, sender, message, true).await,
        }
    }

    /// Best-effort enforcement. The two actions fail independently: a failed
    /// delete does not stop the ban, and a failed ban leaves the delete in
    /// place. Neither is retried.
    async fn enforce(&self, group: &GroupId, sender: &UserId, message: &MessageRef, ban: bool) {
        if let Err(e) = self.transport.delete_message(message).await {
            tracing::warn!("failed to delete message from {sender} in {group}: {e}");
        }

        if ban {
            match self.transport.remove_participant(group, sender).await {
                Ok(()) => self.oracle.invalidate(group).await,
                Err(e) => tracing::warn!("failed to remove {sender} from {group}: {e}"),
            }
        }
    }

    async fn handle_membership(
        &self,
        group: &GroupId,
        action: MembershipAction,
        participants: &[UserId],
    ) {
        self.oracle.invalidate(group).await;
        let settings = self.settings.snapshot(group).await;

        match action {
            MembershipAction::Add => {
                if !settings.welcome.enabled {
                    return;
                }
                if !settings.welcome.message.is_empty() {
                    if let Err(e) = self
                        .transport
                        .send_message(
                            ChatTarget::Group(group.clone()),
                            &settings.welcome.message,
                            &[],
                        )
                        .await
                    {
                        tracing::warn!("welcome message in {group} failed: {e}");
                    }
                }
                if settings.welcome.private.enabled && !settings.welcome.private.message.is_empty()
                {
                    for participant in participants {
                        if let Err(e) = self
                            .transport
                            .send_message(
                                ChatTarget::Direct(participant.clone()),
                                &settings.welcome.private.message,
                                &[],
                            )
                            .await
                        {
                            tracing::warn!("private welcome to {participant} failed: {e}");
                        }
                    }
                }
            }
            MembershipAction::Remove => {
                if settings.goodbye.enabled && !settings.goodbye.message.is_empty() {
                    if let Err(e) = self
                        .transport
                        .send_message(
                            ChatTarget::Group(group.clone()),
                            &settings.goodbye.message,
                            &[],
                        )
                        .await
                    {
                        tracing::warn!("goodbye message in {group} failed: {e}");
                    }
                }
            }
        }
    }
}
