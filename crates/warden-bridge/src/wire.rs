//! Wire format spoken with the bridge process: one JSON object per line.
//!
//! Inbound frames are platform events plus acks for our requests; outbound
//! frames are actions carrying a `seq` the bridge echoes back in its ack.

use serde::{Deserialize, Serialize};

use warden_core::domain::MembershipAction;

/// Frames arriving from the bridge process.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Handshake; carries the bot's own platform identity.
    Hello { bot_id: String },
    Message {
        group: String,
        sender: String,
        id: String,
        body: String,
        #[serde(default)]
        mentions: Vec<String>,
    },
    Membership {
        group: String,
        action: MembershipKind,
        #[serde(default)]
        participants: Vec<String>,
    },
    PollVote {
        poll: String,
        voter: String,
        #[serde(default)]
        selected: Vec<usize>,
    },
    /// Completion of an outbound request.
    Ack {
        seq: u64,
        ok: bool,
        #[serde(default)]
        data: serde_json::Value,
        #[serde(default)]
        error: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
    Add,
    Remove,
}

impl From<MembershipKind> for MembershipAction {
    fn from(kind: MembershipKind) -> Self {
        match kind {
            MembershipKind::Add => MembershipAction::Add,
            MembershipKind::Remove => MembershipAction::Remove,
        }
    }
}

/// One outbound request to the bridge.
#[derive(Clone, Debug, Serialize)]
pub struct OutboundFrame {
    pub seq: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SendMessage {
        target: String,
        direct: bool,
        content: String,
        mentions: Vec<String>,
    },
    DeleteMessage {
        chat: String,
        id: String,
    },
    RemoveParticipant {
        group: String,
        user: String,
    },
    PromoteParticipant {
        group: String,
        user: String,
    },
    DemoteParticipant {
        group: String,
        user: String,
    },
    AddParticipant {
        group: String,
        user: String,
    },
    SetSubject {
        group: String,
        subject: String,
    },
    SetDescription {
        group: String,
        description: String,
    },
    GetRoster {
        group: String,
    },
    SendPoll {
        group: String,
        question: String,
        options: Vec<String>,
    },
}

/// Ack payload of `send_message`.
#[derive(Debug, Deserialize)]
pub struct MessageRefData {
    pub chat: String,
    pub id: String,
}

/// Ack payload entry of `get_roster`.
#[derive(Debug, Deserialize)]
pub struct RosterEntryData {
    pub id: String,
    #[serde(default)]
    pub admin: bool,
}

/// Ack payload of `send_poll`.
#[derive(Debug, Deserialize)]
pub struct PollRefData {
    pub poll: String,
}

/// Split a prefixed body into a lowercased command name and its arguments.
/// Returns `None` for anything that is not a command.
pub fn parse_command(body: &str, prefix: char) -> Option<(String, Vec<String>)> {
    let rest = body.trim().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?.to_lowercase();
    let args = words.map(|w| w.to_string()).collect();
    Some((name, args))
}
