use std::fmt;

use serde::{Deserialize, Serialize};

/// Group (chat room) identifier as reported by the platform.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

/// Platform user identifier.
///
/// Raw ids carry device and domain decorations (`4479…:12@host`); identity
/// comparisons must go through [`UserId::bare`], never raw string equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// The identifier with any `:device` and `@domain` suffix stripped.
    pub fn bare(&self) -> &str {
        let s = self.0.as_str();
        let s = s.split('@').next().unwrap_or(s);
        s.split(':').next().unwrap_or(s)
    }

    /// Whether two identifiers refer to the same user.
    pub fn same_user(&self, other: &UserId) -> bool {
        self.bare() == other.bare()
    }
}

/// Poll identifier, assigned by the platform when the poll is emitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollId(pub String);

/// A stable reference to a platform message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat: String,
    pub id: String,
}

/// Destination of an outbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatTarget {
    Group(GroupId),
    Direct(UserId),
}

/// One roster line: a participant and their admin flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: UserId,
    pub is_admin: bool,
}

/// A group membership transition reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipAction {
    Add,
    Remove,
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
