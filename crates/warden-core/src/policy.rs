//! Content policy engine: anti-link and anti-word rules.
//!
//! Evaluation is deterministic and side-effect-free; the dispatcher performs
//! the resulting delete/ban actions. Admins are exempt unconditionally, and
//! the admin check only runs once a rule has actually matched.

use std::{
    collections::BTreeSet,
    sync::{Arc, OnceLock},
};

use regex::Regex;

use crate::{
    domain::{GroupId, UserId},
    roster::RosterOracle,
    settings::BotSettings,
};

/// Outcome of evaluating a message body against the moderation rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Delete,
    DeleteAndBan,
}

// Suffixes that make a bare token count as a link even without a scheme or
// `www.` prefix.
const BARE_TLDS: &[&str] = &[
    "com", "net", "org", "io", "co", "me", "gg", "tv", "app", "dev", "xyz", "info", "biz",
    "online", "site", "shop", "store", "club", "link",
];

fn link_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let tlds = BARE_TLDS.join("|");
        let pattern = format!(
            r"(?i)\b(?:https?://\S+|www\.[a-z0-9-]+(?:\.[a-z0-9-]+)+|[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)*\.(?:{tlds})\b)"
        );
        Regex::new(&pattern).expect("link pattern is valid")
    })
}

/// Whether the body contains a scheme-prefixed URL, a `www.` host, or a bare
/// domain on a recognized TLD.
pub fn contains_link(body: &str) -> bool {
    link_pattern().is_match(body)
}

/// First forbidden word contained in the body, case-insensitively.
pub fn matched_word<'a>(body: &str, words: &'a BTreeSet<String>) -> Option<&'a str> {
    let lower = body.to_lowercase();
    words
        .iter()
        .find(|word| lower.contains(word.as_str()))
        .map(String::as_str)
}

pub struct PolicyEngine {
    oracle: Arc<RosterOracle>,
}

impl PolicyEngine {
    pub fn new(oracle: Arc<RosterOracle>) -> Self {
        Self { oracle }
    }

    /// Decide what to do with a plain (non-command) message. At most one rule
    /// fires; anti-link is checked before anti-word.
    pub async fn evaluate(
        &self,
        group_id: &GroupId,
        sender: &UserId,
        body: &str,
        settings: &BotSettings,
    ) -> Decision {
        if settings.antilink.enabled && contains_link(body) {
            if self.oracle.is_admin(group_id, sender).await {
                return Decision::Allow;
            }
            return if settings.antilink.ban {
                Decision::DeleteAndBan
            } else {
                Decision::Delete
            };
        }

        if settings.antiwords.enabled && !settings.antiwords.words.is_empty() {
            if let Some(word) = matched_word(body, &settings.antiwords.words) {
                if self.oracle.is_admin(group_id, sender).await {
                    return Decision::Allow;
                }
                tracing::debug!("message from {sender} matched forbidden word '{word}'");
                return if settings.antiwords.ban {
                    Decision::DeleteAndBan
                } else {
                    Decision::Delete
                };
            }
        }

        Decision::Allow
    }
}
