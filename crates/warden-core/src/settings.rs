//! Mutable bot settings: moderation rules, welcome/goodbye texts, chatbot
//! triggers. Settings are edited through admin commands, kept authoritative
//! in memory, and written through to the document store on every change.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    config::SettingsScope,
    domain::GroupId,
    ports::StateStore,
    Result,
};

const SETTINGS_DOC: &str = "settings";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeSettings {
    pub enabled: bool,
    pub message: String,
    pub private: PrivateWelcomeSettings,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateWelcomeSettings {
    pub enabled: bool,
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoodbyeSettings {
    pub enabled: bool,
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AntilinkSettings {
    pub enabled: bool,
    pub ban: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiwordSettings {
    pub enabled: bool,
    pub ban: bool,
    /// Lower-cased forbidden words; the set keeps them deduplicated.
    pub words: BTreeSet<String>,
}

impl AntiwordSettings {
    /// Returns false when the word was already on the list.
    pub fn add_word(&mut self, word: &str) -> bool {
        self.words.insert(word.trim().to_lowercase())
    }

    pub fn remove_word(&mut self, word: &str) -> bool {
        self.words.remove(&word.trim().to_lowercase())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatbotSettings {
    pub enabled: bool,
    /// Lower-cased trigger -> canned reply.
    pub triggers: BTreeMap<String, String>,
}

impl ChatbotSettings {
    /// Canned reply for an exact (case-insensitive) body match, if any.
    pub fn reply_for(&self, body: &str) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.triggers
            .get(&body.trim().to_lowercase())
            .map(String::as_str)
    }
}

/// The full mutable settings document for one scope (deployment or group).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    pub welcome: WelcomeSettings,
    pub goodbye: GoodbyeSettings,
    pub antilink: AntilinkSettings,
    pub antiwords: AntiwordSettings,
    pub chatbot: ChatbotSettings,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SettingsDocument {
    global: BotSettings,
    groups: BTreeMap<String, BotSettings>,
}

/// Owns the settings under a lock and writes them through the store.
///
/// A failed write is logged and the in-memory value stays authoritative, so
/// the running process keeps behaving correctly; durability catches up on the
/// next successful write.
pub struct SettingsStore {
    scope: SettingsScope,
    store: Arc<dyn StateStore>,
    state: Mutex<SettingsDocument>,
}

impl SettingsStore {
    pub fn load(scope: SettingsScope, store: Arc<dyn StateStore>) -> Result<Self> {
        let state = match store.load(SETTINGS_DOC)? {
            Some(value) => serde_json::from_value(value)?,
            None => SettingsDocument::default(),
        };
        Ok(Self {
            scope,
            store,
            state: Mutex::new(state),
        })
    }

    /// A copy of the settings in effect for `group_id`.
    pub async fn snapshot(&self, group_id: &GroupId) -> BotSettings {
        let state = self.state.lock().await;
        match self.scope {
            SettingsScope::Global => state.global.clone(),
            SettingsScope::PerGroup => state
                .groups
                .get(group_id.0.as_str())
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Mutate the settings in effect for `group_id` and write them through.
    pub async fn update<T>(
        &self,
        group_id: &GroupId,
        mutate: impl FnOnce(&mut BotSettings) -> T,
    ) -> T {
        let mut state = self.state.lock().await;
        let out = match self.scope {
            SettingsScope::Global => mutate(&mut state.global),
            SettingsScope::PerGroup => {
                mutate(state.groups.entry(group_id.0.clone()).or_default())
            }
        };

        match serde_json::to_value(&*state) {
            Ok(value) => {
                if let Err(e) = self.store.save(SETTINGS_DOC, &value) {
                    tracing::warn!("settings write failed, keeping in-memory value: {e}");
                }
            }
            Err(e) => tracing::warn!("settings serialize failed: {e}"),
        }

        out
    }
}
