use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Scope of the mutable bot settings (moderation rules, welcome texts, …).
///
/// `Global` keeps one settings document for every group the bot is in;
/// `PerGroup` gives each group its own overlay. This is a deployment
/// decision, not a hard-coded behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsScope {
    Global,
    PerGroup,
}

/// Typed deployment configuration, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    /// Program (plus arguments) that runs the platform bridge process.
    pub bridge_command: Vec<String>,
    /// Directory holding the persisted JSON documents (settings, polls).
    pub data_dir: PathBuf,
    /// Leading character that marks a message body as a command.
    pub command_prefix: char,
    pub settings_scope: SettingsScope,
    /// How long a fetched group roster stays valid for admin checks.
    pub roster_cache_ttl: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bridge_command = parse_command_line(env_str("WARDEN_BRIDGE_CMD"));
        if bridge_command.is_empty() {
            return Err(Error::Config(
                "WARDEN_BRIDGE_CMD environment variable is required".to_string(),
            ));
        }

        let data_dir = env_path("WARDEN_DATA_DIR")
            .unwrap_or_else(|| PathBuf::from("./warden-data"));
        fs::create_dir_all(&data_dir)?;

        let command_prefix = env_str("WARDEN_COMMAND_PREFIX")
            .and_then(|s| s.trim().chars().next())
            .unwrap_or('!');

        let settings_scope = match env_str("WARDEN_SETTINGS_SCOPE").as_deref() {
            None => SettingsScope::Global,
            Some(raw) => parse_scope(raw)?,
        };

        let roster_cache_ttl =
            Duration::from_millis(env_u64("WARDEN_ROSTER_CACHE_TTL_MS").unwrap_or(30_000));

        Ok(Self {
            bridge_command,
            data_dir,
            command_prefix,
            settings_scope,
            roster_cache_ttl,
        })
    }
}

fn parse_scope(raw: &str) -> Result<SettingsScope> {
    match raw.trim().to_lowercase().as_str() {
        "global" => Ok(SettingsScope::Global),
        "per-group" | "per_group" => Ok(SettingsScope::PerGroup),
        other => Err(Error::Config(format!(
            "WARDEN_SETTINGS_SCOPE must be 'global' or 'per-group', got '{other}'"
        ))),
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_command_line(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}
