use std::{fs, path::PathBuf};

use crate::{errors::Error, ports::StateStore, Result};

/// JSON document store over a data directory: one pretty-printed
/// `<doc>.json` file per document.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, doc: &str) -> PathBuf {
        self.dir.join(format!("{doc}.json"))
    }
}

impl StateStore for JsonFileStore {
    fn load(&self, doc: &str) -> Result<Option<serde_json::Value>> {
        let path = self.path(doc);
        if !path.exists() {
            return Ok(None);
        }
        let txt = fs::read_to_string(&path)?;
        if txt.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&txt)?))
    }

    fn save(&self, doc: &str, value: &serde_json::Value) -> Result<()> {
        let txt = serde_json::to_string_pretty(value)
            .map_err(|e| Error::Persist(format!("serialize {doc}: {e}")))?;
        fs::write(self.path(doc), txt)
            .map_err(|e| Error::Persist(format!("write {doc}: {e}")))?;
        Ok(())
    }
}
