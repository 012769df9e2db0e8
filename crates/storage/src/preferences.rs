use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use libris_core::PreferenceStore;

/// String key/value store persisted as a single JSON object. Every mutation
/// rewrites the file.
#[derive(Debug)]
pub struct PreferenceFile {
    path: Option<PathBuf>,
    items: RefCell<BTreeMap<String, String>>,
}

impl PreferenceFile {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(items) => items,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "discarding unreadable preference file");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("read preferences {}", path.display()));
            }
        };

        Ok(Self {
            path: Some(path),
            items: RefCell::new(items),
        })
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            items: RefCell::new(BTreeMap::new()),
        }
    }

    fn flush(&self) -> anyhow::Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.items.borrow())?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    }
}

impl PreferenceStore for PreferenceFile {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        if self.items.borrow_mut().remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn clear_items(&self) -> anyhow::Result<()> {
        self.items.borrow_mut().clear();
        self.flush()
    }
}
