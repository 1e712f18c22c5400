use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
};

use crate::{domain::ChatId, store::write_atomic, Result};

/// Key-value store of per-chat prefix overrides.
pub trait PrefixStore: Send + Sync {
    fn get(&self, chat: ChatId) -> Option<String>;
    fn set(&self, chat: ChatId, prefix: &str) -> Result<()>;
    /// Returns whether an override existed.
    fn remove(&self, chat: ChatId) -> Result<bool>;
}

/// `prefixes.json`-backed store: `{"<chat id>": "<prefix>", ...}`.
///
/// The file is read once; lookups hit the in-memory map. Writes update the map and
/// rewrite the whole file atomically.
pub struct JsonPrefixStore {
    path: PathBuf,
    cache: RwLock<HashMap<i64, String>>,
    // Serialises file rewrites so two setters cannot interleave snapshots.
    write_lock: Mutex<()>,
}

impl JsonPrefixStore {
    /// Load `path`. A missing file is created as `{}`; an unreadable or corrupt one
    /// is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cache = load_overrides(&path);
        if !path.exists() {
            write_atomic(&path, b"{}")?;
        }
        Ok(Self {
            path,
            cache: RwLock::new(cache),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the overrides, write it out, then swap it in.
    ///
    /// The cache only changes once the file does. Returns what `change` returned.
    fn update<T>(&self, change: impl FnOnce(&mut HashMap<i64, String>) -> (T, bool)) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut next = self
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let (out, dirty) = change(&mut next);
        if !dirty {
            return Ok(out);
        }

        let snapshot: HashMap<String, String> = next
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        write_atomic(&self.path, &serde_json::to_vec_pretty(&snapshot)?)?;

        *self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
        Ok(out)
    }
}

fn load_overrides(path: &Path) -> HashMap<i64, String> {
    let txt = match fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read prefix store, using defaults");
            return HashMap::new();
        }
    };
    if txt.trim().is_empty() {
        return HashMap::new();
    }

    match serde_json::from_str::<HashMap<String, String>>(&txt) {
        Ok(raw) => raw
            .into_iter()
            .filter_map(|(k, v)| k.trim().parse::<i64>().ok().map(|id| (id, v)))
            .collect(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt prefix store, using defaults");
            HashMap::new()
        }
    }
}

impl PrefixStore for JsonPrefixStore {
    fn get(&self, chat: ChatId) -> Option<String> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&chat.0)
            .cloned()
    }

    fn set(&self, chat: ChatId, prefix: &str) -> Result<()> {
        self.update(|overrides| {
            overrides.insert(chat.0, prefix.to_string());
            ((), true)
        })
    }

    fn remove(&self, chat: ChatId) -> Result<bool> {
        self.update(|overrides| {
            let existed = overrides.remove(&chat.0).is_some();
            (existed, existed)
        })
    }
}

/// Outcome of a `newprefix` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrefixChange {
    /// A custom prefix is now in effect.
    Set(String),
    /// The override was removed; the default applies again.
    Reset(String),
    /// The default was requested and no override existed.
    AlreadyDefault,
}

/// Effective prefix per chat: override if present, else the process-wide default.
#[derive(Clone)]
pub struct PrefixResolver {
    store: Arc<dyn PrefixStore>,
    default_prefix: String,
}

impl PrefixResolver {
    pub fn new(store: Arc<dyn PrefixStore>, default_prefix: impl Into<String>) -> Self {
        Self {
            store,
            default_prefix: default_prefix.into(),
        }
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    pub fn resolve(&self, chat: ChatId) -> String {
        self.store
            .get(chat)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.default_prefix.clone())
    }

    /// Apply a new prefix for `chat`. Asking for the default clears the override.
    pub fn change(&self, chat: ChatId, new_prefix: &str) -> Result<PrefixChange> {
        if new_prefix == self.default_prefix {
            return Ok(if self.store.remove(chat)? {
                PrefixChange::Reset(new_prefix.to_string())
            } else {
                PrefixChange::AlreadyDefault
            });
        }
        self.store.set(chat, new_prefix)?;
        Ok(PrefixChange::Set(new_prefix.to_string()))
    }
}
