use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::task::{Folder, Task, default_folders};

pub const TASKS_KEY: &str = "todos";
pub const FOLDERS_KEY: &str = "folders";

const CORRUPT_SUFFIX: &str = "corrupt";
const REJECTED_SUFFIX: &str = "rejected";
const MAX_BACKUP_SLOTS: usize = 100;

/// A flat slot store, the shape of a browser's local storage. Values are raw
/// bytes so that an undecodable entry can still be copied aside intact.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&mut self, key: &str, value: &[u8]) -> anyhow::Result<()>;
}

/// One `<key>.json` file per key inside a data directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened datastore");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(file = %path.display(), "no stored entry");
            return Ok(None);
        }
        let raw = fs::read(&path).with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value))]
    fn set(&mut self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let path = self.path_for(key);
        debug!(file = %path.display(), bytes = value.len(), "writing entry atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value)?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Collections are keyed by a string id that must be non-blank and unique.
trait Record {
    fn record_id(&self) -> &str;
}

impl Record for Task {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Record for Folder {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Reads the task collection. A missing entry is an empty collection; an
/// unreadable one is set aside under `todos.corrupt` and also reads as empty.
#[tracing::instrument(skip(store))]
pub fn load_tasks(store: &mut dyn KeyValueStore) -> anyhow::Result<Vec<Task>> {
    let tasks = load_records::<Task>(store, TASKS_KEY)?.unwrap_or_default();
    debug!(count = tasks.len(), "loaded tasks");
    Ok(tasks)
}

/// Reads the folder collection, seeding the defaults when the entry is
/// missing or unreadable.
#[tracing::instrument(skip(store))]
pub fn load_folders(store: &mut dyn KeyValueStore) -> anyhow::Result<Vec<Folder>> {
    let Some(folders) = load_records::<Folder>(store, FOLDERS_KEY)? else {
        info!("seeding default folders");
        return Ok(default_folders());
    };

    debug!(count = folders.len(), "loaded folders");
    Ok(folders)
}

#[tracing::instrument(skip(store, tasks), fields(count = tasks.len()))]
pub fn save_tasks(store: &mut dyn KeyValueStore, tasks: &[Task]) -> anyhow::Result<()> {
    save_records(store, TASKS_KEY, tasks).context("failed to save tasks")
}

#[tracing::instrument(skip(store, folders), fields(count = folders.len()))]
pub fn save_folders(store: &mut dyn KeyValueStore, folders: &[Folder]) -> anyhow::Result<()> {
    save_records(store, FOLDERS_KEY, folders).context("failed to save folders")
}

fn save_records<T: Serialize>(
    store: &mut dyn KeyValueStore,
    key: &str,
    records: &[T],
) -> anyhow::Result<()> {
    let serialized = serde_json::to_vec(records)?;
    store.set(key, &serialized)
}

// `None` means "use the default": the entry is absent, not UTF-8, or not a
// JSON array. Records that fail validation or repeat an id are dropped from
// the collection and kept under `<key>.rejected`, since the next save
// overwrites the entry.
fn load_records<T: DeserializeOwned + Record>(
    store: &mut dyn KeyValueStore,
    key: &str,
) -> anyhow::Result<Option<Vec<T>>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    let values = match serde_json::from_slice::<Vec<Value>>(&raw) {
        Ok(values) => values,
        Err(err) => {
            error!(key, error = %err, "stored entry is not a JSON array; resetting");
            set_aside(store, key, CORRUPT_SUFFIX, &raw);
            return Ok(None);
        }
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for (idx, value) in values.into_iter().enumerate() {
        let record = match T::deserialize(&value) {
            Ok(record) => record,
            Err(err) => {
                warn!(key, index = idx, error = %err, "dropping invalid record");
                rejected.push(value);
                continue;
            }
        };

        let id = record.record_id();
        if id.trim().is_empty() {
            warn!(key, index = idx, "dropping record with empty id");
            rejected.push(value);
        } else if !seen.insert(id.to_string()) {
            warn!(key, index = idx, id, "dropping record with duplicate id");
            rejected.push(value);
        } else {
            records.push(record);
        }
    }

    if !rejected.is_empty() {
        match serde_json::to_vec(&rejected) {
            Ok(raw) => set_aside(store, key, REJECTED_SUFFIX, &raw),
            Err(err) => error!(key, error = %err, "failed to encode rejected records"),
        }
    }

    Ok(Some(records))
}

// Writes `raw` to the first free `<key>.<kind>[.N]` slot. Earlier backups are
// never overwritten, and a slot already holding the same bytes counts as kept.
fn set_aside(store: &mut dyn KeyValueStore, key: &str, kind: &str, raw: &[u8]) {
    for slot in 0..MAX_BACKUP_SLOTS {
        let backup = backup_key(key, kind, slot);
        match store.get(&backup) {
            Ok(Some(existing)) if existing == raw => {
                debug!(key, backup = %backup, "entry already kept");
                return;
            }
            Ok(Some(_)) => continue,
            Ok(None) => {
                match store.set(&backup, raw) {
                    Ok(()) => warn!(key, backup = %backup, "kept entry for inspection"),
                    Err(err) => error!(key, backup = %backup, error = %err, "failed to keep entry"),
                }
                return;
            }
            Err(err) => {
                error!(key, backup = %backup, error = %err, "failed to inspect backup slot");
                return;
            }
        }
    }
    error!(key, kind, "every backup slot is taken; entry not kept");
}

fn backup_key(key: &str, kind: &str, slot: usize) -> String {
    match slot {
        0 => format!("{key}.{kind}"),
        n => format!("{key}.{kind}.{n}"),
    }
}
