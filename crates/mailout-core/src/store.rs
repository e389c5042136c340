//! Persisted set of named provider connections
//! File-based JSON store, rewritten on every change

use crate::error::{MailoutError, Result};
use mailout_types::Connection;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Connection store keyed by connection id.
///
/// Reads and writes are not coordinated across processes; the last write wins.
pub struct ConnectionStore {
    path: Option<PathBuf>,
    connections: Mutex<BTreeMap<String, Connection>>,
}

impl ConnectionStore {
    /// Open the store at `path`, starting empty when the file does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let connections = if path.exists() {
            let json = fs::read_to_string(&path)?;
            if json.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&json)
                    .map_err(|e| MailoutError::Config(format!("Failed to parse connection store {}: {}", path.display(), e)))?
            }
        } else {
            BTreeMap::new()
        };

        log::debug!("Opened connection store {} with {} connections", path.display(), connections.len());

        Ok(Self {
            path: Some(path),
            connections: Mutex::new(connections),
        })
    }

    /// Store that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            connections: Mutex::new(BTreeMap::new()),
        }
    }

    /// In-memory store seeded with `connections`
    pub fn with_connections<I: IntoIterator<Item = Connection>>(connections: I) -> Self {
        let map = connections
            .into_iter()
            .map(|connection| (connection.id.clone(), connection))
            .collect();

        Self {
            path: None,
            connections: Mutex::new(map),
        }
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<String, Connection>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.guard().contains_key(id)
    }

    /// All connections ordered by id
    pub fn all(&self) -> Vec<Connection> {
        self.guard().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Connection> {
        self.guard().get(id).cloned()
    }

    /// Get a connection or fail with a configuration error
    pub fn require(&self, id: &str) -> Result<Connection> {
        self.get(id).ok_or_else(|| MailoutError::missing_connection(id))
    }

    /// Insert or replace a connection and persist the store
    pub fn upsert(&self, connection: Connection) -> Result<()> {
        let mut connections = self.guard();
        log::debug!("Saving connection {}", connection.id);
        connections.insert(connection.id.clone(), connection);
        self.persist(&connections)
    }

    /// Remove a connection and persist the store
    pub fn remove(&self, id: &str) -> Result<Option<Connection>> {
        let mut connections = self.guard();
        let removed = connections.remove(id);
        if removed.is_some() {
            self.persist(&connections)?;
        }
        Ok(removed)
    }

    /// Names of cached lists whose ids appear in `list_ids`, across every connection.
    ///
    /// List ids are assumed unique across connections; a later duplicate keeps
    /// the position of the first one and overwrites its name.
    pub fn list_names(&self, list_ids: &[String]) -> Vec<String> {
        let mut names: Vec<(String, String)> = Vec::new();

        for connection in self.guard().values() {
            for list in &connection.lists {
                if !list_ids.contains(&list.list_id) {
                    continue;
                }
                match names.iter_mut().find(|(id, _)| *id == list.list_id) {
                    Some(entry) => entry.1 = list.name.clone(),
                    None => names.push((list.list_id.clone(), list.name.clone())),
                }
            }
        }

        names.into_iter().map(|(_, name)| name).collect()
    }

    fn persist(&self, connections: &BTreeMap<String, Connection>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(connections)?;
        fs::write(path, json)?;

        Ok(())
    }
}
