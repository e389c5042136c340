//! Content repositories: one JSON file per item, or in memory

use super::traits::ContentRepository;
use crate::error::{MailoutError, Result};
use async_trait::async_trait;
use mailout_types::ContentItem;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Directory of `content_{id}.json` files
pub struct JsonContentRepository {
    root_path: PathBuf,
}

impl JsonContentRepository {
    pub fn new<P: AsRef<Path>>(root_path: P) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root_path)?;
        Ok(Self { root_path })
    }

    fn item_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(MailoutError::validation("id", format!("Invalid content id '{}'.", id)));
        }
        Ok(self.root_path.join(format!("content_{}.json", id)))
    }
}

#[async_trait]
impl ContentRepository for JsonContentRepository {
    async fn load(&self, id: &str) -> Result<Option<ContentItem>> {
        let path = self.item_path(id)?;
        if !path.exists() {
            log::debug!("Content item {} not found at {:?}", id, path);
            return Ok(None);
        }

        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn save(&self, item: &ContentItem) -> Result<()> {
        let path = self.item_path(&item.id)?;
        fs::write(&path, serde_json::to_string_pretty(item)?)?;
        log::debug!("Saved content item {} to {:?}", item.id, path);
        Ok(())
    }
}

/// Repository kept in memory, keyed by item id
#[derive(Default)]
pub struct InMemoryContentRepository {
    items: Mutex<BTreeMap<String, ContentItem>>,
}

impl InMemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items<I: IntoIterator<Item = ContentItem>>(items: I) -> Self {
        Self {
            items: Mutex::new(items.into_iter().map(|item| (item.id.clone(), item)).collect()),
        }
    }

    pub fn get(&self, id: &str) -> Option<ContentItem> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    async fn load(&self, id: &str) -> Result<Option<ContentItem>> {
        Ok(self.get(id))
    }

    async fn save(&self, item: &ContentItem) -> Result<()> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.id.clone(), item.clone());
        Ok(())
    }
}
