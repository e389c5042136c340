//! Seams between the mailout engine and the host CMS

use crate::error::Result;
use async_trait::async_trait;
use mailout_types::{ContentItem, MailoutReport, Notice};

/// Hooks the persistence layer calls around saving a content item.
///
/// Neither hook blocks the save; problems come back as notices.
#[async_trait]
pub trait ContentPublishListener: Send + Sync {
    /// Runs before the item is written; may fill in its stored list reference
    async fn before_save(&self, item: &mut ContentItem) -> Vec<Notice>;

    /// Runs after the item was written; sends the mailout when requested
    async fn after_save(&self, item: &ContentItem, was_update: bool) -> MailoutReport;
}

/// Access to content items other than the one being saved
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<ContentItem>>;

    async fn save(&self, item: &ContentItem) -> Result<()>;
}

/// Renders the HTML body of a mailout
pub trait MailoutRenderer: Send + Sync {
    fn render(&self, item: &ContentItem, is_new: bool) -> Result<String>;
}
