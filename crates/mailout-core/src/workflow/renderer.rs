//! Default HTML rendering of a content item

use super::traits::MailoutRenderer;
use crate::error::Result;
use crate::text::{absolutize_urls, escape_html};
use mailout_types::ContentItem;

/// Wraps the item's title and body in a minimal HTML document.
///
/// Root-relative links and images are made absolute against `base_url`.
pub struct HtmlMailoutRenderer {
    base_url: Option<String>,
}

impl HtmlMailoutRenderer {
    pub fn new(base_url: Option<String>) -> Self {
        Self { base_url }
    }
}

impl MailoutRenderer for HtmlMailoutRenderer {
    fn render(&self, item: &ContentItem, _is_new: bool) -> Result<String> {
        let title = escape_html(&item.title);
        let body = item.body.as_deref().unwrap_or_default();

        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n"
        );

        Ok(match self.base_url.as_deref() {
            Some(base_url) => absolutize_urls(&html, base_url),
            None => html,
        })
    }
}
