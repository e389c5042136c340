//! Content publish workflow

pub mod renderer;
pub mod repository;
pub mod traits;
pub mod trigger;

pub use renderer::HtmlMailoutRenderer;
pub use repository::{InMemoryContentRepository, JsonContentRepository};
pub use traits::{ContentPublishListener, ContentRepository, MailoutRenderer};
pub use trigger::{site_datetime, validate_send_request, MailoutTrigger};
