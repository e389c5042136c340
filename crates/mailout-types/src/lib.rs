//! Shared types for the mailout engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Taxonomy term identifier as used by the host CMS
pub type TermId = String;

/// Content type (bundle) identifier, e.g. "article"
pub type ContentTypeId = String;

/// Machine name of a field on a content item
pub type FieldName = String;

/// Content item identifier
pub type ContentId = String;

/// Default email subject template
pub const DEFAULT_SUBJECT: &str = "@title";

/// Subject used when the configured template is blank
pub const FALLBACK_SUBJECT: &str = "@type: @title";

/// A contact list as cached from the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactList {
    pub list_id: String,
    pub name: String,
    #[serde(default)]
    pub membership_count: u64,
}

/// One authorized integration with the email marketing provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub secret: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Absolute expiry of the access token in epoch seconds
    #[serde(default)]
    pub expires: i64,
    #[serde(default)]
    pub sender_from_name: String,
    #[serde(default)]
    pub sender_from_email: String,
    #[serde(default)]
    pub sender_replyto_email: String,
    #[serde(default)]
    pub lists: Vec<ContactList>,
}

impl Connection {
    /// Whether the access token must be refreshed before use at `now`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires == 0 || now >= self.expires
    }

    /// Reply-to address, falling back to the from address when blank
    pub fn reply_to_email(&self) -> &str {
        if self.sender_replyto_email.trim().is_empty() {
            &self.sender_from_email
        } else {
            &self.sender_replyto_email
        }
    }

    pub fn sender(&self) -> Sender {
        Sender {
            from_name: self.sender_from_name.clone(),
            from_email: self.sender_from_email.clone(),
            reply_to_email: self.reply_to_email().to_string(),
        }
    }

    /// Look up a cached list by its provider id
    pub fn list(&self, list_id: &str) -> Option<&ContactList> {
        self.lists.iter().find(|list| list.list_id == list_id)
    }

    /// Build the compound reference for one of this connection's lists
    pub fn list_ref(&self, list_id: &str) -> ContactListRef {
        ContactListRef::new(self.id.clone(), list_id)
    }
}

/// Error returned when a compound list reference cannot be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid contact list reference '{0}': expected '<connection>:<list>'")]
pub struct ParseRefError(pub String);

/// Canonical identifier of a list across connections.
///
/// Serialized as `"{connection_id}:{list_id}"` and split on the first `:`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactListRef {
    pub connection_id: String,
    pub list_id: String,
}

impl ContactListRef {
    pub fn new(connection_id: impl Into<String>, list_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            list_id: list_id.into(),
        }
    }
}

impl fmt::Display for ContactListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connection_id, self.list_id)
    }
}

impl FromStr for ContactListRef {
    type Err = ParseRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((connection_id, list_id)) if !connection_id.is_empty() && !list_id.is_empty() => {
                Ok(Self::new(connection_id, list_id))
            }
            _ => Err(ParseRefError(s.to_string())),
        }
    }
}

impl Serialize for ContactListRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContactListRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Sender identity of a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub from_name: String,
    pub from_email: String,
    pub reply_to_email: String,
}

/// When a campaign activity goes out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "scheduled_date", rename_all = "snake_case")]
pub enum Schedule {
    Immediate,
    At(DateTime<Utc>),
}

/// Everything needed to create one campaign on one connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRequest {
    pub subject: String,
    pub html_content: String,
    pub sender: Sender,
    pub schedule: Schedule,
}

/// Contact data submitted for a list signup
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignupContact {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// How a content type picks the lists its mailouts go to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "contact_list_creation", rename_all = "lowercase")]
pub enum ListStrategy {
    /// One list per content item, found or created by title
    Dynamic {
        connection_id: String,
        #[serde(default, alias = "contact_list_prefix")]
        prefix: Option<String>,
    },
    /// Fixed lists for every item of the content type
    Select {
        #[serde(default, alias = "contact_list_ids")]
        lists: Vec<ContactListRef>,
        #[serde(default, alias = "contact_list_select")]
        select_before_sending: bool,
    },
    /// Lists mapped from the item's taxonomy terms
    Taxonomy {
        #[serde(default)]
        terms: BTreeMap<TermId, Vec<ContactListRef>>,
    },
    /// Lists of a referenced item, keyed by the referenced content type
    Reference {
        #[serde(default)]
        fields: BTreeMap<ContentTypeId, FieldName>,
    },
}

impl ListStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ListStrategy::Dynamic { .. } => "dynamic",
            ListStrategy::Select { .. } => "select",
            ListStrategy::Taxonomy { .. } => "taxonomy",
            ListStrategy::Reference { .. } => "reference",
        }
    }
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

/// Mailout settings attached to a content type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailoutFieldSettings {
    #[serde(default = "default_subject")]
    pub subject: String,

    #[serde(flatten)]
    pub strategy: ListStrategy,
}

impl MailoutFieldSettings {
    pub fn new(strategy: ListStrategy) -> Self {
        Self {
            subject: default_subject(),
            strategy,
        }
    }

    /// Expand the `@type` and `@title` tokens of the subject template
    pub fn render_subject(&self, type_label: &str, title: &str) -> String {
        let template = if self.subject.trim().is_empty() {
            FALLBACK_SUBJECT
        } else {
            self.subject.as_str()
        };

        template
            .replace("@type", type_label)
            .replace("@title", title)
    }
}

/// Field settings for every content type that carries a mailout field
pub type FieldSettingsRegistry = BTreeMap<ContentTypeId, MailoutFieldSettings>;

/// Send choice made by the editor on a single submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "at", rename_all = "snake_case")]
pub enum SendRequest {
    #[default]
    NotRequested,
    Now,
    Later(DateTime<Utc>),
}

impl SendRequest {
    pub fn is_requested(&self) -> bool {
        !matches!(self, SendRequest::NotRequested)
    }

    pub fn schedule(&self) -> Option<Schedule> {
        match self {
            SendRequest::NotRequested => None,
            SendRequest::Now => Some(Schedule::Immediate),
            SendRequest::Later(at) => Some(Schedule::At(*at)),
        }
    }
}

/// Stored and submitted values of the mailout field on an item
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MailoutFieldValue {
    /// Resolved list of a dynamic item
    #[serde(default)]
    pub contact_list_ref: Option<ContactListRef>,

    #[serde(default)]
    pub send: SendRequest,

    /// Lists ticked on the submission when selecting before sending
    #[serde(default)]
    pub selected_lists: Vec<ContactListRef>,
}

/// The part of a CMS content item the mailout logic reads and writes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub content_type: ContentTypeId,
    /// Human readable content type label used in subjects
    #[serde(default)]
    pub type_label: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub terms: Vec<TermId>,
    #[serde(default)]
    pub references: BTreeMap<FieldName, ContentId>,
    #[serde(default)]
    pub mailout: MailoutFieldValue,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, content_type: impl Into<String>, title: impl Into<String>) -> Self {
        let content_type = content_type.into();
        Self {
            id: id.into(),
            type_label: content_type.clone(),
            content_type,
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Severity of a user facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Status,
    Error,
}

/// User facing status or error message produced by a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn status(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Status,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome of the after-save mailout of one content item
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MailoutReport {
    pub notices: Vec<Notice>,
    /// Campaign ids that were scheduled successfully, one per connection
    pub campaign_ids: Vec<String>,
    /// Composed HTML when template rendering replaced sending
    pub rendered_html: Option<String>,
}

impl MailoutReport {
    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(Notice::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(|n| n.is_error())
    }
}
