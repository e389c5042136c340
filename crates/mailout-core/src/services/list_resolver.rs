//! Find-or-create of contact lists keyed by name

use crate::clients::response::{aggregate_errors, non_empty_str};
use crate::clients::EmailMarketingApi;
use crate::error::{MailoutError, Result};
use mailout_types::{Connection, ContactListRef};
use serde_json::json;
use std::sync::Arc;

/// A list found or created by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedList {
    pub list_id: String,
    pub name: String,
    pub created: bool,
}

impl ResolvedList {
    pub fn list_ref(&self, connection_id: &str) -> ContactListRef {
        ContactListRef::new(connection_id, self.list_id.clone())
    }
}

/// List name for a content title, prefixed when a prefix is configured
pub fn list_title(prefix: Option<&str>, title: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}{}", prefix, title),
        _ => title.to_string(),
    }
}

/// Resolves list names to list ids, creating missing lists.
///
/// Not atomic: two concurrent resolutions of the same new title can both
/// create a list.
pub struct ContactListResolver {
    api: Arc<dyn EmailMarketingApi>,
}

impl ContactListResolver {
    pub fn new(api: Arc<dyn EmailMarketingApi>) -> Self {
        Self { api }
    }

    pub async fn resolve(&self, connection: &Connection, title: &str) -> Result<ResolvedList> {
        if title.trim().is_empty() {
            return Err(MailoutError::validation("title", "A title is required to name the contact list."));
        }

        let found = self.api
            .find_contact_list_by_name(&connection.access_token, title)
            .await
            .map_err(resolution_error)?;

        if let Some(list) = found {
            let list_id = non_empty_str(&list, "list_id").ok_or_else(|| {
                MailoutError::Resolution(format!("Contact list '{}' was returned without an id.", title))
            })?;

            log::debug!("Found contact list '{}' ({}) on connection {}", title, list_id, connection.id);
            return Ok(ResolvedList {
                list_id,
                name: non_empty_str(&list, "name").unwrap_or_else(|| title.to_string()),
                created: false,
            });
        }

        let response = self.api
            .create_contact_list(&connection.access_token, &json!({ "name": title }))
            .await
            .map_err(resolution_error)?;

        match non_empty_str(&response, "list_id") {
            Some(list_id) => {
                log::info!("Created contact list '{}' ({}) on connection {}", title, list_id, connection.id);
                Ok(ResolvedList {
                    list_id,
                    name: non_empty_str(&response, "name").unwrap_or_else(|| title.to_string()),
                    created: true,
                })
            }
            None => Err(MailoutError::Resolution(aggregate_errors(&response))),
        }
    }
}

fn resolution_error(e: MailoutError) -> MailoutError {
    match e {
        MailoutError::Resolution(_) => e,
        other => MailoutError::Resolution(other.to_string()),
    }
}
