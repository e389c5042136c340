//! Contact signup to provider lists
//!
//! [`SubscriptionGateway`] makes the single provider call for one connection.
//! [`SubscriptionService`] sits in front of it for signup forms: it validates
//! the submission, splits the ticked lists by connection and subscribes once
//! per connection.

use crate::clients::response::{aggregate_errors, non_empty_str};
use crate::clients::EmailMarketingApi;
use crate::error::{MailoutError, Result};
use crate::services::token_manager::TokenManager;
use crate::store::ConnectionStore;
use crate::text::is_valid_email;
use mailout_types::{Connection, ContactListRef, Notice, SignupContact};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Successful signup of one contact on one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResult {
    pub contact_id: String,
    pub message: String,
}

pub struct SubscriptionGateway {
    api: Arc<dyn EmailMarketingApi>,
}

impl SubscriptionGateway {
    pub fn new(api: Arc<dyn EmailMarketingApi>) -> Self {
        Self { api }
    }

    pub async fn subscribe(&self, connection: &Connection, list_ids: &[String], contact: &SignupContact) -> Result<SubscribeResult> {
        let payload = signup_payload(list_ids, contact);

        let response = match self.api.signup_contact(&connection.access_token, &payload).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Signup of {} on connection {} failed: {}", contact.email, connection.id, e);
                return Err(MailoutError::Api(format!("Could not subscribe {}. {}", contact.email, e)));
            }
        };

        match non_empty_str(&response, "contact_id") {
            Some(contact_id) => {
                log::info!("Subscribed {} to {} lists on connection {}", contact.email, list_ids.len(), connection.id);
                Ok(SubscribeResult {
                    contact_id,
                    message: format!("The {} email is now subscribed", contact.email),
                })
            }
            None => {
                let message = format!("Could not subscribe {}. {}", contact.email, aggregate_errors(&response));
                log::error!("{}", message);
                Err(MailoutError::Api(message))
            }
        }
    }
}

/// Body of the sign-up call. Names are only sent when given.
pub fn signup_payload(list_ids: &[String], contact: &SignupContact) -> Value {
    let mut payload = json!({
        "email_address": contact.email,
        "list_memberships": list_ids,
    });

    if let Some(first_name) = &contact.first_name {
        payload["first_name"] = json!(first_name);
    }
    if let Some(last_name) = &contact.last_name {
        payload["last_name"] = json!(last_name);
    }

    payload
}

/// Which signup form fields are shown and therefore mandatory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignupFormRules {
    #[serde(default)]
    pub require_first_name: bool,
    #[serde(default)]
    pub require_last_name: bool,
    #[serde(default)]
    pub require_confirm_email: bool,
    #[serde(default)]
    pub require_lists: bool,
}

/// A submitted signup form
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignupForm {
    pub email: String,
    #[serde(default)]
    pub confirm_email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub lists: Vec<ContactListRef>,
}

impl SignupForm {
    /// Check the submission and build the contact to sign up
    pub fn validate(&self, rules: &SignupFormRules) -> Result<SignupContact> {
        let first_name = optional_field(&self.first_name);
        if rules.require_first_name && first_name.is_none() {
            return Err(MailoutError::validation("first_name", "First name is required."));
        }

        let last_name = optional_field(&self.last_name);
        if rules.require_last_name && last_name.is_none() {
            return Err(MailoutError::validation("last_name", "Last name is required."));
        }

        let email = self.email.trim();
        if email.is_empty() {
            return Err(MailoutError::validation("email", "Email is required."));
        }
        if !is_valid_email(email) {
            return Err(MailoutError::validation("email", "Email is not valid."));
        }

        if rules.require_confirm_email || self.confirm_email.is_some() {
            match self.confirm_email.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(MailoutError::validation("confirm_email", "Confirm email is required."));
                }
                Some(confirm) if confirm != email => {
                    return Err(MailoutError::validation("confirm_email", "Confirm email does not match."));
                }
                Some(_) => {}
            }
        }

        if rules.require_lists && self.lists.is_empty() {
            return Err(MailoutError::validation("lists", "Select at least one contact list."));
        }

        Ok(SignupContact {
            email: email.to_string(),
            first_name,
            last_name,
        })
    }
}

fn optional_field(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Outcome of a signup form submission across connections
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriptionOutcome {
    pub results: Vec<SubscribeResult>,
    pub notices: Vec<Notice>,
    /// All per-connection messages joined into one sentence list
    pub message: String,
}

impl SubscriptionOutcome {
    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(Notice::is_error)
    }
}

pub struct SubscriptionService {
    store: Arc<ConnectionStore>,
    tokens: Arc<TokenManager>,
    gateway: Arc<SubscriptionGateway>,
}

impl SubscriptionService {
    pub fn new(store: Arc<ConnectionStore>, tokens: Arc<TokenManager>, gateway: Arc<SubscriptionGateway>) -> Self {
        Self { store, tokens, gateway }
    }

    /// Validate the form and subscribe the contact once per connection.
    ///
    /// Validation failures return `Err` before any provider call. Failures of
    /// individual connections are reported as error notices.
    pub async fn submit(&self, form: &SignupForm, rules: &SignupFormRules) -> Result<SubscriptionOutcome> {
        let contact = form.validate(rules)?;
        if form.lists.is_empty() {
            return Err(MailoutError::validation("lists", "Select at least one contact list."));
        }

        let mut outcome = SubscriptionOutcome::default();
        let mut messages = Vec::new();

        for (connection_id, list_ids) in group_by_connection(&form.lists) {
            let connection = match self.store.require(&connection_id) {
                Ok(connection) => connection,
                Err(e) => {
                    log::error!("Signup skipped lists of connection {}: {}", connection_id, e);
                    messages.push(e.to_string());
                    outcome.notices.push(Notice::error(e.to_string()));
                    continue;
                }
            };
            let connection = self.tokens.ensure_valid(connection, false).await;

            match self.gateway.subscribe(&connection, &list_ids, &contact).await {
                Ok(result) => {
                    messages.push(result.message.clone());
                    outcome.notices.push(Notice::status(result.message.clone()));
                    outcome.results.push(result);
                }
                Err(e) => {
                    messages.push(e.to_string());
                    outcome.notices.push(Notice::error(e.to_string()));
                }
            }
        }

        outcome.message = join_sentences(&messages);
        Ok(outcome)
    }
}

/// Split refs into per-connection list ids, keeping first-seen order and
/// dropping duplicate list ids
pub fn group_by_connection(refs: &[ContactListRef]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for list_ref in refs {
        let index = match groups.iter().position(|(id, _)| *id == list_ref.connection_id) {
            Some(index) => index,
            None => {
                groups.push((list_ref.connection_id.clone(), Vec::new()));
                groups.len() - 1
            }
        };

        let list_ids = &mut groups[index].1;
        if !list_ids.contains(&list_ref.list_id) {
            list_ids.push(list_ref.list_id.clone());
        }
    }

    groups
}

fn join_sentences(messages: &[String]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let parts: Vec<&str> = messages.iter().map(|m| m.trim().trim_end_matches('.')).collect();
    format!("{}.", parts.join(". "))
}
