//! Administration of provider connections
//!
//! Adding or editing a connection stores its credentials and hands back the
//! provider's authorization URL. The OAuth callback then arrives at
//! [`ConnectionAdmin::authorize`] with the connection id as `state`.

use crate::clients::provider::CONNECTION_SCOPE;
use crate::clients::response::non_empty_str;
use crate::clients::EmailMarketingApi;
use crate::error::{MailoutError, Result};
use crate::services::token_manager::{apply_token_response, token_error_message, TokenManager};
use crate::store::ConnectionStore;
use crate::text::{is_valid_email, machine_name};
use chrono::Utc;
use mailout_types::Connection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Admin input for a connection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionForm {
    pub name: String,
    pub api_key: String,
    pub secret: String,
    #[serde(default)]
    pub sender_from_name: String,
    #[serde(default)]
    pub sender_from_email: String,
    #[serde(default)]
    pub sender_replyto_email: String,
}

impl ConnectionForm {
    fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            api_key: self.api_key.trim().to_string(),
            secret: self.secret.trim().to_string(),
            sender_from_name: self.sender_from_name.trim().to_string(),
            sender_from_email: self.sender_from_email.trim().to_string(),
            sender_replyto_email: self.sender_replyto_email.trim().to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [("name", &self.name), ("api_key", &self.api_key), ("secret", &self.secret)] {
            if value.is_empty() {
                return Err(MailoutError::validation(field, format!("{} is required.", field)));
            }
        }

        if !self.sender_from_email.is_empty() && !is_valid_email(&self.sender_from_email) {
            return Err(MailoutError::validation("sender_from_email", "Sender email is not valid."));
        }
        if !self.sender_replyto_email.is_empty() && !is_valid_email(&self.sender_replyto_email) {
            return Err(MailoutError::validation("sender_replyto_email", "Reply-to email is not valid."));
        }

        Ok(())
    }

    fn apply_to(self, connection: &mut Connection) {
        connection.name = self.name;
        connection.api_key = self.api_key;
        connection.secret = self.secret;
        connection.sender_from_name = self.sender_from_name;
        connection.sender_from_email = self.sender_from_email;
        connection.sender_replyto_email = self.sender_replyto_email;
    }
}

/// A stored connection waiting for the operator to grant access
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAuthorization {
    pub connection_id: String,
    pub authorization_url: String,
}

pub struct ConnectionAdmin {
    api: Arc<dyn EmailMarketingApi>,
    store: Arc<ConnectionStore>,
    tokens: Arc<TokenManager>,
}

impl ConnectionAdmin {
    pub fn new(api: Arc<dyn EmailMarketingApi>, store: Arc<ConnectionStore>, tokens: Arc<TokenManager>) -> Self {
        Self { api, store, tokens }
    }

    /// Store a new connection and return where to authorize it
    pub fn add(&self, form: &ConnectionForm) -> Result<PendingAuthorization> {
        let form = form.trimmed();
        form.validate()?;

        let id = machine_name(&form.name);
        if self.store.contains(&id) {
            return Err(MailoutError::validation("name", format!("A connection with the id '{}' already exists.", id)));
        }

        let mut connection = Connection {
            id: id.clone(),
            ..Default::default()
        };
        form.apply_to(&mut connection);
        self.store.upsert(connection.clone())?;

        log::info!("Added connection {}", id);
        self.pending(&connection)
    }

    /// Replace credentials and sender details of an existing connection.
    ///
    /// The id never changes, even when the name does.
    pub fn edit(&self, id: &str, form: &ConnectionForm) -> Result<PendingAuthorization> {
        let mut connection = self.store.require(id)?;
        let form = form.trimmed();
        form.validate()?;

        let renamed_id = machine_name(&form.name);
        if renamed_id != id && self.store.contains(&renamed_id) {
            return Err(MailoutError::validation("name", format!("A connection with the id '{}' already exists.", renamed_id)));
        }

        form.apply_to(&mut connection);
        self.store.upsert(connection.clone())?;

        log::info!("Updated connection {}", id);
        self.pending(&connection)
    }

    fn pending(&self, connection: &Connection) -> Result<PendingAuthorization> {
        Ok(PendingAuthorization {
            connection_id: connection.id.clone(),
            authorization_url: self.api.authorization_url(&connection.api_key, CONNECTION_SCOPE, &connection.id)?,
        })
    }

    /// Handle the OAuth callback for the connection named by `state`
    pub async fn authorize(&self, state: &str, code: &str) -> Result<Connection> {
        self.authorize_at(state, code, Utc::now().timestamp()).await
    }

    pub async fn authorize_at(&self, state: &str, code: &str, now: i64) -> Result<Connection> {
        let connection = self.store.require(state)?;

        let response = self.api
            .exchange_code(&connection.api_key, &connection.secret, code)
            .await?;

        if non_empty_str(&response, "refresh_token").is_none() {
            let message = token_error_message(&response);
            log::error!("Authorization of connection {} failed: {}", connection.id, message);
            return Err(MailoutError::Auth(message));
        }

        let mut authorized = connection;
        apply_token_response(&mut authorized, &response, now)?;

        match self.tokens.fetch_lists(&authorized).await {
            Ok(lists) => authorized.lists = lists,
            Err(e) => log::warn!("Authorized connection {} but could not fetch lists: {}", authorized.id, e),
        }

        self.store.upsert(authorized.clone())?;
        log::info!("Authorized connection {} with {} contact lists", authorized.id, authorized.lists.len());

        Ok(authorized)
    }

    pub fn delete(&self, id: &str) -> Result<Connection> {
        let removed = self.store.remove(id)?.ok_or_else(|| MailoutError::missing_connection(id))?;
        log::info!("Deleted connection {}", id);
        Ok(removed)
    }
}
