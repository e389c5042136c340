//! Access token lifecycle for provider connections
//!
//! Every flow passes its connection through [`TokenManager::ensure_valid`]
//! before calling the provider. Expired tokens are refreshed with the
//! refresh-token grant and the updated connection is written back to the store.

use crate::clients::response::{aggregate_errors, non_empty_str};
use crate::clients::{EmailMarketingApi, ListQuery};
use crate::error::{MailoutError, Result};
use crate::store::ConnectionStore;
use chrono::Utc;
use mailout_types::{ContactList, Connection};
use serde_json::Value;
use std::sync::Arc;

pub struct TokenManager {
    api: Arc<dyn EmailMarketingApi>,
    store: Arc<ConnectionStore>,
}

impl TokenManager {
    pub fn new(api: Arc<dyn EmailMarketingApi>, store: Arc<ConnectionStore>) -> Self {
        Self { api, store }
    }

    /// Return `connection` with a usable access token, refreshing when expired or forced
    pub async fn ensure_valid(&self, connection: Connection, force: bool) -> Connection {
        self.ensure_valid_at(connection, Utc::now().timestamp(), force).await
    }

    /// Same as [`ensure_valid`](Self::ensure_valid) with an explicit clock.
    ///
    /// A failed refresh is not retried; the connection comes back unchanged and
    /// the caller's next provider call fails with an ordinary API error.
    pub async fn ensure_valid_at(&self, connection: Connection, now: i64, force: bool) -> Connection {
        if !force && !connection.is_expired_at(now) {
            log::debug!(
                "Access token for connection {} still valid (expires at {})",
                connection.id, connection.expires
            );
            return connection;
        }

        if force {
            log::info!("Force refresh requested for connection {}", connection.id);
        } else {
            log::info!("Access token for connection {} expired at {}, refreshing", connection.id, connection.expires);
        }

        match self.refresh_at(&connection, now).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                log::warn!("Token refresh for connection {} failed: {}", connection.id, e);
                connection
            }
        }
    }

    /// Run the refresh-token grant and persist the result
    pub async fn refresh_at(&self, connection: &Connection, now: i64) -> Result<Connection> {
        let response = self.api
            .refresh_token(&connection.refresh_token, &connection.api_key, &connection.secret)
            .await?;

        let mut refreshed = connection.clone();
        apply_token_response(&mut refreshed, &response, now)?;

        match self.fetch_lists(&refreshed).await {
            Ok(lists) if !lists.is_empty() => refreshed.lists = lists,
            Ok(_) => log::debug!("Connection {} returned no active lists, keeping snapshot", refreshed.id),
            Err(e) => log::warn!("Failed to refresh list snapshot for connection {}: {}", refreshed.id, e),
        }

        if let Err(e) = self.store.upsert(refreshed.clone()) {
            log::error!("Failed to save refreshed connection {}: {}", refreshed.id, e);
        }

        log::info!("Refreshed access token for connection {} (expires at {})", refreshed.id, refreshed.expires);
        Ok(refreshed)
    }

    /// Fetch the active lists of a connection with membership counts.
    ///
    /// Only the provider's first page is read.
    pub async fn fetch_lists(&self, connection: &Connection) -> Result<Vec<ContactList>> {
        let body = self.api
            .get_all_contact_lists(&connection.access_token, &ListQuery::active_with_counts())
            .await?;

        let Some(lists) = body["lists"].as_array() else {
            return Err(MailoutError::Api(aggregate_errors(&body)));
        };

        Ok(lists
            .iter()
            .filter_map(|list| match serde_json::from_value::<ContactList>(list.clone()) {
                Ok(list) => Some(list),
                Err(e) => {
                    log::debug!("Skipping malformed contact list entry: {}", e);
                    None
                }
            })
            .collect())
    }
}

/// Copy tokens and expiry from a token-endpoint response onto `connection`.
///
/// Leaves `connection` untouched and fails when no access token came back.
pub fn apply_token_response(connection: &mut Connection, response: &Value, now: i64) -> Result<()> {
    let Some(access_token) = non_empty_str(response, "access_token") else {
        return Err(MailoutError::Auth(token_error_message(response)));
    };

    connection.access_token = access_token;
    if let Some(refresh_token) = non_empty_str(response, "refresh_token") {
        connection.refresh_token = refresh_token;
    }
    connection.expires = now.saturating_add(expires_in(response).saturating_abs());

    Ok(())
}

fn expires_in(response: &Value) -> i64 {
    match &response["expires_in"] {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Best error text of a token-endpoint response
pub fn token_error_message(response: &Value) -> String {
    non_empty_str(response, "error_message")
        .or_else(|| non_empty_str(response, "error_description"))
        .unwrap_or_else(|| "Something went wrong.".to_string())
}
