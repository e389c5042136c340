//! Provider seam: the operations the mailout flows need from the
//! email marketing API, independent of transport

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// OAuth scope requested for every connection; `offline_access` yields refresh tokens
pub const CONNECTION_SCOPE: &str = "contact_data campaign_data offline_access";

/// Query parameters for fetching a list snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub include_count: bool,
    pub status: Option<String>,
    pub include_membership_count: Option<String>,
    pub limit: Option<u32>,
}

impl ListQuery {
    /// Active lists with membership counts, single page
    pub fn active_with_counts() -> Self {
        Self {
            include_count: true,
            status: Some("active".to_string()),
            include_membership_count: Some("all".to_string()),
            limit: None,
        }
    }

    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if self.include_count {
            params.push(("include_count", "true".to_string()));
        }
        if let Some(status) = &self.status {
            params.push(("status", status.clone()));
        }
        if let Some(count) = &self.include_membership_count {
            params.push(("include_membership_count", count.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// Email marketing provider operations.
///
/// Every call returns the decoded response body, including provider error
/// bodies; only transport and decoding failures are `Err`. Callers inspect
/// the body for the fields they need and aggregate `error_message`s otherwise.
#[async_trait]
pub trait EmailMarketingApi: Send + Sync {
    /// URL the admin is redirected to for the authorization-code grant
    fn authorization_url(&self, api_key: &str, scope: &str, state: &str) -> Result<String>;

    /// Exchange an authorization code for access and refresh tokens
    async fn exchange_code(&self, api_key: &str, secret: &str, code: &str) -> Result<Value>;

    /// Refresh-token grant
    async fn refresh_token(&self, refresh_token: &str, api_key: &str, secret: &str) -> Result<Value>;

    /// One page of contact lists: `{"lists": [...]}`
    async fn get_all_contact_lists(&self, access_token: &str, query: &ListQuery) -> Result<Value>;

    /// The first list whose name matches `name`, if any
    async fn find_contact_list_by_name(&self, access_token: &str, name: &str) -> Result<Option<Value>>;

    async fn create_contact_list(&self, access_token: &str, payload: &Value) -> Result<Value>;

    async fn create_email_campaign(&self, access_token: &str, payload: &Value) -> Result<Value>;

    async fn update_campaign_activity(&self, access_token: &str, campaign_activity_id: &str, payload: &Value) -> Result<Value>;

    async fn schedule_campaign_activity(&self, access_token: &str, campaign_activity_id: &str, payload: &Value) -> Result<Value>;

    /// Create or update a contact and add it to lists
    async fn signup_contact(&self, access_token: &str, payload: &Value) -> Result<Value>;
}
