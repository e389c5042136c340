//! Constant Contact v3 REST client
//!
//! Thin transport over the endpoints the mailout flows use. Responses are
//! returned as decoded JSON whether they describe success or a provider error.

use super::provider::{EmailMarketingApi, ListQuery};
use super::response::{collect_error_messages, join_error_messages, non_empty_str};
use crate::config::ProviderConfig;
use crate::error::{MailoutError, Result};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response};
use serde_json::{json, Value};
use url::Url;

/// Page size used when searching lists by name
const FIND_BY_NAME_LIMIT: u32 = 1000;

pub struct ConstantContactClient {
    config: ProviderConfig,
    http_client: HttpClient,
}

impl ConstantContactClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MailoutError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Decode a response body, normalising error responses so they always
    /// carry at least one `error_message`
    async fn read_body(response: Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        log::warn!("Provider request failed with status {}: {}", status, text);

        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if !collect_error_messages(&body).is_empty() {
            return Ok(body);
        }

        // OAuth endpoints answer with error/error_description instead
        let message = non_empty_str(&body, "error_description")
            .or_else(|| non_empty_str(&body, "error"))
            .unwrap_or_else(|| format!("Request failed with status {}", status));

        Ok(json!({ "error_message": message }))
    }

    async fn token_request(&self, api_key: &str, secret: &str, form: &[(&str, &str)]) -> Result<Value> {
        let response = self.http_client
            .post(&self.config.token_url)
            .basic_auth(api_key, Some(secret))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;

        Self::read_body(response).await
    }

    async fn post_json(&self, access_token: &str, path: &str, payload: &Value) -> Result<Value> {
        let response = self.http_client
            .post(self.api_url(path))
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await?;

        Self::read_body(response).await
    }
}

#[async_trait]
impl EmailMarketingApi for ConstantContactClient {
    fn authorization_url(&self, api_key: &str, scope: &str, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", api_key),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope),
                ("state", state),
            ],
        )
        .map_err(|e| MailoutError::Config(format!("Invalid authorize_url: {}", e)))?;

        Ok(url.to_string())
    }

    async fn exchange_code(&self, api_key: &str, secret: &str, code: &str) -> Result<Value> {
        log::info!("Exchanging authorization code for tokens");
        self.token_request(api_key, secret, &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ]).await
    }

    async fn refresh_token(&self, refresh_token: &str, api_key: &str, secret: &str) -> Result<Value> {
        self.token_request(api_key, secret, &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]).await
    }

    async fn get_all_contact_lists(&self, access_token: &str, query: &ListQuery) -> Result<Value> {
        let response = self.http_client
            .get(self.api_url("contact_lists"))
            .bearer_auth(access_token)
            .query(&query.to_params())
            .send()
            .await?;

        Self::read_body(response).await
    }

    async fn find_contact_list_by_name(&self, access_token: &str, name: &str) -> Result<Option<Value>> {
        let query = ListQuery {
            limit: Some(FIND_BY_NAME_LIMIT),
            ..Default::default()
        };
        let body = self.get_all_contact_lists(access_token, &query).await?;

        let Some(lists) = body["lists"].as_array() else {
            let messages = collect_error_messages(&body);
            if messages.is_empty() {
                return Ok(None);
            }
            return Err(MailoutError::Api(join_error_messages(&messages)));
        };

        Ok(lists
            .iter()
            .find(|list| list["name"].as_str() == Some(name))
            .cloned())
    }

    async fn create_contact_list(&self, access_token: &str, payload: &Value) -> Result<Value> {
        self.post_json(access_token, "contact_lists", payload).await
    }

    async fn create_email_campaign(&self, access_token: &str, payload: &Value) -> Result<Value> {
        self.post_json(access_token, "emails", payload).await
    }

    async fn update_campaign_activity(&self, access_token: &str, campaign_activity_id: &str, payload: &Value) -> Result<Value> {
        let response = self.http_client
            .put(self.api_url(&format!("emails/activities/{}", campaign_activity_id)))
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await?;

        Self::read_body(response).await
    }

    async fn schedule_campaign_activity(&self, access_token: &str, campaign_activity_id: &str, payload: &Value) -> Result<Value> {
        self.post_json(access_token, &format!("emails/activities/{}/schedules", campaign_activity_id), payload).await
    }

    async fn signup_contact(&self, access_token: &str, payload: &Value) -> Result<Value> {
        self.post_json(access_token, "contacts/sign_up_form", payload).await
    }
}
