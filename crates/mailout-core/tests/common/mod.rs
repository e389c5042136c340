//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use mailout_core::clients::ListQuery;
use mailout_core::{ConnectionStore, EmailMarketingApi, MailoutConfig, MailoutError, MailoutServices, Result};
use mailout_types::{ContactList, Connection};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Far enough in the future that tokens never expire during a test
pub const FAR_FUTURE: i64 = 4_102_444_800;

/// One call made against the fake provider
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub access_token: String,
    pub target: Option<String>,
    pub payload: Value,
}

/// In-memory provider that records calls and answers like the real API.
///
/// Responses can be scripted per method; a scripted `Err` simulates a
/// transport failure.
#[derive(Default)]
pub struct FakeProvider {
    calls: Mutex<Vec<RecordedCall>>,
    scripted: Mutex<HashMap<&'static str, VecDeque<std::result::Result<Value, String>>>>,
    lists: Mutex<Vec<Value>>,
    next_id: AtomicU64,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that already holds these `(list_id, name)` lists
    pub fn with_lists(lists: &[(&str, &str)]) -> Self {
        let provider = Self::new();
        {
            let mut stored = provider.lists.lock().unwrap();
            for (list_id, name) in lists {
                stored.push(json!({"list_id": list_id, "name": name, "membership_count": 3}));
            }
        }
        provider
    }

    /// Answer the next `method` call with `response`
    pub fn respond(&self, method: &'static str, response: Value) -> &Self {
        self.scripted.lock().unwrap().entry(method).or_default().push_back(Ok(response));
        self
    }

    /// Fail the next `method` call at the transport level
    pub fn fail(&self, method: &'static str, message: &str) -> &Self {
        self.scripted.lock().unwrap().entry(method).or_default().push_back(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|call| call.method == method).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, method: &'static str, access_token: &str, target: Option<&str>, payload: Value) {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            access_token: access_token.to_string(),
            target: target.map(str::to_string),
            payload,
        });
    }

    fn scripted(&self, method: &'static str) -> Option<Result<Value>> {
        let next = self.scripted.lock().unwrap().get_mut(method)?.pop_front()?;
        Some(next.map_err(MailoutError::Api))
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl EmailMarketingApi for FakeProvider {
    fn authorization_url(&self, api_key: &str, scope: &str, state: &str) -> Result<String> {
        Ok(format!("https://auth.test/authorize?client_id={}&scope={}&state={}", api_key, scope, state))
    }

    async fn exchange_code(&self, _api_key: &str, _secret: &str, code: &str) -> Result<Value> {
        self.record("exchange_code", "", None, json!({"code": code}));
        if let Some(response) = self.scripted("exchange_code") {
            return response;
        }
        Ok(json!({"access_token": "granted-access", "refresh_token": "granted-refresh", "expires_in": 86400}))
    }

    async fn refresh_token(&self, refresh_token: &str, _api_key: &str, _secret: &str) -> Result<Value> {
        self.record("refresh_token", "", None, json!({"refresh_token": refresh_token}));
        if let Some(response) = self.scripted("refresh_token") {
            return response;
        }
        Ok(json!({"access_token": "refreshed-access", "refresh_token": "refreshed-refresh", "expires_in": 7200}))
    }

    async fn get_all_contact_lists(&self, access_token: &str, query: &ListQuery) -> Result<Value> {
        self.record("get_all_contact_lists", access_token, None, json!(query.to_params()));
        if let Some(response) = self.scripted("get_all_contact_lists") {
            return response;
        }
        let lists = self.lists.lock().unwrap().clone();
        Ok(json!({ "lists": lists }))
    }

    async fn find_contact_list_by_name(&self, access_token: &str, name: &str) -> Result<Option<Value>> {
        self.record("find_contact_list_by_name", access_token, None, json!({"name": name}));
        if let Some(response) = self.scripted("find_contact_list_by_name") {
            return response.map(|value| (!value.is_null()).then_some(value));
        }
        Ok(self.lists.lock().unwrap().iter().find(|list| list["name"] == name).cloned())
    }

    async fn create_contact_list(&self, access_token: &str, payload: &Value) -> Result<Value> {
        self.record("create_contact_list", access_token, None, payload.clone());
        if let Some(response) = self.scripted("create_contact_list") {
            return response;
        }
        let list = json!({"list_id": format!("list-{}", self.next_id()), "name": payload["name"]});
        self.lists.lock().unwrap().push(list.clone());
        Ok(list)
    }

    async fn create_email_campaign(&self, access_token: &str, payload: &Value) -> Result<Value> {
        self.record("create_email_campaign", access_token, None, payload.clone());
        if let Some(response) = self.scripted("create_email_campaign") {
            return response;
        }
        let id = self.next_id();
        Ok(json!({
            "campaign_id": format!("campaign-{}", id),
            "campaign_activities": [{"campaign_activity_id": format!("activity-{}", id), "role": "primary_email"}]
        }))
    }

    async fn update_campaign_activity(&self, access_token: &str, campaign_activity_id: &str, payload: &Value) -> Result<Value> {
        self.record("update_campaign_activity", access_token, Some(campaign_activity_id), payload.clone());
        if let Some(response) = self.scripted("update_campaign_activity") {
            return response;
        }
        Ok(payload.clone())
    }

    async fn schedule_campaign_activity(&self, access_token: &str, campaign_activity_id: &str, payload: &Value) -> Result<Value> {
        self.record("schedule_campaign_activity", access_token, Some(campaign_activity_id), payload.clone());
        if let Some(response) = self.scripted("schedule_campaign_activity") {
            return response;
        }
        Ok(json!([{"scheduled_date": "2030-01-01T00:00:00.000Z"}]))
    }

    async fn signup_contact(&self, access_token: &str, payload: &Value) -> Result<Value> {
        self.record("signup_contact", access_token, None, payload.clone());
        if let Some(response) = self.scripted("signup_contact") {
            return response;
        }
        Ok(json!({"contact_id": "contact-1", "action": "created"}))
    }
}

/// An authorized connection whose token is valid for the whole test
pub fn connection(id: &str, lists: &[(&str, &str)]) -> Connection {
    Connection {
        id: id.to_string(),
        name: id.to_string(),
        api_key: format!("{}-key", id),
        secret: format!("{}-secret", id),
        access_token: format!("{}-access", id),
        refresh_token: format!("{}-refresh", id),
        expires: FAR_FUTURE,
        sender_from_name: "Newsroom".to_string(),
        sender_from_email: "news@example.org".to_string(),
        sender_replyto_email: String::new(),
        lists: lists
            .iter()
            .map(|(list_id, name)| ContactList {
                list_id: list_id.to_string(),
                name: name.to_string(),
                membership_count: 3,
            })
            .collect(),
    }
}

/// Configuration with the given `content_types` and `debug` sections
pub fn config(content_types: Value, debug: Value) -> MailoutConfig {
    let json = json!({
        "provider": {"redirect_uri": "https://site.example/constant-contact/authorize"},
        "site": {"base_url": "https://site.example", "utc_offset": "+00:00"},
        "debug": debug,
        "content_types": content_types,
    });
    MailoutConfig::from_json_str(&json.to_string()).expect("test config should parse")
}

/// Services over an in-memory store seeded with `connections`
pub fn services(provider: Arc<FakeProvider>, connections: Vec<Connection>, config: MailoutConfig) -> MailoutServices {
    let store = Arc::new(ConnectionStore::with_connections(connections));
    MailoutServices::with_api(config, provider, store).expect("services should build")
}
