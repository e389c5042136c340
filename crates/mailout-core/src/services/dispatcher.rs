//! Campaign dispatch: create, attach lists, schedule
//!
//! The three provider calls run strictly in order and the first failure stops
//! the chain. Nothing is rolled back, so a failed update or schedule leaves a
//! draft campaign behind on the provider.

use crate::clients::response::{aggregate_errors, non_empty_str};
use crate::clients::EmailMarketingApi;
use crate::error::{DispatchStep, MailoutError, Result};
use crate::store::ConnectionStore;
use crate::text::decode_html_entities;
use chrono::{DateTime, FixedOffset, Utc};
use mailout_types::{CampaignRequest, Connection, Schedule};
use serde_json::{json, Value};
use std::sync::Arc;

/// Provider format type for custom-code HTML emails
pub const CUSTOM_CODE_FORMAT: u8 = 5;

/// Result of a fully scheduled campaign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub campaign_id: String,
    pub campaign_activity_id: String,
    pub list_ids: Vec<String>,
    pub message: String,
}

pub struct CampaignDispatcher {
    api: Arc<dyn EmailMarketingApi>,
    store: Arc<ConnectionStore>,
    offset: FixedOffset,
}

impl CampaignDispatcher {
    /// `offset` is the site's UTC offset used for campaign names and messages
    pub fn new(api: Arc<dyn EmailMarketingApi>, store: Arc<ConnectionStore>, offset: FixedOffset) -> Self {
        Self { api, store, offset }
    }

    pub async fn dispatch(&self, connection: &Connection, target_lists: &[String], request: &CampaignRequest) -> Result<DispatchReceipt> {
        self.dispatch_at(connection, target_lists, request, Utc::now()).await
    }

    pub async fn dispatch_at(
        &self,
        connection: &Connection,
        target_lists: &[String],
        request: &CampaignRequest,
        now: DateTime<Utc>,
    ) -> Result<DispatchReceipt> {
        let list_ids = dedup_list_ids(target_lists);
        if list_ids.is_empty() {
            return Err(MailoutError::validation("contact_list_ids", "At least one contact list is required."));
        }

        let subject = decode_html_entities(&request.subject);
        let activity = activity_body(request, &subject);
        let token = connection.access_token.as_str();

        // Step 1: create the campaign with its primary email activity
        let payload = self.campaign_payload(&subject, &activity, now);
        let created = self.api
            .create_email_campaign(token, &payload)
            .await
            .map_err(|e| step_failed(DispatchStep::Create, e))?;

        let campaign_id = non_empty_str(&created, "campaign_id")
            .ok_or_else(|| step_error(DispatchStep::Create, &created))?;
        let first_activity = &created["campaign_activities"][0];
        let (activity_id, role) = match (
            non_empty_str(first_activity, "campaign_activity_id"),
            non_empty_str(first_activity, "role"),
        ) {
            (Some(activity_id), Some(role)) => (activity_id, role),
            _ => return Err(step_error(DispatchStep::Create, &created)),
        };
        log::info!("Created campaign {} (activity {}) on connection {}", campaign_id, activity_id, connection.id);

        // Step 2: attach the contact lists
        let mut update = activity;
        update["campaign_activity_id"] = json!(activity_id);
        update["role"] = json!(role);
        update["contact_list_ids"] = json!(list_ids);

        let updated = self.api
            .update_campaign_activity(token, &activity_id, &update)
            .await
            .map_err(|e| step_failed(DispatchStep::UpdateActivity, e))?;

        if non_empty_str(&updated, "campaign_activity_id").is_none() {
            return Err(step_error(DispatchStep::UpdateActivity, &updated));
        }
        log::info!("Attached {} contact lists to activity {}", list_ids.len(), activity_id);

        // Step 3: schedule
        let scheduled = self.api
            .schedule_campaign_activity(token, &activity_id, &schedule_payload(&request.schedule))
            .await
            .map_err(|e| step_failed(DispatchStep::Schedule, e))?;

        if !is_filled(&scheduled[0]["scheduled_date"]) {
            return Err(step_error(DispatchStep::Schedule, &scheduled));
        }
        log::info!("Scheduled activity {} of campaign {}", activity_id, campaign_id);

        let message = self.confirmation(&subject, &request.schedule, &list_ids);

        Ok(DispatchReceipt {
            campaign_id,
            campaign_activity_id: activity_id,
            list_ids,
            message,
        })
    }

    /// Body of the create-campaign call; the name carries a site-local timestamp
    pub fn campaign_payload(&self, subject: &str, activity: &Value, now: DateTime<Utc>) -> Value {
        let stamp = now.with_timezone(&self.offset).format("%Y-%m-%d %H:%M:%S");

        json!({
            "name": format!("{} @ {}", subject, stamp),
            "email_campaign_activities": [activity],
        })
    }

    fn confirmation(&self, subject: &str, schedule: &Schedule, list_ids: &[String]) -> String {
        let names = self.store.list_names(list_ids).join(", ");

        match schedule {
            Schedule::Immediate => format!("The \"{}\" has been sent now to {} contact lists.", subject, names),
            Schedule::At(at) => format!(
                "The \"{}\" will be sent on {} to {} contact lists.",
                subject,
                at.with_timezone(&self.offset).format("%B %-d, %Y %-I:%M%P"),
                names
            ),
        }
    }
}

fn activity_body(request: &CampaignRequest, subject: &str) -> Value {
    json!({
        "format_type": CUSTOM_CODE_FORMAT,
        "from_email": request.sender.from_email,
        "from_name": request.sender.from_name,
        "reply_to_email": request.sender.reply_to_email,
        "subject": subject,
        "html_content": request.html_content,
    })
}

/// Body of the schedule call. `0` asks the provider to send right away.
pub fn schedule_payload(schedule: &Schedule) -> Value {
    match schedule {
        Schedule::Immediate => json!({ "scheduled_date": 0 }),
        Schedule::At(at) => json!({ "scheduled_date": at.format("%Y-%m-%dT%H:%M:%S.000Z").to_string() }),
    }
}

/// Drop duplicate and blank list ids, keeping first-seen order
pub fn dedup_list_ids(list_ids: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(list_ids.len());
    for id in list_ids {
        if !id.trim().is_empty() && !unique.contains(id) {
            unique.push(id.clone());
        }
    }
    unique
}

fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Bool(b) => *b,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn step_error(step: DispatchStep, response: &Value) -> MailoutError {
    let message = aggregate_errors(response);
    log::error!("Campaign step '{}' failed: {}", step, message);
    MailoutError::DispatchStep { step, message }
}

fn step_failed(step: DispatchStep, error: MailoutError) -> MailoutError {
    log::error!("Campaign step '{}' failed: {}", step, error);
    MailoutError::DispatchStep {
        step,
        message: error.to_string(),
    }
}
