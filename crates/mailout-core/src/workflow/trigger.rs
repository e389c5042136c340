//! Mailout trigger on content save
//!
//! Before save, dynamic content gets its contact list resolved (or created)
//! and the reference stored on the item. After save, a published item with a
//! send request is rendered and dispatched to every connection its target
//! lists belong to.

use super::traits::{ContentPublishListener, ContentRepository, MailoutRenderer};
use crate::config::DebugSettings;
use crate::error::{MailoutError, Result};
use crate::services::dispatcher::CampaignDispatcher;
use crate::services::list_resolver::{list_title, ContactListResolver};
use crate::services::subscription::group_by_connection;
use crate::services::token_manager::TokenManager;
use crate::store::ConnectionStore;
use crate::text::decode_html_entities;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use mailout_types::{
    CampaignRequest, ContactListRef, ContentItem, FieldSettingsRegistry, ListStrategy, MailoutFieldSettings,
    MailoutReport, Notice, SendRequest,
};
use std::sync::Arc;

/// Shown when a send is requested before any connection exists
pub const NO_CONNECTIONS: &str = "There are no connections. Add a connection before sending mailouts.";

pub struct MailoutTrigger {
    store: Arc<ConnectionStore>,
    tokens: Arc<TokenManager>,
    resolver: Arc<ContactListResolver>,
    dispatcher: Arc<CampaignDispatcher>,
    content: Arc<dyn ContentRepository>,
    renderer: Arc<dyn MailoutRenderer>,
    settings: FieldSettingsRegistry,
    debug: DebugSettings,
}

impl MailoutTrigger {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<ConnectionStore>,
        tokens: Arc<TokenManager>,
        resolver: Arc<ContactListResolver>,
        dispatcher: Arc<CampaignDispatcher>,
        content: Arc<dyn ContentRepository>,
        renderer: Arc<dyn MailoutRenderer>,
        settings: FieldSettingsRegistry,
        debug: DebugSettings,
    ) -> Self {
        Self {
            store,
            tokens,
            resolver,
            dispatcher,
            content,
            renderer,
            settings,
            debug,
        }
    }

    /// After-save flow with an explicit clock
    pub async fn after_save_at(&self, item: &ContentItem, was_update: bool, now: DateTime<Utc>) -> MailoutReport {
        let mut report = MailoutReport::default();

        let Some(schedule) = item.mailout.send.schedule() else {
            return report;
        };
        if !item.published {
            log::debug!("Item {} is not published, skipping mailout", item.id);
            return report;
        }

        log::info!("Mailout requested for {} item {} ({:?})", item.content_type, item.id, item.mailout.send);

        if self.store.is_empty() {
            log::error!("Mailout for item {} aborted: no connections", item.id);
            report.notices.push(Notice::error(NO_CONNECTIONS));
            return report;
        }

        if let Err(e) = validate_send_request(&item.mailout.send, now) {
            report.notices.push(Notice::error(e.to_string()));
            return report;
        }

        let Some(settings) = self.settings.get(&item.content_type) else {
            report.notices.push(Notice::error(format!(
                "Content type '{}' has no mailout settings.",
                item.content_type
            )));
            return report;
        };

        let targets = match self.target_lists(item, settings).await {
            Ok(targets) if !targets.is_empty() => targets,
            Ok(_) => {
                log::warn!("Item {} resolved to no contact lists", item.id);
                report.notices.push(Notice::error("No contact lists to send the mailout to."));
                return report;
            }
            Err(e) => {
                log::error!("Could not determine contact lists for item {}: {}", item.id, e);
                report.notices.push(Notice::error(e.to_string()));
                return report;
            }
        };

        let html = match self.renderer.render(item, !was_update) {
            Ok(html) => html,
            Err(e) => {
                log::error!("Rendering mailout for item {} failed: {}", item.id, e);
                report.notices.push(Notice::error(e.to_string()));
                return report;
            }
        };

        if self.debug.render_template {
            log::info!("Template rendering enabled, returning HTML for item {} instead of sending", item.id);
            report.rendered_html = Some(html);
            return report;
        }

        // Entity decoding happens in the dispatcher
        let subject = settings.render_subject(&item.type_label, &item.title);

        for (connection_id, list_ids) in group_by_connection(&targets) {
            let connection = match self.store.require(&connection_id) {
                Ok(connection) => connection,
                Err(e) => {
                    log::error!("Skipping lists of connection {}: {}", connection_id, e);
                    report.notices.push(Notice::error(e.to_string()));
                    continue;
                }
            };
            let connection = self.tokens.ensure_valid_at(connection, now.timestamp(), false).await;

            let request = CampaignRequest {
                subject: subject.clone(),
                html_content: html.clone(),
                sender: connection.sender(),
                schedule,
            };

            match self.dispatcher.dispatch_at(&connection, &list_ids, &request, now).await {
                Ok(receipt) => {
                    log::info!("Mailout of item {} scheduled as campaign {}", item.id, receipt.campaign_id);
                    report.campaign_ids.push(receipt.campaign_id);
                    report.notices.push(Notice::status(receipt.message));
                }
                Err(e) => {
                    log::error!("Mailout of item {} on connection {} failed: {}", item.id, connection_id, e);
                    report.notices.push(Notice::error(format!("Constant Contact: {}", e)));
                }
            }
        }

        report
    }

    /// Lists an item is sent to, debug override first
    async fn target_lists(&self, item: &ContentItem, settings: &MailoutFieldSettings) -> Result<Vec<ContactListRef>> {
        if let Some(list_ref) = &self.debug.sendto_contact_list {
            log::info!("Debug override: sending item {} to {} only", item.id, list_ref);
            return Ok(vec![list_ref.clone()]);
        }

        match &settings.strategy {
            ListStrategy::Dynamic { .. } => item
                .mailout
                .contact_list_ref
                .clone()
                .map(|list_ref| vec![list_ref])
                .ok_or_else(|| MailoutError::Resolution("Invalid contact list.".to_string())),

            ListStrategy::Select { lists, select_before_sending } => {
                if *select_before_sending {
                    Ok(item
                        .mailout
                        .selected_lists
                        .iter()
                        .filter(|list_ref| lists.contains(list_ref))
                        .cloned()
                        .collect())
                } else {
                    Ok(lists.clone())
                }
            }

            ListStrategy::Taxonomy { terms } => Ok(item
                .terms
                .iter()
                .filter_map(|term| terms.get(term))
                .flatten()
                .cloned()
                .collect()),

            ListStrategy::Reference { fields } => {
                let mut refs = Vec::new();
                for (target_type, field) in fields {
                    if let Some(target) = self.referenced_dynamic_item(item, target_type, field).await? {
                        match target.mailout.contact_list_ref {
                            Some(list_ref) => refs.push(list_ref),
                            None => log::warn!("Referenced item {} has no contact list yet", target.id),
                        }
                    }
                }
                Ok(refs)
            }
        }
    }

    /// The item referenced through `field`, when it is of `target_type` and
    /// uses dynamic lists
    async fn referenced_dynamic_item(&self, item: &ContentItem, target_type: &str, field: &str) -> Result<Option<ContentItem>> {
        let Some(target_id) = item.references.get(field) else {
            return Ok(None);
        };

        let Some(target) = self.content.load(target_id).await? else {
            log::warn!("Item {} references missing item {} through {}", item.id, target_id, field);
            return Ok(None);
        };

        if target.content_type != target_type {
            log::debug!("Referenced item {} is a {}, expected {}", target.id, target.content_type, target_type);
            return Ok(None);
        }

        let is_dynamic = matches!(
            self.settings.get(&target.content_type).map(|s| &s.strategy),
            Some(ListStrategy::Dynamic { .. })
        );

        Ok(is_dynamic.then_some(target))
    }

    /// Resolve the list of a dynamic item and store the reference on it
    async fn assign_dynamic_list(&self, item: &mut ContentItem, connection_id: &str, prefix: Option<&str>) -> Result<Option<Notice>> {
        let connection = self.store.require(connection_id)?;
        let connection = self.tokens.ensure_valid(connection, false).await;

        let resolved = self.resolver
            .resolve(&connection, &list_title(prefix, &decode_html_entities(&item.title)))
            .await?;

        item.mailout.contact_list_ref = Some(resolved.list_ref(&connection.id));

        Ok(resolved
            .created
            .then(|| Notice::status(format!("The contact list {} has been created.", resolved.name))))
    }

    async fn prepare_reference(&self, item: &ContentItem, target_type: &str, field: &str) -> Result<Option<Notice>> {
        let Some(mut target) = self.referenced_dynamic_item(item, target_type, field).await? else {
            return Ok(None);
        };
        if target.mailout.contact_list_ref.is_some() {
            return Ok(None);
        }

        let Some(ListStrategy::Dynamic { connection_id, prefix }) =
            self.settings.get(&target.content_type).map(|s| s.strategy.clone())
        else {
            return Ok(None);
        };

        let notice = self.assign_dynamic_list(&mut target, &connection_id, prefix.as_deref()).await?;
        self.content.save(&target).await?;
        log::info!("Stored contact list of referenced item {}", target.id);

        Ok(notice)
    }
}

#[async_trait]
impl ContentPublishListener for MailoutTrigger {
    async fn before_save(&self, item: &mut ContentItem) -> Vec<Notice> {
        let Some(settings) = self.settings.get(&item.content_type) else {
            return Vec::new();
        };

        match &settings.strategy {
            ListStrategy::Dynamic { connection_id, prefix } => {
                if item.mailout.contact_list_ref.is_some() {
                    return Vec::new();
                }

                match self.assign_dynamic_list(item, connection_id, prefix.as_deref()).await {
                    Ok(notice) => notice.into_iter().collect(),
                    Err(e) => {
                        log::error!("Could not resolve contact list for item {}: {}", item.id, e);
                        vec![Notice::error(e.to_string())]
                    }
                }
            }

            ListStrategy::Reference { fields } => {
                let mut notices = Vec::new();
                for (target_type, field) in fields {
                    match self.prepare_reference(item, target_type, field).await {
                        Ok(notice) => notices.extend(notice),
                        Err(e) => {
                            log::error!("Could not prepare referenced item of {} through {}: {}", item.id, field, e);
                            notices.push(Notice::error(e.to_string()));
                        }
                    }
                }
                notices
            }

            ListStrategy::Select { .. } | ListStrategy::Taxonomy { .. } => Vec::new(),
        }
    }

    async fn after_save(&self, item: &ContentItem, was_update: bool) -> MailoutReport {
        self.after_save_at(item, was_update, Utc::now()).await
    }
}

/// Reject a scheduled send that is not in the future
pub fn validate_send_request(send: &SendRequest, now: DateTime<Utc>) -> Result<()> {
    match send {
        SendRequest::Later(at) if *at <= now => Err(MailoutError::validation(
            "send_later",
            "The scheduled date and time must be in the future.",
        )),
        _ => Ok(()),
    }
}

/// Interpret a wall-clock date-time entered in the site's timezone
pub fn site_datetime(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_validate_send_request() {
        let now = Utc::now();

        assert!(validate_send_request(&SendRequest::Now, now).is_ok());
        assert!(validate_send_request(&SendRequest::Later(now + Duration::minutes(5)), now).is_ok());

        let err = validate_send_request(&SendRequest::Later(now), now).unwrap_err();
        assert!(matches!(err, MailoutError::Validation { .. }));
    }

    #[test]
    fn test_site_datetime_applies_offset() {
        let naive = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap().and_hms_opt(17, 30, 0).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();

        let at = site_datetime(naive, offset).unwrap();
        assert_eq!(at.to_rfc3339(), "2024-06-05T15:30:00+00:00");
    }
}
