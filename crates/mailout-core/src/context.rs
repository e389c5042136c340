//! Wiring of the services around one provider client and one store

use crate::clients::{ConstantContactClient, EmailMarketingApi};
use crate::config::MailoutConfig;
use crate::error::Result;
use crate::services::{
    CampaignDispatcher, ConnectionAdmin, ContactListResolver, SubscriptionGateway, SubscriptionService, TokenManager,
};
use crate::store::ConnectionStore;
use crate::workflow::{ContentRepository, HtmlMailoutRenderer, MailoutRenderer, MailoutTrigger};
use std::sync::Arc;

/// Every service, sharing the same provider client and connection store
pub struct MailoutServices {
    pub store: Arc<ConnectionStore>,
    pub tokens: Arc<TokenManager>,
    pub resolver: Arc<ContactListResolver>,
    pub dispatcher: Arc<CampaignDispatcher>,
    pub subscriptions: Arc<SubscriptionService>,
    pub admin: ConnectionAdmin,
    config: MailoutConfig,
}

impl MailoutServices {
    /// Build services talking to the configured provider, with the store on disk
    pub fn from_config(config: MailoutConfig) -> Result<Self> {
        let api: Arc<dyn EmailMarketingApi> = Arc::new(ConstantContactClient::new(config.provider.clone())?);
        let store = Arc::new(ConnectionStore::open(&config.store_path)?);
        Self::with_api(config, api, store)
    }

    pub fn with_api(config: MailoutConfig, api: Arc<dyn EmailMarketingApi>, store: Arc<ConnectionStore>) -> Result<Self> {
        let offset = config.site.offset()?;

        let tokens = Arc::new(TokenManager::new(api.clone(), store.clone()));
        let resolver = Arc::new(ContactListResolver::new(api.clone()));
        let dispatcher = Arc::new(CampaignDispatcher::new(api.clone(), store.clone(), offset));
        let gateway = Arc::new(SubscriptionGateway::new(api.clone()));
        let subscriptions = Arc::new(SubscriptionService::new(store.clone(), tokens.clone(), gateway));
        let admin = ConnectionAdmin::new(api, store.clone(), tokens.clone());

        Ok(Self {
            store,
            tokens,
            resolver,
            dispatcher,
            subscriptions,
            admin,
            config,
        })
    }

    pub fn config(&self) -> &MailoutConfig {
        &self.config
    }

    /// Trigger using the default HTML renderer
    pub fn trigger(&self, content: Arc<dyn ContentRepository>) -> MailoutTrigger {
        let renderer: Arc<dyn MailoutRenderer> = Arc::new(HtmlMailoutRenderer::new(self.config.site.base_url.clone()));
        self.trigger_with_renderer(content, renderer)
    }

    pub fn trigger_with_renderer(&self, content: Arc<dyn ContentRepository>, renderer: Arc<dyn MailoutRenderer>) -> MailoutTrigger {
        MailoutTrigger::new(
            self.store.clone(),
            self.tokens.clone(),
            self.resolver.clone(),
            self.dispatcher.clone(),
            content,
            renderer,
            self.config.content_types.clone(),
            self.config.debug.clone(),
        )
    }
}
