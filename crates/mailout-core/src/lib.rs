//! Mailout Core Library
//!
//! Connection lifecycle and campaign dispatch for an email marketing provider:
//! OAuth token handling, contact list resolution, campaign creation and
//! scheduling, contact signup, and the content-save trigger tying them together.

pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod services;
pub mod store;
pub mod text;
pub mod workflow;

// Re-export main types for easy access
pub use config::{DebugSettings, MailoutConfig, ProviderConfig, SiteConfig};
pub use context::MailoutServices;
pub use error::{DispatchStep, MailoutError, Result};
pub use store::ConnectionStore;

// Re-export client types
pub use clients::{ConstantContactClient, EmailMarketingApi, ListQuery};

// Re-export service types
pub use services::{
    CampaignDispatcher,
    ConnectionAdmin,
    ConnectionForm,
    ContactListResolver,
    DispatchReceipt,
    PendingAuthorization,
    ResolvedList,
    SignupForm,
    SignupFormRules,
    SubscribeResult,
    SubscriptionGateway,
    SubscriptionOutcome,
    SubscriptionService,
    TokenManager,
};

// Re-export workflow types
pub use workflow::{
    ContentPublishListener,
    ContentRepository,
    HtmlMailoutRenderer,
    InMemoryContentRepository,
    JsonContentRepository,
    MailoutRenderer,
    MailoutTrigger,
};
