//! Service modules for the connection and mailout flows

pub mod connection_admin;
pub mod dispatcher;
pub mod list_resolver;
pub mod subscription;
pub mod token_manager;

// Re-export service types
pub use connection_admin::{ConnectionAdmin, ConnectionForm, PendingAuthorization};
pub use dispatcher::{CampaignDispatcher, DispatchReceipt};
pub use list_resolver::{list_title, ContactListResolver, ResolvedList};
pub use subscription::{
    SignupForm,
    SignupFormRules,
    SubscribeResult,
    SubscriptionGateway,
    SubscriptionOutcome,
    SubscriptionService,
};
pub use token_manager::TokenManager;
