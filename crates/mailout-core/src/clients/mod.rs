//! Client modules for the email marketing provider

pub mod provider;
pub mod response;
pub mod constant_contact;

// Re-export all client types
pub use provider::{EmailMarketingApi, ListQuery};
pub use constant_contact::ConstantContactClient;
