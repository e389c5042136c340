//! Configuration management for the mailout system

use crate::error::{MailoutError, Result};
use chrono::FixedOffset;
use mailout_types::{ContactListRef, FieldSettingsRegistry, ListStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Raw configuration structure matching mailout.json
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(alias = "constant_contact")]
    pub provider: ProviderConfig,

    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub debug: RawDebugConfig,

    #[serde(default)]
    pub content_types: FieldSettingsRegistry,
}

#[derive(Debug, Default, Deserialize)]
struct RawDebugConfig {
    #[serde(default, alias = "debug_render_template")]
    pub render_template: bool,

    // Blank means "no override"
    #[serde(default, alias = "debug_sendto_contact_list")]
    pub sendto_contact_list: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailoutConfig {
    pub provider: ProviderConfig,
    pub store_path: PathBuf,
    pub site: SiteConfig,
    pub debug: DebugSettings,
    pub content_types: FieldSettingsRegistry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(alias = "base_url", default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth2 redirect URI registered with the provider application
    pub redirect_uri: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host used to absolutize relative links in mailouts
    #[serde(default)]
    pub base_url: Option<String>,

    /// Site timezone as a fixed UTC offset, e.g. "+02:00"
    #[serde(alias = "timezone", default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            utc_offset: default_utc_offset(),
        }
    }
}

impl SiteConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Global debug switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugSettings {
    /// Return the composed HTML instead of sending
    pub render_template: bool,

    /// Send every mailout to this list only
    pub sendto_contact_list: Option<ContactListRef>,
}

// Default functions
fn default_store_path() -> PathBuf {
    PathBuf::from("./connections.json")
}

fn default_api_base_url() -> String {
    "https://api.cc.email/v3".to_string()
}

fn default_authorize_url() -> String {
    "https://authz.constantcontact.com/oauth2/default/v1/authorize".to_string()
}

fn default_token_url() -> String {
    "https://authz.constantcontact.com/oauth2/default/v1/token".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

/// Parse "+HH:MM", "-HH:MM", "+HHMM" or "Z"
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    let invalid = || MailoutError::Config(format!("Invalid UTC offset '{}'", raw));

    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

impl MailoutConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MailoutError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_json_str(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw_config: RawConfig = serde_json::from_str(json)
            .map_err(|e| MailoutError::Config(format!("Failed to parse config: {}", e)))?;

        let config = Self::from_raw_config(raw_config)?;
        config.validate()?;
        Ok(config)
    }

    fn from_raw_config(raw: RawConfig) -> Result<Self> {
        let sendto_contact_list = match raw.debug.sendto_contact_list.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(value.parse::<ContactListRef>()
                .map_err(|e| MailoutError::Config(format!("debug.sendto_contact_list: {}", e)))?),
        };

        Ok(Self {
            provider: raw.provider,
            store_path: raw.store_path,
            site: raw.site,
            debug: DebugSettings {
                render_template: raw.debug.render_template,
                sendto_contact_list,
            },
            content_types: raw.content_types,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.provider.redirect_uri.trim().is_empty() {
            return Err(MailoutError::Config("Provider redirect_uri is required".to_string()));
        }

        if self.provider.api_base_url.trim().is_empty() || self.provider.token_url.trim().is_empty() {
            return Err(MailoutError::Config(
                "Provider api_base_url and token_url are required".to_string()
            ));
        }

        self.site.offset()?;

        for (content_type, settings) in &self.content_types {
            if let ListStrategy::Dynamic { connection_id, .. } = &settings.strategy {
                if connection_id.trim().is_empty() {
                    return Err(MailoutError::Config(format!(
                        "Content type '{}' uses dynamic lists but has no connection_id (required)",
                        content_type
                    )));
                }
            }
        }

        Ok(())
    }
}
