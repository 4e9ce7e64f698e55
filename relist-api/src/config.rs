//! Configuration loading
//!
//! Settings come from an optional `relist.toml` file layered under
//! `RELIST_`-prefixed environment variables (double underscore for
//! nesting, e.g. `RELIST_RAZORPAY__KEY_ID`). Everything has a default so
//! the server starts locally with no configuration at all — except the
//! gateway credentials, which have no sane default and stay empty.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Socket address the API server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Order currency (ISO 4217)
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Maximum transaction amount in the minor currency unit
    #[serde(default = "default_max_amount")]
    pub max_amount: i64,

    /// Payment gateway settings
    #[serde(default)]
    pub razorpay: RazorpaySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpaySettings {
    /// Gateway API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key id for basic auth
    #[serde(default)]
    pub key_id: String,

    /// API key secret for basic auth
    #[serde(default)]
    pub key_secret: String,

    /// Shared secret for callback signature verification
    #[serde(default)]
    pub webhook_secret: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RazorpaySettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            key_id: String::new(),
            key_secret: String::new(),
            webhook_secret: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("relist").required(false))
            .add_source(config::Environment::with_prefix("RELIST").separator("__"))
            .build()?
            .try_deserialize()
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_max_amount() -> i64 {
    10_000_000
}

fn default_api_url() -> String {
    "https://api.razorpay.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}
