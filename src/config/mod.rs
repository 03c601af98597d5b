use crate::api::locale::DEFAULT_LOCALE;
use crate::api::signer::DEFAULT_VERSION;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Account credentials for one marketplace
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    /// AWS access key ID
    pub access_key: String,

    /// AWS secret access key
    pub secret_key: String,

    /// Associate tag appended to every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associate_tag: Option<String>,

    /// Marketplace locale (default: us)
    #[serde(default = "default_locale")]
    pub locale: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            associate_tag: None,
            locale: default_locale(),
        }
    }

    pub fn with_associate_tag(mut self, tag: impl Into<String>) -> Self {
        self.associate_tag = Some(tag.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("associate_tag", &self.associate_tag)
            .field("locale", &self.locale)
            .finish()
    }
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

/// Client behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// API version sent when a request does not carry one
    #[serde(default = "default_version")]
    pub version: String,

    /// Maximum request rate (requests per second, 0 disables throttling)
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Endpoint override, e.g. `http://127.0.0.1:8080`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_requests_per_second() -> f64 {
    1.0
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("paapi-rs/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
            endpoint: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Named credential profiles
    #[serde(default)]
    pub profiles: HashMap<String, Credentials>,

    /// Client settings shared by all profiles
    #[serde(default)]
    pub client: ClientConfig,

    /// Profile used when none is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a profile by name, or the default profile if not specified
    pub fn get_profile(&self, name: Option<&str>) -> Option<&Credentials> {
        if let Some(name) = name {
            self.profiles.get(name)
        } else if let Some(default) = &self.default_profile {
            self.profiles.get(default)
        } else {
            self.profiles.values().next()
        }
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// - AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY (required)
/// - AWS_ASSOCIATE_TAG, AWS_PRODUCT_LOCALE (optional)
/// - PAAPI_VERSION, PAAPI_REQUESTS_PER_SECOND, PAAPI_TIMEOUT, PAAPI_ENDPOINT (optional)
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let access_key = std::env::var("AWS_ACCESS_KEY_ID")
        .context("AWS_ACCESS_KEY_ID environment variable not set")?;
    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;

    let credentials = Credentials {
        access_key,
        secret_key,
        associate_tag: std::env::var("AWS_ASSOCIATE_TAG")
            .ok()
            .filter(|t| !t.is_empty()),
        locale: std::env::var("AWS_PRODUCT_LOCALE").unwrap_or_else(|_| default_locale()),
    };

    let mut config = Config::new();
    config.profiles.insert("default".to_string(), credentials);
    config.default_profile = Some("default".to_string());

    if let Ok(version) = std::env::var("PAAPI_VERSION") {
        config.client.version = version;
    }

    if let Ok(rate) = std::env::var("PAAPI_REQUESTS_PER_SECOND") {
        config.client.requests_per_second = rate
            .parse()
            .context("PAAPI_REQUESTS_PER_SECOND must be a number")?;
    }

    if let Ok(timeout) = std::env::var("PAAPI_TIMEOUT") {
        if let Ok(val) = timeout.parse() {
            config.client.timeout_secs = val;
        }
    }

    if let Ok(endpoint) = std::env::var("PAAPI_ENDPOINT") {
        config.client.endpoint = Some(endpoint);
    }

    Ok(config)
}

/// Load configuration from file or environment
///
/// # Arguments
/// * `config_path` - Optional path to YAML config file
/// * `profile_name` - Optional profile to make the default (YAML configs only)
pub fn load_config(config_path: Option<&str>, profile_name: Option<&str>) -> Result<Config> {
    if let Some(path) = config_path {
        let mut config = load_from_yaml(path)?;

        if let Some(name) = profile_name {
            if !config.profiles.contains_key(name) {
                anyhow::bail!("Profile '{}' not found in config file", name);
            }
            config.default_profile = Some(name.to_string());
        }

        Ok(config)
    } else {
        load_from_env()
    }
}
