use crate::application_port::{AuthConfig, SecretKey};
use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub log: Log,
    pub store: Store,
}

#[derive(Deserialize)]
pub struct Auth {
    pub secret_key: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_blacklist_ttl_secs")]
    pub blacklist_ttl_secs: u64,
}

// Keeps the secret out of the startup log line.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("secret_key", &"..")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("blacklist_ttl_secs", &self.blacklist_ttl_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub tls: Option<Tls>,
}

#[derive(Debug, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "real"
    pub mysql_dsn: Option<String>,
    pub redis_dsn: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_access_ttl_secs() -> u64 {
    5 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_blacklist_ttl_secs() -> u64 {
    60 * 60
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_key_prefix() -> String {
    "turnstile".to_string()
}

impl Auth {
    pub fn to_config(&self) -> Result<AuthConfig> {
        let config = AuthConfig::new(SecretKey::new(self.secret_key.as_bytes()))
            .access_ttl(Duration::from_secs(self.access_ttl_secs))
            .refresh_ttl(Duration::from_secs(self.refresh_ttl_secs))
            .blacklist_ttl(Duration::from_secs(self.blacklist_ttl_secs));
        config.validate().map_err(|e| anyhow!(e))?;
        Ok(config)
    }
}

impl Http {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// File first, then `TURNSTILE__<SECTION>__<KEY>` environment overrides
/// (e.g. `TURNSTILE__AUTH__SECRET_KEY`).
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("TURNSTILE").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
