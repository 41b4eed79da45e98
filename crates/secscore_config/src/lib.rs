//! # secscore_config
//!
//! Layered settings for the gateway process: built-in TOML defaults, an
//! optional config file, then environment variables (`SECSCORE__*`), in
//! ascending precedence.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level settings handed to the composition root at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub kev: KevConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Shared secret required on `x-cron-secret` for `/api/internal/refresh-kev`.
    #[serde(default)]
    pub internal_refresh_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// CAPTCHA (Turnstile) verification is out of scope as an implementation —
/// this crate only carries the config the thin adapter needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub site_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            site_key: None,
            secret_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub remote_log_url: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            remote_log_url: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KevConfig {
    #[serde(default = "default_refresh_interval_hours")]
    pub refresh_interval_hours: f64,
    #[serde(default)]
    pub kill_switch: bool,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

impl Default for KevConfig {
    fn default() -> Self {
        Self {
            refresh_interval_hours: default_refresh_interval_hours(),
            kill_switch: false,
            cache_path: default_cache_path(),
        }
    }
}

fn default_refresh_interval_hours() -> f64 {
    6.0
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/kev-cache.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

fn default_requests_per_hour() -> u32 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

fn default_cache_capacity() -> usize {
    2_000
}

fn default_cache_ttl_seconds() -> u64 {
    24 * 60 * 60
}

const DEFAULT_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 8080

[captcha]
enabled = false

[logging]
level = "info"

[kev]
refresh_interval_hours = 6.0
kill_switch = false
cache_path = "./data/kev-cache.json"

[rate_limit]
requests_per_hour = 120

[cache]
capacity = 2000
ttl_seconds = 86400
"#;

impl Settings {
    /// Loads settings with the following precedence (highest to lowest):
    /// 1. `SECSCORE__*` environment variables (`__` as the nesting separator)
    /// 2. `config_path`, if given
    /// 3. built-in defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("SECSCORE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut settings: Settings = config.try_deserialize()?;

        if settings.internal_refresh_secret.is_none() {
            if let Ok(secret) = std::env::var("SECSCORE_INTERNAL_REFRESH_SECRET") {
                settings.internal_refresh_secret = Some(secret);
            }
        }

        Ok(settings)
    }

    /// Non-fatal sanity checks the composition root logs at startup rather
    /// than refusing to boot over — an empty secret just means anyone can
    /// trigger a refresh, which is a deployment choice, not a crate error.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.captcha.enabled
            && (self.captcha.site_key.is_none() || self.captcha.secret_key.is_none())
        {
            warnings.push("captcha.enabled is true but site_key/secret_key are unset".to_string());
        }

        if self
            .internal_refresh_secret
            .as_ref()
            .map_or(true, |s| s.is_empty())
        {
            warnings.push(
                "internal_refresh_secret is unset; /api/internal/refresh-kev will reject every \
                 request until a secret is configured"
                    .to_string(),
            );
        }

        if !(self.kev.refresh_interval_hours.is_finite() && self.kev.refresh_interval_hours > 0.0)
        {
            warnings.push(format!(
                "kev.refresh_interval_hours ({}) is not a positive finite number; the scheduler falls back to its default",
                self.kev.refresh_interval_hours
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file_or_env() {
        let settings = Settings::load(None).expect("defaults must parse");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.rate_limit.requests_per_hour, 120);
        assert_eq!(settings.cache.capacity, 2_000);
        assert_eq!(settings.kev.refresh_interval_hours, 6.0);
    }

    #[test]
    fn validate_flags_missing_captcha_keys_when_enabled() {
        let mut settings = Settings::load(None).unwrap();
        settings.captcha.enabled = true;
        let warnings = settings.validate();
        assert!(warnings.iter().any(|w| w.contains("captcha")));
    }

    #[test]
    fn validate_flags_missing_refresh_secret() {
        let settings = Settings::load(None).unwrap();
        let warnings = settings.validate();
        assert!(warnings.iter().any(|w| w.contains("internal_refresh_secret")));
    }

    #[test]
    fn validate_is_clean_with_a_refresh_secret_and_captcha_disabled() {
        let mut settings = Settings::load(None).unwrap();
        settings.internal_refresh_secret = Some("hunter2".to_string());
        assert!(settings.validate().is_empty());
    }
}
