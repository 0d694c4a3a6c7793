//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `campaign-aggregator.toml` files. Account tables and credentials live
//! here rather than in code, so the aggregator can be built against
//! fixture accounts in tests.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::models::{AccountRef, Platform};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "campaign-aggregator.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry and pagination limits.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Meta Marketing API settings.
    #[serde(default)]
    pub meta: MetaConfig,

    /// Snapchat Marketing API settings.
    #[serde(default)]
    pub snapchat: SnapchatConfig,

    /// NewsBreak Business API settings.
    #[serde(default)]
    pub newsbreak: NewsBreakConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origins allowed by CORS. `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// `max-age` for successful aggregation responses, in seconds.
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
            cache_max_age: default_cache_max_age(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_cache_max_age() -> u64 {
    120
}

/// Upstream HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout applied to every upstream call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent sent upstream.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("campaign-aggregator/{}", env!("CARGO_PKG_VERSION"))
}

/// Retry and pagination limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per page fetch (including the first).
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Base delay in milliseconds; attempt `n` waits `base * n`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Hard cap on pages walked per account.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    600
}

fn default_max_pages() -> usize {
    200
}

/// A secret given inline or by environment variable name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Secret {
    Inline(String),
    Env { env: String },
}

impl Secret {
    /// Resolve the secret value. Empty values count as missing.
    pub fn resolve(&self) -> Option<String> {
        let value = match self {
            Secret::Inline(v) => Some(v.clone()),
            Secret::Env { env } => std::env::var(env).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Where the secret comes from, without revealing it.
    pub fn describe(&self) -> String {
        match self {
            Secret::Inline(_) => "inline value".to_string(),
            Secret::Env { env } => format!("${}", env),
        }
    }
}

/// One configured ad account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,

    #[serde(default)]
    pub label: Option<String>,

    /// Name of an entry in the platform's `tokens` table.
    #[serde(default)]
    pub credential: Option<String>,
}

/// Meta Marketing API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    #[serde(default = "default_meta_base")]
    pub graph_base: String,

    #[serde(default = "default_meta_version")]
    pub api_version: String,

    /// Long-lived system user token.
    #[serde(default = "default_meta_token")]
    pub access_token: Option<Secret>,

    /// Named tokens for accounts under other business managers.
    #[serde(default)]
    pub tokens: BTreeMap<String, Secret>,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            graph_base: default_meta_base(),
            api_version: default_meta_version(),
            access_token: default_meta_token(),
            tokens: BTreeMap::new(),
            accounts: Vec::new(),
        }
    }
}

fn default_meta_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_meta_version() -> String {
    "v19.0".to_string()
}

fn default_meta_token() -> Option<Secret> {
    Some(Secret::Env {
        env: "META_ACCESS_TOKEN".to_string(),
    })
}

/// Snapchat Marketing API settings (OAuth2 refresh flow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapchatConfig {
    #[serde(default = "default_snap_auth_base")]
    pub auth_base: String,

    #[serde(default = "default_snap_api_base")]
    pub api_base: String,

    #[serde(default = "default_snap_client_id")]
    pub client_id: Option<Secret>,

    #[serde(default = "default_snap_client_secret")]
    pub client_secret: Option<Secret>,

    #[serde(default = "default_snap_refresh_token")]
    pub refresh_token: Option<Secret>,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl Default for SnapchatConfig {
    fn default() -> Self {
        Self {
            auth_base: default_snap_auth_base(),
            api_base: default_snap_api_base(),
            client_id: default_snap_client_id(),
            client_secret: default_snap_client_secret(),
            refresh_token: default_snap_refresh_token(),
            accounts: Vec::new(),
        }
    }
}

fn default_snap_auth_base() -> String {
    "https://accounts.snapchat.com".to_string()
}

fn default_snap_api_base() -> String {
    "https://adsapi.snapchat.com".to_string()
}

fn default_snap_client_id() -> Option<Secret> {
    Some(Secret::Env {
        env: "SNAPCHAT_CLIENT_ID".to_string(),
    })
}

fn default_snap_client_secret() -> Option<Secret> {
    Some(Secret::Env {
        env: "SNAPCHAT_CLIENT_SECRET".to_string(),
    })
}

fn default_snap_refresh_token() -> Option<Secret> {
    Some(Secret::Env {
        env: "SNAPCHAT_REFRESH_TOKEN".to_string(),
    })
}

/// NewsBreak Business API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsBreakConfig {
    #[serde(default = "default_newsbreak_base")]
    pub api_base: String,

    /// Long-lived integration token.
    #[serde(default = "default_newsbreak_token")]
    pub access_token: Option<Secret>,

    #[serde(default)]
    pub tokens: BTreeMap<String, Secret>,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl Default for NewsBreakConfig {
    fn default() -> Self {
        Self {
            api_base: default_newsbreak_base(),
            access_token: default_newsbreak_token(),
            tokens: BTreeMap::new(),
            accounts: Vec::new(),
        }
    }
}

fn default_newsbreak_base() -> String {
    "https://business.newsbreak.com".to_string()
}

fn default_newsbreak_token() -> Option<Secret> {
    Some(Secret::Env {
        env: "NEWSBREAK_ACCESS_TOKEN".to_string(),
    })
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(timeout) = args.timeout {
            self.http.timeout_seconds = timeout;
        }

        if let Some(crate::cli::Command::Serve { bind: Some(ref bind) }) = args.command {
            self.server.bind = bind.clone();
        }
    }

    /// Upstream call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    /// Configured accounts for a platform, in file order.
    pub fn accounts_for(&self, platform: Platform) -> Vec<AccountRef> {
        let accounts = match platform {
            Platform::Meta => &self.meta.accounts,
            Platform::Snapchat => &self.snapchat.accounts,
            Platform::NewsBreak => &self.newsbreak.accounts,
        };

        accounts
            .iter()
            .map(|a| AccountRef {
                platform,
                account_id: a.id.clone(),
                label: a.label.clone(),
                credential_ref: a.credential.clone(),
            })
            .collect()
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.cache_max_age, 120);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 600);
        assert!(Platform::ALL
            .into_iter()
            .all(|p| config.accounts_for(p).is_empty()));
        assert_eq!(
            config.meta.access_token,
            Some(Secret::Env {
                env: "META_ACCESS_TOKEN".to_string()
            })
        );
    }

    #[test]
    fn test_parse_config() {
        let config = Config::parse(include_str!("../fixtures/accounts.toml")).unwrap();

        assert_eq!(config.server.allowed_origins, vec!["https://dash.example.com"]);
        assert_eq!(config.http.timeout_seconds, 10);

        let meta = config.accounts_for(Platform::Meta);
        assert_eq!(meta.len(), 2);
        assert_eq!(meta[0].account_id, "1111");
        assert_eq!(meta[0].label.as_deref(), Some("US Prospecting"));
        assert_eq!(meta[1].credential_ref.as_deref(), Some("second_bm"));
        assert_eq!(
            config.meta.tokens.get("second_bm"),
            Some(&Secret::Env {
                env: "META_SECOND_BM_TOKEN".to_string()
            })
        );

        assert_eq!(config.accounts_for(Platform::Snapchat).len(), 1);
        assert!(config.accounts_for(Platform::NewsBreak).is_empty());
    }

    #[test]
    fn test_secret_resolution() {
        assert_eq!(
            Secret::Inline("abc".to_string()).resolve(),
            Some("abc".to_string())
        );
        assert_eq!(Secret::Inline("  ".to_string()).resolve(), None);
        assert_eq!(
            Secret::Env {
                env: "CAMPAIGN_AGGREGATOR_TEST_UNSET_VAR".to_string()
            }
            .resolve(),
            None
        );
        assert_eq!(
            Secret::Env {
                env: "X".to_string()
            }
            .describe(),
            "$X"
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[retry]
attempts = 5

[[newsbreak.accounts]]
id = "nb-1"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 600);
        assert_eq!(config.accounts_for(Platform::NewsBreak)[0].account_id, "nb-1");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/campaign-aggregator.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[meta]"));

        let reparsed = Config::parse(&toml_str).unwrap();
        assert_eq!(reparsed.server.bind, "127.0.0.1:8080");
    }
}
