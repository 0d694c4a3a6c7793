//! Upstream ad platform adapters.
//!
//! Every platform differs in auth, pagination cursors and field names, but
//! the retry, pagination and fan-out logic is shared. Each upstream is wrapped
//! in a [`PlatformAdapter`] so the aggregator only deals with one interface.

pub mod meta;
pub mod newsbreak;
pub mod snapchat;

pub use meta::MetaAdapter;
pub use newsbreak::NewsBreakAdapter;
pub use snapchat::SnapchatAdapter;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::{Config, Secret};
use crate::error::{AggregateError, AggregateResult};
use crate::models::{AccountRef, Campaign, Platform, StatusFilter};

/// Bearer credentials resolved once per aggregation call.
#[derive(Clone, Default)]
pub struct Credential {
    default: Option<String>,
    named: BTreeMap<String, String>,
}

impl Credential {
    /// A single token shared by every account.
    pub fn shared(token: impl Into<String>) -> Self {
        Self {
            default: Some(token.into()),
            named: BTreeMap::new(),
        }
    }

    pub fn with_named(mut self, name: impl Into<String>, token: impl Into<String>) -> Self {
        self.named.insert(name.into(), token.into());
        self
    }

    /// Token to use for an account: its named credential, else the shared one.
    pub fn token_for(&self, account: &AccountRef) -> Option<&str> {
        match account.credential_ref {
            Some(ref name) => self.named.get(name).map(String::as_str),
            None => self.default.as_deref(),
        }
    }

    /// Token for an account, or an error naming what is missing.
    pub fn require(&self, account: &AccountRef) -> AggregateResult<&str> {
        self.token_for(account).ok_or_else(|| {
            let what = match account.credential_ref {
                Some(ref name) => format!("credential '{}'", name),
                None => "access token".to_string(),
            };
            AggregateError::credential(
                account.platform,
                format!("no {} configured for account {}", what, account.account_id),
            )
        })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("default", &self.default.as_ref().map(|_| "<redacted>"))
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One page of raw upstream records.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Value>,
    pub next_cursor: Option<String>,
}

/// Capability interface implemented once per upstream platform.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Which platform this adapter talks to.
    fn platform(&self) -> Platform;

    /// Maximum page size the upstream accepts.
    fn page_size(&self) -> usize;

    /// Produce credentials for the given accounts. Called once per aggregation.
    async fn resolve_credential(&self, accounts: &[AccountRef]) -> AggregateResult<Credential>;

    /// Look up the display name of an account.
    async fn fetch_account_name(
        &self,
        account: &AccountRef,
        credential: &Credential,
    ) -> AggregateResult<String>;

    /// Fetch one page of campaigns, starting at `cursor` (or the first page).
    async fn fetch_campaign_page(
        &self,
        account: &AccountRef,
        credential: &Credential,
        cursor: Option<&str>,
        filter: StatusFilter,
    ) -> AggregateResult<Page>;

    /// Map one raw record into the common campaign shape.
    fn normalize_record(&self, raw: &Value) -> Option<Campaign>;
}

/// Build the shared upstream HTTP client.
pub fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(config.http.user_agent.clone())
        .build()
        .context("Failed to create HTTP client")
}

/// Build the adapter for a platform from configuration.
pub fn build_adapter(
    platform: Platform,
    config: &Config,
    http: reqwest::Client,
) -> Arc<dyn PlatformAdapter> {
    match platform {
        Platform::Meta => Arc::new(MetaAdapter::new(config.meta.clone(), http)),
        Platform::Snapchat => Arc::new(SnapchatAdapter::new(config.snapchat.clone(), http)),
        Platform::NewsBreak => Arc::new(NewsBreakAdapter::new(config.newsbreak.clone(), http)),
    }
}

/// Resolve a long-lived token setup: one shared token plus named ones.
///
/// Fails if any account ends up with no usable token.
pub(crate) fn resolve_static_tokens(
    platform: Platform,
    shared: Option<&Secret>,
    named: &BTreeMap<String, Secret>,
    accounts: &[AccountRef],
) -> AggregateResult<Credential> {
    let mut credential = Credential {
        default: shared.and_then(Secret::resolve),
        named: BTreeMap::new(),
    };

    for (name, secret) in named {
        if let Some(token) = secret.resolve() {
            credential = credential.with_named(name.clone(), token);
        } else {
            debug!("{} credential '{}' ({}) is empty", platform, name, secret.describe());
        }
    }

    for account in accounts {
        credential.require(account)?;
    }

    Ok(credential)
}

/// Send a request and decode the JSON body, mapping failures to `UpstreamFetch`.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    platform: Platform,
    account_id: &str,
) -> AggregateResult<Value> {
    let response = request.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("cannot connect to {} API", platform.display_name())
        } else {
            format!("request failed: {}", e)
        };
        AggregateError::upstream(platform, account_id, message)
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AggregateError::upstream(
            platform,
            account_id,
            format!("HTTP {}: {}", status, truncate(&body, 200)),
        ));
    }

    response.json::<Value>().await.map_err(|e| {
        AggregateError::upstream(platform, account_id, format!("invalid JSON response: {}", e))
    })
}

/// Follow a path of object keys and return a non-empty string.
pub(crate) fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Pull the `cursor` query parameter out of a next-page link.
pub(crate) fn cursor_from_link(link: &str) -> Option<String> {
    let url = reqwest::Url::parse(link).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "cursor")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
