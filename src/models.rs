//! Data models for the campaign aggregator.
//!
//! This module contains the core data structures shared by the platform
//! adapters, the aggregation driver, the HTTP layer and the reports.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AggregateError;

/// Upstream advertising platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Meta,
    Snapchat,
    NewsBreak,
}

impl Platform {
    /// All supported platforms, in display order.
    pub const ALL: [Platform; 3] = [Platform::Meta, Platform::Snapchat, Platform::NewsBreak];

    /// Wire identifier used in query strings and responses.
    pub fn id(&self) -> &'static str {
        match self {
            Platform::Meta => "meta",
            Platform::Snapchat => "snapchat",
            Platform::NewsBreak => "newsbreak",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Meta => "Meta",
            Platform::Snapchat => "Snapchat",
            Platform::NewsBreak => "NewsBreak",
        }
    }

    /// Comma-separated list of accepted identifiers, for error messages.
    pub fn expected_ids() -> String {
        Self::ALL
            .iter()
            .map(|p| p.id())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for Platform {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "meta" | "facebook" => Ok(Platform::Meta),
            "snapchat" | "snap" => Ok(Platform::Snapchat),
            "newsbreak" | "news_break" => Ok(Platform::NewsBreak),
            _ => Err(AggregateError::UnsupportedPlatform(s.to_string())),
        }
    }
}

/// Which campaign statuses to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// Keep only ACTIVE and PAUSED campaigns.
    #[default]
    ActiveAndPaused,
    /// Keep every campaign regardless of status.
    All,
}

impl StatusFilter {
    /// Parse the optional `status` query parameter. Only `all` bypasses the filter.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("all") => StatusFilter::All,
            _ => StatusFilter::ActiveAndPaused,
        }
    }

    pub fn includes_all(&self) -> bool {
        matches!(self, StatusFilter::All)
    }

    /// Whether a campaign with this status passes the filter.
    pub fn retains(&self, status: &CampaignStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::ActiveAndPaused => {
                matches!(status, CampaignStatus::Active | CampaignStatus::Paused)
            }
        }
    }
}

/// One upstream ad account under one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub platform: Platform,
    pub account_id: String,
    pub label: Option<String>,
    /// Named per-account credential (key into the platform's token table).
    pub credential_ref: Option<String>,
}

impl AccountRef {
    /// Name to show when the upstream account lookup fails.
    pub fn fallback_name(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.account_id.clone())
    }
}

/// Normalized campaign status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CampaignStatus {
    Active,
    Paused,
    /// Any other upstream status, kept verbatim.
    Other(String),
}

impl CampaignStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Paused => "PAUSED",
            CampaignStatus::Other(raw) => raw,
        }
    }
}

impl From<&str> for CampaignStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => CampaignStatus::Active,
            "PAUSED" => CampaignStatus::Paused,
            _ => CampaignStatus::Other(s.to_string()),
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for CampaignStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CampaignStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(CampaignStatus::from(raw.as_str()))
    }
}

/// A campaign in the common shape shared by all platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: Option<String>,
    pub status: CampaignStatus,
    pub objective: Option<String>,
    /// Daily budget in whole major currency units.
    pub daily_budget: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Campaigns (or the failure) for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResult {
    pub account_name: String,
    pub campaigns: Vec<Campaign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccountResult {
    /// Creates a successful account result.
    pub fn ok(account_name: String, label: Option<String>, campaigns: Vec<Campaign>) -> Self {
        Self {
            account_name,
            campaigns,
            label,
            error: None,
        }
    }

    /// Creates a failed account result with no campaigns.
    pub fn failed(account_name: String, label: Option<String>, error: String) -> Self {
        Self {
            account_name,
            campaigns: Vec::new(),
            label,
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// The aggregated response for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: Platform,
    pub accounts: BTreeMap<String, AccountResult>,
    pub total_campaigns: usize,
    pub fetched_at: String,
}

impl PlatformResult {
    /// Assembles a result, computing the total from the account entries.
    pub fn assemble(
        platform: Platform,
        accounts: BTreeMap<String, AccountResult>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let total_campaigns = accounts.values().map(|a| a.campaigns.len()).sum();
        Self {
            platform,
            accounts,
            total_campaigns,
            fetched_at: fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Creates an empty result (no configured accounts).
    pub fn empty(platform: Platform) -> Self {
        Self::assemble(platform, BTreeMap::new(), Utc::now())
    }

    /// Number of accounts whose listing failed.
    pub fn failed_accounts(&self) -> usize {
        self.accounts.values().filter(|a| a.is_failed()).count()
    }

    /// Campaign counts keyed by status string.
    pub fn status_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for campaign in self.accounts.values().flat_map(|a| &a.campaigns) {
            *counts.entry(campaign.status.to_string()).or_insert(0) += 1;
        }
        counts
    }
}
