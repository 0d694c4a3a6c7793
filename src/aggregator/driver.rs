//! Aggregation driver.
//!
//! Resolves accounts and credentials for one platform, fans out across the
//! accounts concurrently and assembles the [`PlatformResult`].

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::fetcher::{fetch_account_campaigns, FetchLimits};
use crate::config::Config;
use crate::error::AggregateResult;
use crate::models::{AccountRef, AccountResult, Platform, PlatformResult, StatusFilter};
use crate::platforms::{build_adapter, http_client, Credential, PlatformAdapter};

/// Aggregates campaigns for one platform per call.
pub struct Aggregator {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
    accounts: HashMap<Platform, Vec<AccountRef>>,
    limits: FetchLimits,
}

impl Aggregator {
    /// Build an aggregator with the real upstream adapters.
    pub fn new(config: &Config) -> Result<Self> {
        let http = http_client(config)?;
        let adapters = Platform::ALL
            .into_iter()
            .map(|p| (p, build_adapter(p, config, http.clone())))
            .collect();

        Ok(Self::with_adapters(config, adapters))
    }

    /// Build an aggregator over the given adapters (used with fakes in tests).
    pub fn with_adapters(
        config: &Config,
        adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
    ) -> Self {
        let accounts = Platform::ALL
            .into_iter()
            .map(|p| (p, config.accounts_for(p)))
            .collect();

        Self {
            adapters,
            accounts,
            limits: FetchLimits::from(&config.retry),
        }
    }

    /// Platforms with at least one configured account.
    pub fn configured_platforms(&self) -> Vec<(Platform, usize)> {
        Platform::ALL
            .into_iter()
            .map(|p| (p, self.accounts.get(&p).map(Vec::len).unwrap_or(0)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    /// Aggregate every configured account of `platform`.
    ///
    /// Unknown platforms and credential failures fail the whole call. Account
    /// listing failures are recorded on the account entry instead.
    pub async fn aggregate(
        &self,
        platform: &str,
        filter: StatusFilter,
    ) -> AggregateResult<PlatformResult> {
        let platform: Platform = platform.parse()?;
        let accounts = self.accounts.get(&platform).cloned().unwrap_or_default();

        if accounts.is_empty() {
            info!("No {} accounts configured", platform);
            return Ok(PlatformResult::empty(platform));
        }

        let adapter = self.adapters.get(&platform).cloned().ok_or_else(|| {
            anyhow::anyhow!("no adapter registered for platform {}", platform)
        })?;

        let start = Instant::now();
        info!(
            "Aggregating {} campaigns across {} accounts",
            platform,
            accounts.len()
        );

        // One credential for every account in this call
        let credential = adapter.resolve_credential(&accounts).await?;

        let tasks = accounts
            .iter()
            .map(|account| self.process_account(adapter.as_ref(), account, &credential, filter));
        let results: BTreeMap<String, AccountResult> = join_all(tasks).await.into_iter().collect();

        let result = PlatformResult::assemble(platform, results, Utc::now());
        info!(
            "Aggregated {} {} campaigns ({} failed accounts) in {:.1}s",
            result.total_campaigns,
            platform,
            result.failed_accounts(),
            start.elapsed().as_secs_f64()
        );

        Ok(result)
    }

    /// Fetch name and campaigns for one account. Never fails: errors become
    /// an inline annotation on the account entry.
    async fn process_account(
        &self,
        adapter: &dyn PlatformAdapter,
        account: &AccountRef,
        credential: &Credential,
        filter: StatusFilter,
    ) -> (String, AccountResult) {
        let (name, campaigns) = tokio::join!(
            adapter.fetch_account_name(account, credential),
            fetch_account_campaigns(adapter, account, credential, filter, self.limits),
        );

        let account_name = name.unwrap_or_else(|e| {
            warn!("Name lookup failed, using fallback: {}", e);
            account.fallback_name()
        });

        let entry = match campaigns {
            Ok(campaigns) => AccountResult::ok(account_name, account.label.clone(), campaigns),
            Err(e) => {
                warn!("Campaign listing failed: {}", e);
                AccountResult::failed(account_name, account.label.clone(), e.account_message())
            }
        };

        (account.account_id.clone(), entry)
    }
}
