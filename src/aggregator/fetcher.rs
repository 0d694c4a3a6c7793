//! Paginated campaign fetching for a single account.

use serde_json::Value;
use tracing::{debug, warn};

use super::normalize::retain_by_status;
use super::retry::RetryPolicy;
use crate::config::RetryConfig;
use crate::error::AggregateResult;
use crate::models::{AccountRef, Campaign, StatusFilter};
use crate::platforms::{Credential, PlatformAdapter};

/// Limits applied to one account's pagination walk.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub policy: RetryPolicy,
    pub max_pages: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            max_pages: 200,
        }
    }
}

impl From<&RetryConfig> for FetchLimits {
    fn from(config: &RetryConfig) -> Self {
        Self {
            policy: RetryPolicy::from(config),
            max_pages: config.max_pages.max(1),
        }
    }
}

/// Walk every page of an account's campaign listing, in cursor order.
///
/// Each page is retried according to the policy; once a page exhausts its
/// retries the whole listing fails.
///
/// Reaching `max_pages` or a cursor that repeats ends the walk early and
/// returns the records gathered so far as a success. Only a `warn!` marks
/// the listing as partial.
pub async fn fetch_all_records(
    adapter: &dyn PlatformAdapter,
    account: &AccountRef,
    credential: &Credential,
    filter: StatusFilter,
    limits: FetchLimits,
) -> AggregateResult<Vec<Value>> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let label = format!(
            "{} account {} page {}",
            adapter.platform(),
            account.account_id,
            pages + 1
        );
        let current = cursor.as_deref();
        let page = limits
            .policy
            .run(&label, move || {
                adapter.fetch_campaign_page(account, credential, current, filter)
            })
            .await?;

        pages += 1;
        debug!("{}: {} records", label, page.records.len());
        records.extend(page.records);

        match page.next_cursor {
            None => break,
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                warn!("{}: cursor did not advance, stopping", label);
                break;
            }
            Some(_) if pages >= limits.max_pages => {
                warn!("{}: reached page limit of {}", label, limits.max_pages);
                break;
            }
            Some(next) => cursor = Some(next),
        }
    }

    Ok(records)
}

/// Fetch, normalize and status-filter one account's campaigns.
pub async fn fetch_account_campaigns(
    adapter: &dyn PlatformAdapter,
    account: &AccountRef,
    credential: &Credential,
    filter: StatusFilter,
    limits: FetchLimits,
) -> AggregateResult<Vec<Campaign>> {
    let records = fetch_all_records(adapter, account, credential, filter, limits).await?;
    let campaigns: Vec<Campaign> = records
        .iter()
        .filter_map(|raw| adapter.normalize_record(raw))
        .collect();

    Ok(retain_by_status(campaigns, filter))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::aggregator::normalize::{campaign_from_raw, MinorUnit};
    use crate::error::AggregateError;
    use crate::models::Platform;
    use crate::platforms::Page;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory adapter serving scripted pages per account.
    pub(crate) struct ScriptedAdapter {
        pub pages: Mutex<HashMap<String, VecDeque<AggregateResult<Page>>>>,
        pub names: HashMap<String, String>,
        pub requests: Mutex<Vec<(String, Option<String>)>>,
        pub credential_error: bool,
    }

    impl ScriptedAdapter {
        pub(crate) fn new() -> Self {
            Self {
                pages: Mutex::new(HashMap::new()),
                names: HashMap::new(),
                requests: Mutex::new(Vec::new()),
                credential_error: false,
            }
        }

        pub(crate) fn push_page(&self, account: &str, page: AggregateResult<Page>) {
            self.pages
                .lock()
                .unwrap()
                .entry(account.to_string())
                .or_default()
                .push_back(page);
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    pub(crate) fn page(ids: &[&str], status: &str, next: Option<&str>) -> Page {
        Page {
            records: ids
                .iter()
                .map(|id| json!({"id": id, "status": status, "daily_budget": "1000"}))
                .collect(),
            next_cursor: next.map(String::from),
        }
    }

    #[async_trait]
    impl PlatformAdapter for ScriptedAdapter {
        fn platform(&self) -> Platform {
            Platform::Meta
        }

        fn page_size(&self) -> usize {
            2
        }

        async fn resolve_credential(&self, _accounts: &[AccountRef]) -> AggregateResult<Credential> {
            if self.credential_error {
                return Err(AggregateError::credential(Platform::Meta, "exchange failed"));
            }
            Ok(Credential::shared("token"))
        }

        async fn fetch_account_name(
            &self,
            account: &AccountRef,
            _credential: &Credential,
        ) -> AggregateResult<String> {
            self.names.get(&account.account_id).cloned().ok_or_else(|| {
                AggregateError::upstream(Platform::Meta, &account.account_id, "no name")
            })
        }

        async fn fetch_campaign_page(
            &self,
            account: &AccountRef,
            _credential: &Credential,
            cursor: Option<&str>,
            _filter: StatusFilter,
        ) -> AggregateResult<Page> {
            self.requests
                .lock()
                .unwrap()
                .push((account.account_id.clone(), cursor.map(String::from)));
            self.pages
                .lock()
                .unwrap()
                .get_mut(&account.account_id)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| Ok(Page::default()))
        }

        fn normalize_record(&self, raw: &Value) -> Option<Campaign> {
            campaign_from_raw(raw, MinorUnit::Cents)
        }
    }

    pub(crate) fn account(id: &str) -> AccountRef {
        AccountRef {
            platform: Platform::Meta,
            account_id: id.to_string(),
            label: None,
            credential_ref: None,
        }
    }

    pub(crate) fn fast_limits() -> FetchLimits {
        FetchLimits {
            policy: RetryPolicy {
                attempts: 3,
                base_delay: Duration::from_millis(1),
            },
            max_pages: 50,
        }
    }

    #[tokio::test]
    async fn test_stops_when_cursor_absent() {
        let adapter = ScriptedAdapter::new();
        adapter.push_page("a", Ok(page(&["1", "2"], "ACTIVE", Some("c1"))));
        adapter.push_page("a", Ok(page(&["3", "4"], "ACTIVE", Some("c2"))));
        adapter.push_page("a", Ok(page(&["5"], "ACTIVE", None)));

        let records = fetch_all_records(
            &adapter,
            &account("a"),
            &Credential::shared("t"),
            StatusFilter::ActiveAndPaused,
            fast_limits(),
        )
        .await
        .unwrap();

        assert_eq!(records.len(), 5);
        let requests = adapter.requests.lock().unwrap().clone();
        let cursors: Vec<Option<String>> = requests.into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            cursors,
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_stops_on_repeated_cursor() {
        let adapter = ScriptedAdapter::new();
        adapter.push_page("a", Ok(page(&["1"], "ACTIVE", Some("same"))));
        adapter.push_page("a", Ok(page(&["2"], "ACTIVE", Some("same"))));
        adapter.push_page("a", Ok(page(&["3"], "ACTIVE", Some("same"))));

        let records = fetch_all_records(
            &adapter,
            &account("a"),
            &Credential::shared("t"),
            StatusFilter::All,
            fast_limits(),
        )
        .await
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(adapter.request_count(), 2);
    }

    #[tokio::test]
    async fn test_respects_page_limit() {
        let adapter = ScriptedAdapter::new();
        for i in 0..5 {
            let next = format!("c{}", i);
            adapter.push_page("a", Ok(page(&["x"], "ACTIVE", Some(next.as_str()))));
        }
        let limits = FetchLimits {
            max_pages: 3,
            ..fast_limits()
        };

        let records = fetch_all_records(
            &adapter,
            &account("a"),
            &Credential::shared("t"),
            StatusFilter::All,
            limits,
        )
        .await
        .unwrap();

        // partial data up to the cap, the rest of the script is never requested
        assert_eq!(records.len(), 3);
        assert_eq!(adapter.request_count(), 3);
        assert_eq!(adapter.pages.lock().unwrap()["a"].len(), 2);
    }

    #[tokio::test]
    async fn test_page_retried_then_succeeds() {
        let adapter = ScriptedAdapter::new();
        adapter.push_page(
            "a",
            Err(AggregateError::upstream(Platform::Meta, "a", "HTTP 502")),
        );
        adapter.push_page("a", Ok(page(&["1"], "ACTIVE", None)));

        let campaigns = fetch_account_campaigns(
            &adapter,
            &account("a"),
            &Credential::shared("t"),
            StatusFilter::ActiveAndPaused,
            fast_limits(),
        )
        .await
        .unwrap();

        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].daily_budget, Some(10));
        assert_eq!(adapter.request_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_listing() {
        let adapter = ScriptedAdapter::new();
        adapter.push_page("a", Ok(page(&["1"], "ACTIVE", Some("c1"))));
        for _ in 0..3 {
            adapter.push_page(
                "a",
                Err(AggregateError::upstream(Platform::Meta, "a", "HTTP 500")),
            );
        }

        let result = fetch_account_campaigns(
            &adapter,
            &account("a"),
            &Credential::shared("t"),
            StatusFilter::ActiveAndPaused,
            fast_limits(),
        )
        .await;

        assert!(matches!(result, Err(AggregateError::UpstreamFetch { .. })));
        assert_eq!(adapter.request_count(), 4);
    }

    #[tokio::test]
    async fn test_filters_statuses() {
        let adapter = ScriptedAdapter::new();
        let mut mixed = page(&["1", "2"], "ACTIVE", None);
        mixed.records.push(json!({"id": "3", "status": "ARCHIVED"}));
        mixed.records.push(json!({"id": "4", "status": "Paused"}));
        adapter.push_page("a", Ok(mixed));

        let campaigns = fetch_account_campaigns(
            &adapter,
            &account("a"),
            &Credential::shared("t"),
            StatusFilter::ActiveAndPaused,
            fast_limits(),
        )
        .await
        .unwrap();

        let ids: Vec<&str> = campaigns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
    }
}
