//! Meta Marketing API adapter.
//!
//! Uses a long-lived system user token (optionally one per business manager)
//! and walks `paging.cursors.after` while `paging.next` is present.

use async_trait::async_trait;
use serde_json::Value;

use super::{resolve_static_tokens, send_json, str_at, Credential, Page, PlatformAdapter};
use crate::aggregator::normalize::{campaign_from_raw, MinorUnit};
use crate::config::MetaConfig;
use crate::error::{AggregateError, AggregateResult};
use crate::models::{AccountRef, Campaign, Platform, StatusFilter};

const PAGE_SIZE: usize = 500;
const CAMPAIGN_FIELDS: &str =
    "id,name,status,effective_status,objective,daily_budget,created_time,updated_time";

pub struct MetaAdapter {
    config: MetaConfig,
    http: reqwest::Client,
}

impl MetaAdapter {
    pub fn new(config: MetaConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// `act_<id>` node URL; accepts ids with or without the prefix.
    fn account_url(&self, account_id: &str) -> String {
        let id = account_id.trim_start_matches("act_");
        format!(
            "{}/{}/act_{}",
            self.config.graph_base.trim_end_matches('/'),
            self.config.api_version,
            id
        )
    }

    /// Graph API errors come back as `{"error": {"message": ..}}`.
    fn check_graph_error(body: &Value, account_id: &str) -> AggregateResult<()> {
        match str_at(body, &["error", "message"]) {
            Some(message) => Err(AggregateError::upstream(Platform::Meta, account_id, message)),
            None => Ok(()),
        }
    }
}

/// Meta only has a next page when `paging.next` is set; `cursors.after` is
/// present even on the last page.
pub(crate) fn next_cursor(body: &Value) -> Option<String> {
    str_at(body, &["paging", "next"])?;
    str_at(body, &["paging", "cursors", "after"])
}

#[async_trait]
impl PlatformAdapter for MetaAdapter {
    fn platform(&self) -> Platform {
        Platform::Meta
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    async fn resolve_credential(&self, accounts: &[AccountRef]) -> AggregateResult<Credential> {
        resolve_static_tokens(
            Platform::Meta,
            self.config.access_token.as_ref(),
            &self.config.tokens,
            accounts,
        )
    }

    async fn fetch_account_name(
        &self,
        account: &AccountRef,
        credential: &Credential,
    ) -> AggregateResult<String> {
        let token = credential.require(account)?;
        let request = self
            .http
            .get(self.account_url(&account.account_id))
            .bearer_auth(token)
            .query(&[("fields", "name")]);

        let body = send_json(request, Platform::Meta, &account.account_id).await?;
        Self::check_graph_error(&body, &account.account_id)?;

        str_at(&body, &["name"]).ok_or_else(|| {
            AggregateError::upstream(Platform::Meta, &account.account_id, "account has no name")
        })
    }

    async fn fetch_campaign_page(
        &self,
        account: &AccountRef,
        credential: &Credential,
        cursor: Option<&str>,
        filter: StatusFilter,
    ) -> AggregateResult<Page> {
        let token = credential.require(account)?;
        let url = format!("{}/campaigns", self.account_url(&account.account_id));

        let mut query: Vec<(&str, String)> = vec![
            ("fields", CAMPAIGN_FIELDS.to_string()),
            ("limit", self.page_size().to_string()),
        ];
        if !filter.includes_all() {
            query.push(("effective_status", r#"["ACTIVE","PAUSED"]"#.to_string()));
        }
        if let Some(after) = cursor {
            query.push(("after", after.to_string()));
        }

        let request = self.http.get(url).bearer_auth(token).query(&query);
        let body = send_json(request, Platform::Meta, &account.account_id).await?;
        Self::check_graph_error(&body, &account.account_id)?;

        let records = body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(Page {
            records,
            next_cursor: next_cursor(&body),
        })
    }

    fn normalize_record(&self, raw: &Value) -> Option<Campaign> {
        campaign_from_raw(raw, MinorUnit::Cents)
    }
}
