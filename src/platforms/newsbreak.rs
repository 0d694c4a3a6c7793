//! NewsBreak Business API adapter.

use async_trait::async_trait;
use serde_json::Value;

use super::{resolve_static_tokens, send_json, str_at, Credential, Page, PlatformAdapter};
use crate::aggregator::normalize::{campaign_from_raw, MinorUnit};
use crate::config::NewsBreakConfig;
use crate::error::{AggregateError, AggregateResult};
use crate::models::{AccountRef, Campaign, Platform, StatusFilter};

const PAGE_SIZE: usize = 500;
const TOKEN_HEADER: &str = "Access-Token";

pub struct NewsBreakAdapter {
    config: NewsBreakConfig,
    http: reqwest::Client,
}

impl NewsBreakAdapter {
    pub fn new(config: NewsBreakConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/business-api/v1{}",
            self.config.api_base.trim_end_matches('/'),
            path
        )
    }

    /// Non-zero `code` means failure even on HTTP 200.
    fn check_code(body: &Value, account_id: &str) -> AggregateResult<()> {
        match body.get("code").and_then(Value::as_i64) {
            Some(code) if code != 0 => {
                let message = str_at(body, &["message"])
                    .or_else(|| str_at(body, &["msg"]))
                    .unwrap_or_else(|| format!("API error code {}", code));
                Err(AggregateError::upstream(Platform::NewsBreak, account_id, message))
            }
            _ => Ok(()),
        }
    }
}

/// Top-level `next_cursor`, then `paging.next_cursor`, then `data.next_cursor`.
pub(crate) fn next_cursor(body: &Value) -> Option<String> {
    str_at(body, &["next_cursor"])
        .or_else(|| str_at(body, &["paging", "next_cursor"]))
        .or_else(|| str_at(body, &["data", "next_cursor"]))
}

/// Records are either `data` itself or `data.list`.
fn extract_records(body: &Value) -> Vec<Value> {
    let data = body.get("data");
    data.and_then(Value::as_array)
        .or_else(|| data.and_then(|d| d.get("list")).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl PlatformAdapter for NewsBreakAdapter {
    fn platform(&self) -> Platform {
        Platform::NewsBreak
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    async fn resolve_credential(&self, accounts: &[AccountRef]) -> AggregateResult<Credential> {
        resolve_static_tokens(
            Platform::NewsBreak,
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
            .get(self.api_url("/ad-account/get"))
            .header(TOKEN_HEADER, token)
            .query(&[("adAccountId", account.account_id.as_str())]);

        let body = send_json(request, Platform::NewsBreak, &account.account_id).await?;
        Self::check_code(&body, &account.account_id)?;

        str_at(&body, &["data", "name"]).ok_or_else(|| {
            AggregateError::upstream(
                Platform::NewsBreak,
                &account.account_id,
                "account has no name",
            )
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

        let mut query: Vec<(&str, String)> = vec![
            ("adAccountId", account.account_id.clone()),
            ("pageSize", self.page_size().to_string()),
        ];
        if filter.includes_all() {
            query.push(("status", "ALL".to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let request = self
            .http
            .get(self.api_url("/campaign/getList"))
            .header(TOKEN_HEADER, token)
            .query(&query);
        let body = send_json(request, Platform::NewsBreak, &account.account_id).await?;
        Self::check_code(&body, &account.account_id)?;

        Ok(Page {
            records: extract_records(&body),
            next_cursor: next_cursor(&body),
        })
    }

    fn normalize_record(&self, raw: &Value) -> Option<Campaign> {
        campaign_from_raw(raw, MinorUnit::Cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(base: &str) -> NewsBreakAdapter {
        let config = NewsBreakConfig {
            api_base: base.to_string(),
            access_token: Some(Secret::Inline("nb-token".to_string())),
            ..NewsBreakConfig::default()
        };
        NewsBreakAdapter::new(config, reqwest::Client::new())
    }

    fn account(id: &str) -> AccountRef {
        AccountRef {
            platform: Platform::NewsBreak,
            account_id: id.to_string(),
            label: None,
            credential_ref: None,
        }
    }

    #[test]
    fn test_next_cursor_fallbacks() {
        assert_eq!(next_cursor(&json!({"next_cursor": "a"})), Some("a".to_string()));
        assert_eq!(
            next_cursor(&json!({"paging": {"next_cursor": "b"}})),
            Some("b".to_string())
        );
        assert_eq!(
            next_cursor(&json!({"data": {"list": [], "next_cursor": "c"}})),
            Some("c".to_string())
        );
        assert_eq!(next_cursor(&json!({"data": []})), None);
    }

    #[test]
    fn test_extract_records_shapes() {
        assert_eq!(extract_records(&json!({"data": [{"id": 1}]})).len(), 1);
        assert_eq!(
            extract_records(&json!({"data": {"list": [{"id": 1}, {"id": 2}]}})).len(),
            2
        );
        assert!(extract_records(&json!({"code": 0})).is_empty());
    }

    #[tokio::test]
    async fn test_include_all_passes_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/business-api/v1/campaign/getList"))
            .and(header("Access-Token", "nb-token"))
            .and(query_param("adAccountId", "nb-1"))
            .and(query_param("pageSize", "500"))
            .and(query_param("status", "ALL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": [
                    {"id": 11, "name": "Evergreen", "status": "DELETED", "budget": 250, "createTime": "2024-04-01 00:00:00"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server.uri());
        let page = adapter
            .fetch_campaign_page(
                &account("nb-1"),
                &Credential::shared("nb-token"),
                None,
                StatusFilter::All,
            )
            .await
            .unwrap();

        let campaign = adapter.normalize_record(&page.records[0]).unwrap();
        assert_eq!(campaign.id, "11");
        assert_eq!(campaign.daily_budget, Some(3));
        assert_eq!(campaign.created_at.as_deref(), Some("2024-04-01 00:00:00"));
    }

    #[tokio::test]
    async fn test_default_filter_omits_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/business-api/v1/campaign/getList"))
            .and(query_param("cursor", "c2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"list": [{"id": 12, "status": "ACTIVE"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = adapter(&server.uri())
            .fetch_campaign_page(
                &account("nb-1"),
                &Credential::shared("nb-token"),
                Some("c2"),
                StatusFilter::ActiveAndPaused,
            )
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(page.next_cursor.is_none());

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].url.query_pairs().all(|(k, _)| k != "status"));
    }

    #[tokio::test]
    async fn test_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/business-api/v1/ad-account/get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 40001, "message": "token expired"})),
            )
            .mount(&server)
            .await;

        let result = adapter(&server.uri())
            .fetch_account_name(&account("nb-1"), &Credential::shared("nb-token"))
            .await;
        assert_eq!(result.unwrap_err().account_message(), "token expired");
    }
}
