//! Snapchat Marketing API adapter.
//!
//! Credentials come from an OAuth2 refresh-token exchange, performed once per
//! aggregation call and shared by every account. Budgets are in micros.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{cursor_from_link, send_json, str_at, Credential, Page, PlatformAdapter};
use crate::aggregator::normalize::{campaign_from_raw, MinorUnit};
use crate::config::{Secret, SnapchatConfig};
use crate::error::{AggregateError, AggregateResult};
use crate::models::{AccountRef, Campaign, Platform, StatusFilter};

const PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

pub struct SnapchatAdapter {
    config: SnapchatConfig,
    http: reqwest::Client,
}

impl SnapchatAdapter {
    pub fn new(config: SnapchatConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn required_secret(secret: Option<&Secret>, name: &str) -> AggregateResult<String> {
        secret.and_then(Secret::resolve).ok_or_else(|| {
            let source = secret.map(Secret::describe).unwrap_or_else(|| "config".to_string());
            AggregateError::credential(
                Platform::Snapchat,
                format!("missing {} (from {})", name, source),
            )
        })
    }

    /// Snapchat reports failures as `request_status: "ERROR"` with a debug message.
    fn check_request_status(body: &Value, account_id: &str) -> AggregateResult<()> {
        match str_at(body, &["request_status"]) {
            Some(status) if status.eq_ignore_ascii_case("error") => {
                let message = str_at(body, &["debug_message"])
                    .or_else(|| str_at(body, &["display_message"]))
                    .unwrap_or_else(|| "request_status ERROR".to_string());
                Err(AggregateError::upstream(Platform::Snapchat, account_id, message))
            }
            _ => Ok(()),
        }
    }
}

/// `paging.next_cursor`, then `next_cursor`, then the `cursor` param of `paging.next_link`.
pub(crate) fn next_cursor(body: &Value) -> Option<String> {
    str_at(body, &["paging", "next_cursor"])
        .or_else(|| str_at(body, &["next_cursor"]))
        .or_else(|| str_at(body, &["paging", "next_link"]).and_then(|l| cursor_from_link(&l)))
}

/// Listing entries are wrapped as `{"sub_request_status": .., "campaign": {..}}`.
fn unwrap_campaigns(body: &Value) -> Vec<Value> {
    body.get("campaigns")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| item.get("campaign").cloned().unwrap_or_else(|| item.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PlatformAdapter for SnapchatAdapter {
    fn platform(&self) -> Platform {
        Platform::Snapchat
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    async fn resolve_credential(&self, _accounts: &[AccountRef]) -> AggregateResult<Credential> {
        let client_id = Self::required_secret(self.config.client_id.as_ref(), "client_id")?;
        let client_secret =
            Self::required_secret(self.config.client_secret.as_ref(), "client_secret")?;
        let refresh_token =
            Self::required_secret(self.config.refresh_token.as_ref(), "refresh_token")?;

        let url = format!(
            "{}/login/oauth2/access_token",
            self.config.auth_base.trim_end_matches('/')
        );
        debug!("Exchanging Snapchat refresh token at {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AggregateError::credential(Platform::Snapchat, "token exchange timed out")
                } else {
                    AggregateError::credential(
                        Platform::Snapchat,
                        format!("token exchange failed: {}", e),
                    )
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AggregateError::credential(
                Platform::Snapchat,
                format!(
                    "token exchange returned HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AggregateError::credential(Platform::Snapchat, format!("invalid token response: {}", e))
        })?;

        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(Credential::shared)
            .ok_or_else(|| {
                AggregateError::credential(Platform::Snapchat, "token response had no access_token")
            })
    }

    async fn fetch_account_name(
        &self,
        account: &AccountRef,
        credential: &Credential,
    ) -> AggregateResult<String> {
        let token = credential.require(account)?;
        let request = self
            .http
            .get(self.api_url(&format!("/v1/adaccounts/{}", account.account_id)))
            .bearer_auth(token);

        let body = send_json(request, Platform::Snapchat, &account.account_id).await?;
        Self::check_request_status(&body, &account.account_id)?;

        body.get("adaccounts")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(|entry| str_at(entry, &["adaccount", "name"]))
            .ok_or_else(|| {
                AggregateError::upstream(
                    Platform::Snapchat,
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
        _filter: StatusFilter,
    ) -> AggregateResult<Page> {
        let token = credential.require(account)?;
        let url = self.api_url(&format!("/v1/adaccounts/{}/campaigns", account.account_id));

        let mut query: Vec<(&str, String)> = vec![("limit", self.page_size().to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let request = self.http.get(url).bearer_auth(token).query(&query);
        let body = send_json(request, Platform::Snapchat, &account.account_id).await?;
        Self::check_request_status(&body, &account.account_id)?;

        Ok(Page {
            records: unwrap_campaigns(&body),
            next_cursor: next_cursor(&body),
        })
    }

    fn normalize_record(&self, raw: &Value) -> Option<Campaign> {
        campaign_from_raw(raw, MinorUnit::Micros)
    }
}
