//! Error taxonomy for campaign aggregation.

use crate::models::Platform;
use thiserror::Error;

/// Errors raised while aggregating campaigns for a platform.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Token exchange failed or no secret is configured. Aborts the whole platform.
    #[error("{platform} credential error: {message}")]
    Credential { platform: Platform, message: String },

    /// A page fetch failed after all retries. Isolated to the owning account.
    #[error("{platform} account {account_id}: {message}")]
    UpstreamFetch {
        platform: Platform,
        account_id: String,
        message: String,
    },

    /// The caller asked for a platform we don't know.
    #[error("Unsupported platform: {0}. Expected one of {}", Platform::expected_ids())]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}

impl AggregateError {
    pub fn credential(platform: Platform, message: impl Into<String>) -> Self {
        AggregateError::Credential {
            platform,
            message: message.into(),
        }
    }

    pub fn upstream(platform: Platform, account_id: &str, message: impl Into<String>) -> Self {
        AggregateError::UpstreamFetch {
            platform,
            account_id: account_id.to_string(),
            message: message.into(),
        }
    }

    /// Message to show inline on a failed account entry.
    pub fn account_message(&self) -> String {
        match self {
            AggregateError::UpstreamFetch { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type AggregateResult<T> = Result<T, AggregateError>;
