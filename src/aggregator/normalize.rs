//! Record normalization.
//!
//! Maps raw upstream campaign JSON into [`Campaign`], handling the field
//! name differences between platforms and minor-unit budgets.

use serde_json::Value;
use tracing::debug;

use crate::models::{Campaign, CampaignStatus, StatusFilter};

const ID_FIELDS: &[&str] = &["id", "campaign_id", "campaignId"];
const NAME_FIELDS: &[&str] = &["name", "campaign_name", "campaignName"];
const STATUS_FIELDS: &[&str] = &["status", "effective_status"];
const OBJECTIVE_FIELDS: &[&str] = &["objective"];
const BUDGET_FIELDS: &[&str] = &["daily_budget", "daily_budget_micro", "budget"];
const CREATED_FIELDS: &[&str] = &["created_at", "created_time", "createTime"];
const UPDATED_FIELDS: &[&str] = &["updated_at", "updated_time", "updateTime"];

/// Smallest currency denomination an upstream reports budgets in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinorUnit {
    /// Hundredths of a unit.
    Cents,
    /// Millionths of a unit.
    Micros,
}

impl MinorUnit {
    pub fn factor(&self) -> f64 {
        match self {
            MinorUnit::Cents => 100.0,
            MinorUnit::Micros => 1_000_000.0,
        }
    }
}

/// Convert a minor-unit amount to whole major units, rounding half away from zero.
///
/// Accepts JSON numbers and numeric strings. Anything missing, non-numeric or
/// non-finite yields `None`.
pub fn minor_to_major(raw: Option<&Value>, unit: MinorUnit) -> Option<i64> {
    let amount = match raw? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !amount.is_finite() {
        return None;
    }

    Some((amount / unit.factor()).round() as i64)
}

/// First non-null value among the aliases.
pub fn first_value<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

/// First alias holding a string (or a number, stringified).
pub fn field_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Normalize one raw upstream record. Records without an id are dropped.
pub fn campaign_from_raw(raw: &Value, unit: MinorUnit) -> Option<Campaign> {
    let Some(id) = field_string(raw, ID_FIELDS) else {
        debug!("Skipping campaign record without id");
        return None;
    };

    let status = field_string(raw, STATUS_FIELDS)
        .map(|s| CampaignStatus::from(s.as_str()))
        .unwrap_or_else(|| CampaignStatus::Other("UNKNOWN".to_string()));

    Some(Campaign {
        id,
        name: field_string(raw, NAME_FIELDS),
        status,
        objective: field_string(raw, OBJECTIVE_FIELDS),
        daily_budget: minor_to_major(first_value(raw, BUDGET_FIELDS), unit),
        created_at: field_string(raw, CREATED_FIELDS),
        updated_at: field_string(raw, UPDATED_FIELDS),
    })
}

/// Drop campaigns the status filter excludes.
pub fn retain_by_status(campaigns: Vec<Campaign>, filter: StatusFilter) -> Vec<Campaign> {
    campaigns
        .into_iter()
        .filter(|c| filter.retains(&c.status))
        .collect()
}
