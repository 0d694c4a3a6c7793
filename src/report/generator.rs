//! Markdown and JSON report generation.
//!
//! This module renders a [`PlatformResult`] for the `fetch` command. The
//! JSON form is the same payload the HTTP API returns.

use anyhow::Result;

use crate::models::{AccountResult, Campaign, PlatformResult};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(result: &PlatformResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# {} Campaign Report\n\n",
        result.platform.display_name()
    ));
    output.push_str(&generate_metadata_section(result));
    output.push_str(&generate_summary_section(result));
    output.push_str(&generate_accounts_section(result));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(result: &PlatformResult) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Platform:** `{}`\n", result.platform));
    section.push_str(&format!("- **Fetched At:** {}\n", result.fetched_at));
    section.push_str(&format!("- **Accounts:** {}\n", result.accounts.len()));
    let failed = result.failed_accounts();
    if failed > 0 {
        section.push_str(&format!("- **Accounts Failed:** {}\n", failed));
    }
    section.push_str(&format!(
        "- **Total Campaigns:** {}\n",
        result.total_campaigns
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(result: &PlatformResult) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    let counts = result.status_counts();
    if !counts.is_empty() {
        section.push_str("### Campaigns by Status\n\n");
        section.push_str("| Status | Count |\n");
        section.push_str("|:---|:---:|\n");

        let mut statuses: Vec<_> = counts.iter().collect();
        statuses.sort_by_key(|(_, count)| std::cmp::Reverse(**count));

        for (status, count) in statuses {
            section.push_str(&format!("| {} | {} |\n", status, count));
        }
        section.push('\n');
    }

    section.push_str("### Campaigns by Account\n\n");
    section.push_str("| Account | Name | Campaigns | Daily Budget |\n");
    section.push_str("|:---|:---|:---:|---:|\n");
    for (id, account) in &result.accounts {
        let campaigns = if account.is_failed() {
            "error".to_string()
        } else {
            account.campaigns.len().to_string()
        };
        section.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            id,
            account.account_name,
            campaigns,
            total_daily_budget(&account.campaigns)
        ));
    }
    section.push('\n');

    section
}

/// Sum of known daily budgets.
fn total_daily_budget(campaigns: &[Campaign]) -> i64 {
    campaigns.iter().filter_map(|c| c.daily_budget).sum()
}

/// Generate the per-account sections.
fn generate_accounts_section(result: &PlatformResult) -> String {
    let mut section = String::new();

    section.push_str("## Accounts\n\n");

    if result.accounts.is_empty() {
        section.push_str("No accounts are configured for this platform.\n\n");
        return section;
    }

    for (id, account) in &result.accounts {
        section.push_str(&generate_account_block(id, account));
    }

    section
}

/// Generate a single account block.
fn generate_account_block(id: &str, account: &AccountResult) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {} (`{}`)\n\n", account.account_name, id));
    if let Some(ref label) = account.label {
        block.push_str(&format!("*Label: {}*\n\n", label));
    }

    if let Some(ref error) = account.error {
        block.push_str(&format!("> **Error:** {}\n\n", error));
        return block;
    }

    if account.campaigns.is_empty() {
        block.push_str("No campaigns matched.\n\n");
        return block;
    }

    block.push_str("| ID | Name | Status | Objective | Daily Budget | Created |\n");
    block.push_str("|:---|:---|:---|:---|---:|:---|\n");
    for campaign in &account.campaigns {
        block.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} |\n",
            campaign.id,
            campaign.name.as_deref().unwrap_or("-"),
            campaign.status,
            campaign.objective.as_deref().unwrap_or("-"),
            campaign
                .daily_budget
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
            campaign.created_at.as_deref().unwrap_or("-"),
        ));
    }
    block.push('\n');

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by campaign-aggregator*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(result: &PlatformResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}
