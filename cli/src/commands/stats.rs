use anyhow::Result;
use colored::Colorize;

use super::format_amount;
use crate::client::FundFlowClient;
use crate::config::Config;

/// Execute platform statistics command
pub async fn execute() -> Result<()> {
    let config = Config::load()?;
    let client = FundFlowClient::new(&config.api_url);

    println!("{}", format!("Fetching statistics from {}...", config.api_url).dimmed());
    println!();

    let stats = client.platform_stats().await?;

    println!("{}", "═══ Campaigns ═══".bright_cyan());
    println!("  Total:         {}", stats.total_campaigns.to_string().bright_white());
    println!("  Active:        {}", stats.active_campaigns.to_string().bright_green());
    println!("  Completed:     {}", stats.completed_campaigns.to_string().bright_green());
    println!("  Failed:        {}", stats.failed_campaigns.to_string().bright_red());
    println!("  Cancelled:     {}", stats.cancelled_campaigns.to_string().yellow());
    println!("  Success rate:  {}", format_rate(stats.success_rate));
    println!();

    println!("{}", "═══ Funds ═══".bright_cyan());
    println!("  Raised:        {}", format_amount(stats.total_raised).bright_green());
    println!("  Released:      {}", format_amount(stats.total_released));
    println!("  Fees:          {}", format_amount(stats.total_fees));
    println!();

    println!("{}", "═══ Activity ═══".bright_cyan());
    println!("  Investments:   {}", stats.total_investments);
    println!("  Investors:     {}", stats.unique_investors);
    println!("  Open votes:    {}", stats.milestones_in_voting.to_string().yellow());

    Ok(())
}

/// Trigger an immediate status sweep on the node
pub async fn sweep() -> Result<()> {
    let config = Config::load()?;
    let client = FundFlowClient::new(&config.api_url);

    let report = client.sweep().await?;

    println!("{}", "✓ Status sweep complete".bright_green());
    println!("  Campaigns completed:  {}", report.campaigns_completed);
    println!("  Campaigns failed:     {}", report.campaigns_failed);
    println!("  Milestones approved:  {}", report.milestones_approved);
    println!("  Milestones rejected:  {}", report.milestones_rejected);

    Ok(())
}

fn format_rate(rate: f64) -> colored::ColoredString {
    let formatted = format!("{:.1}%", rate);
    if rate >= 50.0 {
        formatted.bright_green()
    } else if rate >= 25.0 {
        formatted.yellow()
    } else {
        formatted.bright_red()
    }
}
