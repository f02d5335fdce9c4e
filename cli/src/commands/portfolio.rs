use anyhow::Result;
use colored::Colorize;

use super::{colored_status, format_amount};
use crate::client::FundFlowClient;
use crate::config::Config;

/// Execute portfolio display command
pub async fn execute(wallet: Option<String>, page: usize, limit: usize) -> Result<()> {
    let config = Config::load()?;
    let wallet = config.resolve_wallet(wallet)?;
    let client = FundFlowClient::new(&config.api_url);

    let portfolio = client.portfolio(&wallet, page, limit).await?;

    println!("{}", "═══════════════════════════════════════════════════".bright_cyan());
    println!("{}", "        FundFlow Investor Portfolio".bright_cyan().bold());
    println!("{}", "═══════════════════════════════════════════════════".bright_cyan());
    println!();
    println!("  Wallet:          {}", portfolio.investor_address.bright_yellow());
    println!("  Invested:        {}", format_amount(portfolio.total_invested).bright_green());
    println!("  Fees paid:       {}", format_amount(portfolio.total_fees));
    println!("  Voting power:    {}", format_amount(portfolio.total_voting_power));
    println!("  Campaigns:       {}", portfolio.campaigns_backed);
    println!();

    if portfolio.holdings.is_empty() {
        println!("{}", "No investments yet.".yellow());
        return Ok(());
    }

    println!(
        "{:<26} {:<28} {:>12} {:<10} {:>6}",
        "INVESTMENT".bold(),
        "CAMPAIGN".bold(),
        "AMOUNT".bold(),
        "STATUS".bold(),
        "VOTES".bold()
    );
    println!("{}", "-".repeat(86));

    for h in &portfolio.holdings {
        println!(
            "{:<26} {:<28} {:>12} {:<10} {:>6}",
            h.investment_id.bright_white(),
            h.campaign_title,
            format_amount(h.amount),
            colored_status(&h.status),
            h.votes_cast
        );
    }

    println!();
    println!(
        "{}",
        format!(
            "Page {} ({} of {} investments, {} voting power shown)",
            portfolio.page,
            portfolio.holdings.len(),
            portfolio.total,
            format_amount(portfolio.holdings.iter().map(|h| h.voting_power).sum())
        )
        .dimmed()
    );

    Ok(())
}
