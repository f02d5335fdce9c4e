use std::time::Duration;

use anyhow::Result;
use colored::Colorize;

use super::{colored_status, format_amount};
use crate::client::FundFlowClient;
use crate::config::Config;
use crate::errors::CliError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_POLLS: u32 = 60;

/// Execute invest command: record the investment, then wait for settlement
pub async fn execute(campaign_id: String, amount: u64, wallet: Option<String>, no_wait: bool) -> Result<()> {
    if amount == 0 {
        return Err(CliError::InvalidAmount(amount).into());
    }

    let config = Config::load()?;
    let investor = config.resolve_wallet(wallet)?;
    let client = FundFlowClient::new(&config.api_url);

    println!(
        "{}",
        format!("Investing {} in campaign {}...", format_amount(amount), campaign_id).bright_cyan()
    );

    let investment = client.invest(&campaign_id, &investor, amount).await?;

    println!("  Investment:    {}", investment.id.bright_white());
    println!("  Platform fee:  {}", format_amount(investment.platform_fee));
    println!("  Net amount:    {}", format_amount(investment.net_amount).bright_green());

    if no_wait {
        println!();
        println!(
            "Check settlement with {}",
            format!("fundflow-cli portfolio --wallet {}", investor).bright_green()
        );
        return Ok(());
    }

    println!("{}", "Waiting for settlement...".dimmed());

    for _ in 0..MAX_POLLS {
        let current = client.get_investment(&investment.id).await?;
        if current.status != "pending" {
            println!("  Status:        {}", colored_status(&current.status));
            if let Some(hash) = current.transaction_hash {
                println!("  Tx hash:       {}", hash.dimmed());
            }
            if current.status == "confirmed" {
                println!("{}", "✓ Investment confirmed".bright_green());
            } else {
                println!("{}", "⚠ Investment was not confirmed".yellow());
            }
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    println!("{}", "⚠ Settlement still pending; check again later".yellow());
    Ok(())
}
