//! Campaign browsing and creator commands

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{colored_status, format_amount, format_timestamp, progress};
use crate::client::{CreateCampaignRequest, CreateMilestoneRequest, FundFlowClient};
use crate::config::Config;
use crate::errors::CliError;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Subcommand)]
pub enum CampaignCommands {
    /// List campaigns
    List {
        /// Filter by status (active, completed, cancelled, failed)
        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value = "0")]
        offset: usize,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show one campaign with its milestones
    Show {
        /// Campaign ID
        id: String,
    },

    /// Create a new campaign
    Create {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Funding target in smallest units
        #[arg(long)]
        target: u64,

        /// Deadline: days from now, or an RFC 3339 timestamp
        #[arg(long)]
        deadline: String,

        /// Creator wallet (defaults to configured wallet)
        #[arg(long)]
        wallet: Option<String>,
    },

    /// Add a milestone to a campaign
    AddMilestone {
        /// Campaign ID
        id: String,

        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Amount released when the milestone is approved
        #[arg(long)]
        target: u64,

        #[arg(long)]
        wallet: Option<String>,
    },

    /// Cancel a campaign
    Cancel {
        /// Campaign ID
        id: String,

        #[arg(long)]
        wallet: Option<String>,
    },
}

pub async fn execute(cmd: CampaignCommands) -> Result<()> {
    let config = Config::load()?;
    let client = FundFlowClient::new(&config.api_url);

    match cmd {
        CampaignCommands::List { status, offset, limit } => {
            list(&client, status.as_deref(), offset, limit).await
        }
        CampaignCommands::Show { id } => show(&client, &id).await,
        CampaignCommands::Create {
            title,
            description,
            target,
            deadline,
            wallet,
        } => {
            if target == 0 {
                return Err(CliError::InvalidAmount(target).into());
            }
            let request = CreateCampaignRequest {
                title,
                description,
                creator_address: config.resolve_wallet(wallet)?,
                target_amount: target,
                deadline: parse_deadline(&deadline, chrono::Utc::now().timestamp() as u64)?,
            };
            create(&client, &request).await
        }
        CampaignCommands::AddMilestone {
            id,
            title,
            description,
            target,
            wallet,
        } => {
            if target == 0 {
                return Err(CliError::InvalidAmount(target).into());
            }
            let request = CreateMilestoneRequest {
                creator_address: config.resolve_wallet(wallet)?,
                title,
                description,
                target_amount: target,
            };
            add_milestone(&client, &id, &request).await
        }
        CampaignCommands::Cancel { id, wallet } => {
            let creator = config.resolve_wallet(wallet)?;
            let campaign = client.cancel_campaign(&id, &creator).await?;
            println!(
                "{}",
                format!("✓ Campaign {} is now {}", campaign.id, campaign.status).green()
            );
            Ok(())
        }
    }
}

/// Days from now, or an absolute RFC 3339 timestamp
pub fn parse_deadline(input: &str, now: u64) -> Result<u64> {
    if let Ok(days) = input.parse::<u64>() {
        if days == 0 {
            return Err(CliError::InvalidDeadline(input.to_string()).into());
        }
        return Ok(now + days * SECONDS_PER_DAY);
    }

    chrono::DateTime::parse_from_rfc3339(input)
        .ok()
        .and_then(|dt| u64::try_from(dt.timestamp()).ok())
        .ok_or_else(|| CliError::InvalidDeadline(input.to_string()).into())
}

async fn list(client: &FundFlowClient, status: Option<&str>, offset: usize, limit: usize) -> Result<()> {
    println!("{}", "Fetching campaigns...".bright_cyan());
    println!();

    let page = client.list_campaigns(status, offset, limit).await?;

    if page.campaigns.is_empty() {
        println!("{}", "No campaigns found.".yellow());
        return Ok(());
    }

    println!(
        "{:<26} {:<30} {:<11} {:>14} {:>8}",
        "ID".bold(),
        "TITLE".bold(),
        "STATUS".bold(),
        "RAISED".bold(),
        "FUNDED".bold()
    );
    println!("{}", "-".repeat(94));

    for campaign in &page.campaigns {
        println!(
            "{:<26} {:<30} {:<11} {:>14} {:>7.1}%",
            campaign.id.bright_white(),
            truncate(&campaign.title, 30),
            colored_status(&campaign.status),
            format_amount(campaign.raised_amount),
            progress(campaign.raised_amount, campaign.target_amount)
        );
    }

    println!();
    println!(
        "{}",
        format!(
            "Showing {}-{} of {}",
            page.offset + 1,
            page.offset + page.campaigns.len(),
            page.total
        )
        .dimmed()
    );

    Ok(())
}

async fn show(client: &FundFlowClient, id: &str) -> Result<()> {
    let campaign = client.get_campaign(id).await?;

    println!("{}", "═══════════════════════════════════════════════════".bright_cyan());
    println!("  {}", campaign.title.bright_cyan().bold());
    println!("{}", "═══════════════════════════════════════════════════".bright_cyan());
    if !campaign.description.is_empty() {
        println!("  {}", campaign.description);
        println!();
    }
    println!("  ID:          {}", campaign.id.bright_white());
    println!("  Creator:     {}", campaign.creator_address.bright_yellow());
    println!("  Status:      {}", colored_status(&campaign.status));
    println!(
        "  Raised:      {} / {} ({:.1}%)",
        format_amount(campaign.raised_amount).bright_green(),
        format_amount(campaign.target_amount),
        progress(campaign.raised_amount, campaign.target_amount)
    );
    println!("  Released:    {}", format_amount(campaign.released_amount));
    println!("  Investors:   {}", campaign.investor_count);
    println!("  Deadline:    {}", format_timestamp(campaign.deadline).dimmed());
    println!();

    println!("{}", "═══ Milestones ═══".bright_cyan());
    if campaign.milestones.is_empty() {
        println!("  {}", "No milestones yet".dimmed());
    }
    for m in &campaign.milestones {
        println!(
            "  {}. {:<30} {:>12} {:<12} {}",
            m.order,
            truncate(&m.title, 30),
            format_amount(m.target_amount),
            colored_status(&m.status),
            m.milestone_id.dimmed()
        );
    }

    Ok(())
}

async fn create(client: &FundFlowClient, request: &CreateCampaignRequest) -> Result<()> {
    println!("{}", format!("Creating campaign \"{}\"...", request.title).bright_cyan());

    let campaign = client.create_campaign(request).await?;

    println!("{}", "✓ Campaign created".bright_green());
    println!("  ID:        {}", campaign.id.bright_white());
    println!("  Target:    {}", format_amount(campaign.target_amount));
    println!("  Deadline:  {}", format_timestamp(campaign.deadline));
    println!();
    println!(
        "Add milestones with {}",
        format!("fundflow-cli campaign add-milestone {} --title ... --target ...", campaign.id)
            .bright_green()
    );

    Ok(())
}

async fn add_milestone(
    client: &FundFlowClient,
    campaign_id: &str,
    request: &CreateMilestoneRequest,
) -> Result<()> {
    let milestone = client.create_milestone(campaign_id, request).await?;

    println!("{}", "✓ Milestone added".bright_green());
    println!("  ID:        {}", milestone.id.bright_white());
    println!("  Order:     {}", milestone.order);
    println!("  Target:    {}", format_amount(milestone.target_amount));

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn test_parse_deadline_days() {
        assert_eq!(parse_deadline("30", NOW).unwrap(), NOW + 30 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_parse_deadline_rfc3339() {
        assert_eq!(
            parse_deadline("2023-11-14T22:13:20Z", 0).unwrap(),
            1_700_000_000
        );
    }

    #[test]
    fn test_parse_deadline_invalid() {
        assert!(parse_deadline("0", NOW).is_err());
        assert!(parse_deadline("next week", NOW).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 8), "a longe…");
    }
}
