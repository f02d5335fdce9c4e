//! Milestone submission, voting and release commands

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{colored_status, format_amount, format_timestamp};
use crate::client::{EvidenceItem, FundFlowClient, Milestone, SubmitMilestoneRequest};
use crate::config::Config;
use crate::errors::CliError;

#[derive(Subcommand)]
pub enum MilestoneCommands {
    /// Show milestone details and the current tally
    Show {
        /// Milestone ID
        id: String,
    },

    /// Submit a milestone for investor voting
    Submit {
        /// Milestone ID
        id: String,

        /// Evidence as TITLE=URL (repeatable)
        #[arg(long = "evidence", value_name = "TITLE=URL")]
        evidence: Vec<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        wallet: Option<String>,
    },

    /// Vote on a milestone (for / against)
    Vote {
        /// Milestone ID
        id: String,

        /// for or against
        vote: String,

        #[arg(long)]
        wallet: Option<String>,
    },

    /// Resolve a milestone whose voting window has closed
    Finalize {
        /// Milestone ID
        id: String,
    },

    /// Release funds for an approved milestone
    Release {
        /// Milestone ID
        id: String,
    },
}

pub async fn execute(cmd: MilestoneCommands) -> Result<()> {
    let config = Config::load()?;
    let client = FundFlowClient::new(&config.api_url);

    match cmd {
        MilestoneCommands::Show { id } => {
            let milestone = client.get_milestone(&id).await?;
            print_milestone(&milestone);
            Ok(())
        }
        MilestoneCommands::Submit {
            id,
            evidence,
            notes,
            wallet,
        } => {
            let request = SubmitMilestoneRequest {
                creator_address: config.resolve_wallet(wallet)?,
                evidence: evidence
                    .iter()
                    .map(|e| parse_evidence(e))
                    .collect::<Result<Vec<_>>>()?,
                notes,
            };
            let milestone = client.submit_milestone(&id, &request).await?;
            println!("{}", "✓ Milestone submitted for voting".bright_green());
            if let Some(deadline) = milestone.voting_deadline {
                println!("  Voting closes: {}", format_timestamp(deadline).bright_yellow());
            }
            Ok(())
        }
        MilestoneCommands::Vote { id, vote, wallet } => {
            let vote = normalize_vote(&vote)?;
            let investor = config.resolve_wallet(wallet)?;
            let milestone = client.cast_vote(&id, &investor, vote).await?;
            println!("{}", format!("✓ Voted {} on {}", vote, milestone.title).bright_green());
            print_tally(&milestone);
            Ok(())
        }
        MilestoneCommands::Finalize { id } => {
            let milestone = client.finalize_milestone(&id).await?;
            if milestone.status == "voting" {
                println!("{}", "Voting is still open; nothing to resolve yet.".yellow());
            } else {
                println!("  Outcome: {}", colored_status(&milestone.status));
            }
            print_tally(&milestone);
            Ok(())
        }
        MilestoneCommands::Release { id } => {
            println!("{}", "Releasing milestone funds...".bright_cyan());
            let milestone = client.release_milestone(&id).await?;
            println!(
                "{}",
                format!("✓ Released {} for \"{}\"", format_amount(milestone.target_amount), milestone.title)
                    .bright_green()
            );
            Ok(())
        }
    }
}

/// Accepts for/against and the yes/no aliases
pub fn normalize_vote(vote: &str) -> Result<&'static str> {
    match vote.to_ascii_lowercase().as_str() {
        "for" | "yes" | "approve" => Ok("for"),
        "against" | "no" | "reject" => Ok("against"),
        _ => Err(CliError::InvalidVote(vote.to_string()).into()),
    }
}

fn parse_evidence(raw: &str) -> Result<EvidenceItem> {
    match raw.split_once('=') {
        Some((title, url)) if !title.trim().is_empty() && !url.trim().is_empty() => Ok(EvidenceItem {
            title: title.trim().to_string(),
            url: url.trim().to_string(),
        }),
        _ => Err(anyhow::anyhow!("Evidence must look like TITLE=URL, got '{}'", raw)),
    }
}

fn print_milestone(m: &Milestone) {
    println!("{}", format!("═══ Milestone {}: {} ═══", m.order, m.title).bright_cyan());
    println!("  ID:          {}", m.id.bright_white());
    println!("  Campaign:    {}", m.campaign_id);
    println!("  Status:      {}", colored_status(&m.status));
    println!("  Target:      {}", format_amount(m.target_amount));
    println!("  Approval:    {}% of voting power", m.required_approval_percentage);
    if let Some(deadline) = m.voting_deadline {
        println!("  Voting ends: {}", format_timestamp(deadline).dimmed());
    }
    println!(
        "  Released:    {}",
        if m.funds_released { "Yes".green() } else { "No".yellow() }
    );
    print_tally(m);
}

fn print_tally(m: &Milestone) {
    let total = m.voting_power_for + m.voting_power_against;
    let approval = if total == 0 {
        0.0
    } else {
        m.voting_power_for as f64 * 100.0 / total as f64
    };
    println!(
        "  Votes:       {} for ({} power) / {} against ({} power), {:.1}% approval",
        m.votes_for.to_string().bright_green(),
        format_amount(m.voting_power_for),
        m.votes_against.to_string().bright_red(),
        format_amount(m.voting_power_against),
        approval
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_vote() {
        assert_eq!(normalize_vote("FOR").unwrap(), "for");
        assert_eq!(normalize_vote("no").unwrap(), "against");
        assert!(normalize_vote("abstain").is_err());
    }

    #[test]
    fn test_parse_evidence() {
        let item = parse_evidence("Photos = https://example.com/a=b").unwrap();
        assert_eq!(item.title, "Photos");
        assert_eq!(item.url, "https://example.com/a=b");

        assert!(parse_evidence("no-separator").is_err());
        assert!(parse_evidence("=https://x").is_err());
    }
}
