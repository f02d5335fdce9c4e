mod client;
mod commands;
mod config;
mod errors;

use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::Result;

#[derive(Parser)]
#[command(name = "fundflow-cli")]
#[command(author = "FundFlow Team")]
#[command(version = "0.1.0")]
#[command(about = "CLI tool for FundFlow milestone crowdfunding", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse and manage campaigns
    Campaign {
        #[command(subcommand)]
        action: commands::campaign::CampaignCommands,
    },

    /// Submit, vote on and release milestones
    Milestone {
        #[command(subcommand)]
        action: commands::milestone::MilestoneCommands,
    },

    /// Invest in a campaign
    Invest {
        /// Campaign ID
        campaign_id: String,

        /// Amount in smallest units
        #[arg(long)]
        amount: u64,

        /// Investor wallet (defaults to configured wallet)
        #[arg(long)]
        wallet: Option<String>,

        /// Return without waiting for settlement
        #[arg(long)]
        no_wait: bool,
    },

    /// Show investments held by a wallet
    Portfolio {
        #[arg(long)]
        wallet: Option<String>,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Display platform-wide statistics
    Stats,

    /// Resolve expired campaigns and voting rounds now
    Sweep,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set the FundFlow node API URL
    SetApiUrl {
        url: String,
    },

    /// Set the default wallet address
    SetWallet {
        address: String,
    },

    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("{}", "╔════════════════════════════════════════════╗".bright_cyan());
    println!("{}", "║     FundFlow CLI - Milestone Crowdfunding  ║".bright_cyan());
    println!("{}", "╚════════════════════════════════════════════╝".bright_cyan());
    println!();

    let cli = Cli::parse();

    match cli.command {
        Commands::Campaign { action } => {
            commands::campaign::execute(action).await?;
        }
        Commands::Milestone { action } => {
            commands::milestone::execute(action).await?;
        }
        Commands::Invest { campaign_id, amount, wallet, no_wait } => {
            commands::invest::execute(campaign_id, amount, wallet, no_wait).await?;
        }
        Commands::Portfolio { wallet, page, limit } => {
            commands::portfolio::execute(wallet, page, limit).await?;
        }
        Commands::Stats => {
            commands::stats::execute().await?;
        }
        Commands::Sweep => {
            commands::stats::sweep().await?;
        }
        Commands::Config { action } => match action {
            ConfigCommands::SetApiUrl { url } => config::set_api_url(&url)?,
            ConfigCommands::SetWallet { address } => config::set_wallet(&address)?,
            ConfigCommands::Show => config::show()?,
        },
    }

    Ok(())
}
