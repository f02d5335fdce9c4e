//! FundFlow Node Entry Point
//!
//! Runs the crowdfunding ledger with:
//! - JSON REST API for campaigns, milestones and investments
//! - Simulated settlement of investments and payouts
//! - Periodic status sweep for expired campaigns and votes
//! - Optional SQLite persistence
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration
//! fundflow-node
//!
//! # Run with a config file and a different port
//! fundflow-node --config fundflow.toml --port 9090
//!
//! # Persist the ledger
//! fundflow-node --db-path ./data/fundflow.db
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use fundflow_node::{
    run_api, CampaignService, FundFlowApi, FundFlowConfig, LedgerPersistence, LedgerStore,
    ServiceConfig, SimulatedGateway, StatusScheduler,
};

/// FundFlow crowdfunding node
#[derive(Parser, Debug)]
#[command(name = "fundflow-node")]
#[command(author = "FundFlow Team")]
#[command(version = "0.1.0")]
#[command(about = "Milestone-based crowdfunding node", long_about = None)]
struct Args {
    /// Path to configuration file (TOML or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// API port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database path; enables persistence
    #[arg(long)]
    db_path: Option<String>,

    /// Disable persistence (in-memory only)
    #[arg(long)]
    no_persistence: bool,

    /// Disable the periodic status sweep
    #[arg(long)]
    no_scheduler: bool,

    /// Simulated settlement delay in milliseconds (overrides config)
    #[arg(long)]
    confirmation_delay_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Starting FundFlow node v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => FundFlowConfig::from_file(path)?,
        None => FundFlowConfig::default(),
    };

    // Override with command line arguments
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(db_path) = args.db_path {
        config.storage.enabled = true;
        config.storage.db_path = db_path;
    }
    if args.no_persistence {
        config.storage.enabled = false;
    }
    if args.no_scheduler {
        config.scheduler.enabled = false;
    }
    if let Some(delay) = args.confirmation_delay_ms {
        config.payments.confirmation_delay_ms = delay;
    }

    config.validate()?;
    let addr = config.listen_addr()?;

    // Ledger store, restored from SQLite when persistence is on
    let store = if config.storage.enabled {
        if let Some(parent) = std::path::Path::new(&config.storage.db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory {}", parent.display())
                })?;
            }
        }
        let persistence = LedgerPersistence::new(&config.storage.db_path)
            .with_context(|| format!("Failed to open ledger database {}", config.storage.db_path))?;
        LedgerStore::with_persistence(Arc::new(persistence)).await?
    } else {
        info!("Persistence disabled (in-memory only)");
        LedgerStore::new()
    };

    let gateway = SimulatedGateway::new(
        config.payments.confirmation_delay(),
        config.payments.failure_rate,
    );
    let service = Arc::new(CampaignService::new(
        Arc::new(store),
        Arc::new(gateway),
        ServiceConfig::from(&config),
    ));

    info!("FundFlow configuration:");
    info!("  API: {}", addr);
    info!(
        "  Platform fee: {} bps, minimum investment {}",
        config.platform.fee_bps, config.platform.min_investment
    );
    info!(
        "  Voting: {}s window, {}% approval, quorum {}",
        config.voting.voting_period_secs,
        config.voting.required_approval_percentage,
        config.voting.minimum_voting_power
    );
    info!(
        "  Persistence: {}",
        if config.storage.enabled { config.storage.db_path.as_str() } else { "disabled" }
    );

    // Investments recorded before a restart never reached the gateway
    let resume = service.clone();
    tokio::spawn(async move {
        let settled = resume.settle_pending().await;
        if settled > 0 {
            info!("Settled {} investments left pending at shutdown", settled);
        }
    });

    // Spawn status scheduler
    if config.scheduler.enabled {
        let scheduler = StatusScheduler::new(
            service.clone(),
            Duration::from_secs(config.scheduler.interval_secs),
        );
        tokio::spawn(async move {
            scheduler.run().await;
        });
    } else {
        info!("Status scheduler disabled");
    }

    // Run API server (blocks)
    let api = Arc::new(FundFlowApi::new(service));
    if let Err(e) = run_api(addr, api).await {
        error!("FundFlow API server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
