//! FundFlow Node Configuration
//!
//! Loaded from TOML (or YAML) with every section optional; missing values
//! fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use crate::error::FundFlowError;
use crate::investment::BPS_DENOMINATOR;

/// Node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FundFlowConfig {
    pub server: ServerConfig,
    pub platform: PlatformConfig,
    pub voting: VotingConfig,
    pub scheduler: SchedulerConfig,
    pub payments: PaymentsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Platform fee in basis points (250 = 2.5%)
    pub fee_bps: u16,
    /// Smallest accepted gross investment
    pub min_investment: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            fee_bps: 250,
            min_investment: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Default voting window when a submission does not name a deadline
    pub voting_period_secs: u64,
    /// Default approval threshold for new milestones
    pub required_approval_percentage: u8,
    /// Default quorum for new milestones
    pub minimum_voting_power: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            voting_period_secs: 7 * 24 * 3600,
            required_approval_percentage: 50,
            minimum_voting_power: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Seconds between status sweeps
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// Simulated confirmation latency
    pub confirmation_delay_ms: u64,
    /// Probability in [0, 1] that a simulated settlement fails
    pub failure_rate: f64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            confirmation_delay_ms: 2000,
            failure_rate: 0.0,
        }
    }
}

impl PaymentsConfig {
    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persist the ledger to SQLite
    pub enabled: bool,
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            db_path: "fundflow.db".to_string(),
        }
    }
}

impl FundFlowConfig {
    /// Load configuration from a TOML or YAML file, chosen by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
            _ => Self::from_toml(&contents)?,
        };
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, FundFlowError> {
        toml::from_str(content)
            .map_err(|e| FundFlowError::Config(format!("TOML parse error: {}", e)))
    }

    pub fn from_yaml(content: &str) -> Result<Self, FundFlowError> {
        serde_yaml::from_str(content)
            .map_err(|e| FundFlowError::Config(format!("YAML parse error: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String, FundFlowError> {
        toml::to_string_pretty(self)
            .map_err(|e| FundFlowError::Config(format!("TOML serialize error: {}", e)))
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = self.to_toml()?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Socket address for the API server
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    self.server.host, self.server.port
                )
            })
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Invalid port: cannot be 0");
        }

        if self.platform.fee_bps as u64 >= BPS_DENOMINATOR {
            anyhow::bail!(
                "Invalid platform fee_bps: {} must be below {}",
                self.platform.fee_bps,
                BPS_DENOMINATOR
            );
        }

        if self.platform.min_investment == 0 {
            anyhow::bail!("Invalid min_investment: must be > 0");
        }

        if self.voting.voting_period_secs == 0 {
            anyhow::bail!("Invalid voting_period_secs: must be > 0");
        }

        if self.voting.required_approval_percentage == 0
            || self.voting.required_approval_percentage > 100
        {
            anyhow::bail!(
                "Invalid required_approval_percentage: {} not in [1, 100]",
                self.voting.required_approval_percentage
            );
        }

        if self.scheduler.enabled && self.scheduler.interval_secs == 0 {
            anyhow::bail!("Invalid scheduler interval_secs: must be > 0");
        }

        if !(0.0..=1.0).contains(&self.payments.failure_rate) {
            anyhow::bail!(
                "Invalid payments failure_rate: {} not in [0, 1]",
                self.payments.failure_rate
            );
        }

        if self.storage.enabled && self.storage.db_path.trim().is_empty() {
            anyhow::bail!("Invalid storage db_path: cannot be empty");
        }

        Ok(())
    }
}
