use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::CliError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Configuration for FundFlow CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub wallet_address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            wallet_address: None,
        }
    }
}

impl Config {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find config directory"))?;
        Ok(config_dir.join("fundflow-cli").join("config.toml"))
    }

    /// Load config from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        Ok(())
    }

    pub fn set_api_url(&mut self, url: &str) -> Result<()> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CliError::InvalidApiUrl(url.to_string()).into());
        }
        self.api_url = url.trim_end_matches('/').to_string();
        Ok(())
    }

    pub fn set_wallet(&mut self, address: &str) -> Result<()> {
        let address = address.trim();
        if address.is_empty() || address.len() > 128 || address.chars().any(char::is_whitespace) {
            return Err(CliError::InvalidWallet(address.to_string()).into());
        }
        self.wallet_address = Some(address.to_string());
        Ok(())
    }

    /// Wallet to act as: an explicit override wins over the configured one
    pub fn resolve_wallet(&self, wallet: Option<String>) -> Result<String> {
        wallet
            .or_else(|| self.wallet_address.clone())
            .ok_or_else(|| CliError::WalletNotSet.into())
    }
}

/// Set node API URL
pub fn set_api_url(url: &str) -> Result<()> {
    let mut config = Config::load()?;
    config.set_api_url(url)?;
    config.save()?;

    println!("{}", format!("✓ API URL set to: {}", config.api_url).green());

    Ok(())
}

/// Set default wallet address
pub fn set_wallet(address: &str) -> Result<()> {
    let mut config = Config::load()?;
    config.set_wallet(address)?;
    config.save()?;

    println!("{}", format!("✓ Wallet set to: {}", address.trim()).green());

    Ok(())
}

/// Show current configuration
pub fn show() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "FundFlow CLI Configuration".bright_cyan().bold());
    println!("  API URL:      {}", config.api_url.bright_yellow());
    println!("  Wallet:       {}",
        config.wallet_address
            .unwrap_or_else(|| "Not set".to_string())
    );
    println!("  Config File:  {}", Config::config_path()?.display().to_string().dimmed());

    Ok(())
}
