//! Investment documents
//!
//! An investment is one investor's contribution to one campaign. The platform
//! fee is taken from the gross amount; what remains is the net amount, which
//! is also the investment's voting power.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FundFlowError, Result};
use crate::milestone::VoteChoice;
use crate::util::{generate_id, validate_address};

/// Basis-point denominator for platform fees
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Settlement state of an investment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentStatus {
    Pending,
    Confirmed,
    Failed,
    Refunded,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Pending => "pending",
            InvestmentStatus::Confirmed => "confirmed",
            InvestmentStatus::Failed => "failed",
            InvestmentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestmentStatus {
    type Err = FundFlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InvestmentStatus::Pending),
            "confirmed" => Ok(InvestmentStatus::Confirmed),
            "failed" => Ok(InvestmentStatus::Failed),
            "refunded" => Ok(InvestmentStatus::Refunded),
            other => Err(FundFlowError::Validation(format!(
                "unknown investment status: {}",
                other
            ))),
        }
    }
}

/// A vote cast with this investment's voting power
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneVote {
    pub milestone_id: String,
    pub choice: VoteChoice,
    pub voting_power: u64,
    pub voted_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investment {
    pub id: String,
    pub campaign_id: String,
    pub investor_address: String,
    /// Gross amount sent by the investor
    pub amount: u64,
    pub platform_fee: u64,
    pub net_amount: u64,
    pub voting_power: u64,
    pub status: InvestmentStatus,
    pub transaction_hash: Option<String>,
    pub votes: Vec<MilestoneVote>,
    pub created_at: u64,
    pub updated_at: u64,
    pub confirmed_at: Option<u64>,
}

impl Investment {
    /// Create a pending investment, deducting the platform fee
    pub fn new(
        campaign_id: impl Into<String>,
        investor_address: &str,
        amount: u64,
        fee_bps: u16,
        now: u64,
    ) -> Result<Self> {
        let investor_address = validate_address(investor_address)?;
        if amount == 0 {
            return Err(FundFlowError::Validation(
                "investment amount must be > 0".to_string(),
            ));
        }
        let platform_fee = platform_fee(amount, fee_bps);
        let net_amount = amount - platform_fee;
        if net_amount == 0 {
            return Err(FundFlowError::Validation(
                "investment amount does not cover the platform fee".to_string(),
            ));
        }

        Ok(Self {
            id: generate_id("inv"),
            campaign_id: campaign_id.into(),
            investor_address,
            amount,
            platform_fee,
            net_amount,
            voting_power: net_amount,
            status: InvestmentStatus::Pending,
            transaction_hash: None,
            votes: Vec::new(),
            created_at: now,
            updated_at: now,
            confirmed_at: None,
        })
    }

    /// Settlement succeeded
    pub fn confirm(&mut self, tx_hash: impl Into<String>, now: u64) -> Result<()> {
        if self.status != InvestmentStatus::Pending {
            return Err(FundFlowError::transition(self.status, "confirm investment"));
        }
        self.status = InvestmentStatus::Confirmed;
        self.transaction_hash = Some(tx_hash.into());
        self.confirmed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Settlement failed
    pub fn mark_failed(&mut self, now: u64) -> Result<()> {
        if self.status != InvestmentStatus::Pending {
            return Err(FundFlowError::transition(self.status, "fail investment"));
        }
        self.status = InvestmentStatus::Failed;
        self.updated_at = now;
        Ok(())
    }

    /// Administrative override. Returns false when the status was unchanged.
    pub fn override_status(&mut self, status: InvestmentStatus, now: u64) -> bool {
        if self.status == status {
            return false;
        }
        if status == InvestmentStatus::Confirmed && self.confirmed_at.is_none() {
            self.confirmed_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
        true
    }

    /// Record this investment's vote on a milestone, replacing any earlier one
    pub fn record_vote(&mut self, milestone_id: &str, choice: VoteChoice, now: u64) {
        let vote = MilestoneVote {
            milestone_id: milestone_id.to_string(),
            choice,
            voting_power: self.voting_power,
            voted_at: now,
        };
        match self.votes.iter_mut().find(|v| v.milestone_id == milestone_id) {
            Some(existing) => *existing = vote,
            None => self.votes.push(vote),
        }
        self.updated_at = now;
    }

    pub fn vote_for(&self, milestone_id: &str) -> Option<&MilestoneVote> {
        self.votes.iter().find(|v| v.milestone_id == milestone_id)
    }

    /// Whether this investment counts towards the campaign's raised amount
    pub fn is_counted(&self) -> bool {
        self.status == InvestmentStatus::Confirmed
    }
}

/// Fee in base units for `amount` at `fee_bps` basis points, rounded down
pub fn platform_fee(amount: u64, fee_bps: u16) -> u64 {
    ((amount as u128 * fee_bps as u128) / BPS_DENOMINATOR as u128) as u64
}
