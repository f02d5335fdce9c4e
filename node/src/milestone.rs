//! Milestone voting state machine
//!
//! ```text
//! pending → in-progress → submitted → voting → {approved | rejected} → completed
//! ```
//!
//! Votes are weighted by voting power. An investor holds at most one vote per
//! milestone; voting again replaces the earlier vote and its tally
//! contribution. A vote is resolved only after its deadline and only once
//! quorum is reached.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{FundFlowError, Result};
use crate::util::{generate_id, percentage, validate_address};

/// Default share of voting power required to approve a milestone
pub const DEFAULT_APPROVAL_PERCENTAGE: u8 = 50;

/// Maximum milestone title length
pub const MAX_TITLE_LENGTH: usize = 128;

/// Lifecycle state of a milestone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Submitted,
    Voting,
    Approved,
    Rejected,
    Completed,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::InProgress => "in-progress",
            MilestoneStatus::Submitted => "submitted",
            MilestoneStatus::Voting => "voting",
            MilestoneStatus::Approved => "approved",
            MilestoneStatus::Rejected => "rejected",
            MilestoneStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MilestoneStatus {
    type Err = FundFlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MilestoneStatus::Pending),
            "in-progress" => Ok(MilestoneStatus::InProgress),
            "submitted" => Ok(MilestoneStatus::Submitted),
            "voting" => Ok(MilestoneStatus::Voting),
            "approved" => Ok(MilestoneStatus::Approved),
            "rejected" => Ok(MilestoneStatus::Rejected),
            "completed" => Ok(MilestoneStatus::Completed),
            other => Err(FundFlowError::Validation(format!(
                "unknown milestone status: {}",
                other
            ))),
        }
    }
}

/// An investor's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    For,
    Against,
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteChoice::For => f.write_str("for"),
            VoteChoice::Against => f.write_str("against"),
        }
    }
}

/// Proof of work attached by the campaign creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub attached_at: u64,
}

/// One investor's current vote on a milestone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub investor_address: String,
    pub choice: VoteChoice,
    pub voting_power: u64,
    pub tx_id: Option<String>,
    pub voted_at: u64,
}

/// Bookkeeping for a completed fund release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundRelease {
    pub amount: u64,
    pub tx_hash: String,
    pub released_at: u64,
}

/// One fundable checkpoint within a campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub campaign_id: String,
    /// Position within the campaign, starting at 1
    pub order: u32,
    pub title: String,
    pub description: String,
    pub target_amount: u64,
    pub status: MilestoneStatus,

    pub evidence: Vec<Evidence>,
    pub submission_notes: Option<String>,
    pub submitted_at: Option<u64>,

    /// Current vote per investor address
    pub votes: BTreeMap<String, VoteRecord>,
    pub votes_for: u32,
    pub votes_against: u32,
    pub voting_power_for: u64,
    pub voting_power_against: u64,
    pub total_voting_power: u64,
    pub voting_deadline: Option<u64>,

    pub required_approval_percentage: u8,
    /// Quorum: participating voting power needed before a vote resolves
    pub minimum_voting_power: u64,

    pub funds_released: bool,
    pub release: Option<FundRelease>,

    pub created_at: u64,
    pub updated_at: u64,
}

impl Milestone {
    /// Create a pending milestone
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        campaign_id: impl Into<String>,
        order: u32,
        title: impl Into<String>,
        description: impl Into<String>,
        target_amount: u64,
        required_approval_percentage: u8,
        minimum_voting_power: u64,
        now: u64,
    ) -> Result<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() || title.len() > MAX_TITLE_LENGTH {
            return Err(FundFlowError::Validation(format!(
                "milestone title must be 1-{} characters",
                MAX_TITLE_LENGTH
            )));
        }
        if target_amount == 0 {
            return Err(FundFlowError::Validation(
                "milestone target amount must be > 0".to_string(),
            ));
        }
        if required_approval_percentage == 0 || required_approval_percentage > 100 {
            return Err(FundFlowError::Validation(format!(
                "required approval percentage {} out of range [1, 100]",
                required_approval_percentage
            )));
        }

        Ok(Self {
            id: generate_id("ms"),
            campaign_id: campaign_id.into(),
            order,
            title,
            description: description.into(),
            target_amount,
            status: MilestoneStatus::Pending,
            evidence: Vec::new(),
            submission_notes: None,
            submitted_at: None,
            votes: BTreeMap::new(),
            votes_for: 0,
            votes_against: 0,
            voting_power_for: 0,
            voting_power_against: 0,
            total_voting_power: 0,
            voting_deadline: None,
            required_approval_percentage,
            minimum_voting_power,
            funds_released: false,
            release: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Begin work on the milestone
    pub fn start(&mut self, now: u64) -> Result<()> {
        if self.status != MilestoneStatus::Pending {
            return Err(FundFlowError::transition(self.status, "start work"));
        }
        self.status = MilestoneStatus::InProgress;
        self.updated_at = now;
        Ok(())
    }

    /// Attach evidence without opening a vote
    pub fn attach_evidence(
        &mut self,
        evidence: Vec<Evidence>,
        notes: Option<String>,
        now: u64,
    ) -> Result<()> {
        match self.status {
            MilestoneStatus::Pending | MilestoneStatus::InProgress | MilestoneStatus::Submitted => {}
            other => return Err(FundFlowError::transition(other, "attach evidence")),
        }
        self.push_evidence(evidence, notes, now);
        self.status = MilestoneStatus::Submitted;
        self.submitted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Open investor voting until `voting_deadline`
    ///
    /// Allowed from pending, in-progress, submitted and rejected, and from an
    /// expired voting round that never reached quorum. Each round starts with
    /// empty tallies.
    pub fn submit_for_voting(
        &mut self,
        evidence: Vec<Evidence>,
        notes: Option<String>,
        voting_deadline: u64,
        now: u64,
    ) -> Result<()> {
        let allowed = match self.status {
            MilestoneStatus::Pending
            | MilestoneStatus::InProgress
            | MilestoneStatus::Submitted
            | MilestoneStatus::Rejected => true,
            MilestoneStatus::Voting => self.voting_deadline.map_or(false, |d| now > d),
            MilestoneStatus::Approved | MilestoneStatus::Completed => false,
        };
        if !allowed || self.funds_released {
            return Err(FundFlowError::transition(self.status, "submit for voting"));
        }
        if voting_deadline <= now {
            return Err(FundFlowError::Validation(
                "voting deadline must be in the future".to_string(),
            ));
        }

        self.push_evidence(evidence, notes, now);
        self.clear_votes();
        self.status = MilestoneStatus::Voting;
        self.submitted_at = Some(now);
        self.voting_deadline = Some(voting_deadline);
        self.updated_at = now;

        info!(
            "Milestone {} open for voting until {}",
            self.id, voting_deadline
        );
        Ok(())
    }

    /// Record or replace an investor's vote
    pub fn add_vote(
        &mut self,
        investor_address: &str,
        voting_power: u64,
        choice: VoteChoice,
        tx_id: Option<String>,
        now: u64,
    ) -> Result<()> {
        if !self.is_voting_open(now) {
            return Err(FundFlowError::VotingClosed(self.id.clone()));
        }
        let investor = validate_address(investor_address)?;
        if voting_power == 0 {
            return Err(FundFlowError::NoVotingPower(investor));
        }

        let record = VoteRecord {
            investor_address: investor.clone(),
            choice,
            voting_power,
            tx_id,
            voted_at: now,
        };

        let previous = self.votes.get(&investor).cloned();
        self.replace_tally(previous.as_ref(), Some(&record))?;
        if let Some(previous) = previous {
            debug!(
                "Investor {} changed vote on {} from {} to {}",
                investor, self.id, previous.choice, choice
            );
        }

        self.votes.insert(investor, record);
        self.updated_at = now;
        Ok(())
    }

    /// Re-weight an existing vote after the investor's stake changed
    ///
    /// Applies while the round is still unresolved, including after the
    /// deadline. Zero power withdraws the vote. Returns whether the tally
    /// changed.
    pub fn reweigh_vote(&mut self, investor_address: &str, voting_power: u64, now: u64) -> Result<bool> {
        if self.status != MilestoneStatus::Voting || self.funds_released {
            return Ok(false);
        }
        let Some(previous) = self.votes.get(investor_address).cloned() else {
            return Ok(false);
        };
        if previous.voting_power == voting_power {
            return Ok(false);
        }

        if voting_power == 0 {
            self.replace_tally(Some(&previous), None)?;
            self.votes.remove(investor_address);
            info!(
                "Vote of {} on milestone {} withdrawn: no counted stake left",
                investor_address, self.id
            );
        } else {
            let record = VoteRecord {
                voting_power,
                ..previous.clone()
            };
            self.replace_tally(Some(&previous), Some(&record))?;
            self.votes.insert(investor_address.to_string(), record);
            debug!(
                "Vote of {} on milestone {} re-weighted from {} to {}",
                investor_address, self.id, previous.voting_power, voting_power
            );
        }
        self.updated_at = now;
        Ok(true)
    }

    /// Resolve the vote once the deadline has passed and quorum is met
    ///
    /// Returns the new status when a transition happened.
    pub fn check_approval_status(&mut self, now: u64) -> Option<MilestoneStatus> {
        if self.status != MilestoneStatus::Voting || self.funds_released {
            return None;
        }
        match self.voting_deadline {
            Some(deadline) if now > deadline => {}
            _ => return None,
        }
        if !self.quorum_met() {
            return None;
        }

        self.status = if self.approval_threshold_met() {
            MilestoneStatus::Approved
        } else {
            MilestoneStatus::Rejected
        };
        self.updated_at = now;

        info!(
            "Milestone {} {} with {:.2}% of {} voting power",
            self.id,
            self.status,
            self.approval_percentage(),
            self.total_voting_power
        );
        Some(self.status)
    }

    /// Mark funds as released
    ///
    /// Does not check approval; callers must only release approved milestones.
    pub fn release_funds(&mut self, amount: u64, tx_hash: impl Into<String>, now: u64) {
        self.funds_released = true;
        self.status = MilestoneStatus::Completed;
        self.release = Some(FundRelease {
            amount,
            tx_hash: tx_hash.into(),
            released_at: now,
        });
        self.updated_at = now;
    }

    pub fn is_voting_open(&self, now: u64) -> bool {
        self.status == MilestoneStatus::Voting
            && !self.funds_released
            && self.voting_deadline.map_or(false, |d| now <= d)
    }

    pub fn quorum_met(&self) -> bool {
        self.total_voting_power > 0 && self.total_voting_power >= self.minimum_voting_power
    }

    pub fn approval_threshold_met(&self) -> bool {
        (self.voting_power_for as u128) * 100
            >= (self.required_approval_percentage as u128) * (self.total_voting_power as u128)
    }

    /// Share of participating voting power in favour, as a percentage
    pub fn approval_percentage(&self) -> f64 {
        percentage(self.voting_power_for, self.total_voting_power)
    }

    pub fn vote_of(&self, investor_address: &str) -> Option<&VoteRecord> {
        self.votes.get(investor_address)
    }

    fn push_evidence(&mut self, evidence: Vec<Evidence>, notes: Option<String>, now: u64) {
        self.evidence.extend(evidence.into_iter().map(|mut e| {
            e.attached_at = now;
            e
        }));
        if notes.is_some() {
            self.submission_notes = notes;
        }
    }

    fn clear_votes(&mut self) {
        self.votes.clear();
        self.votes_for = 0;
        self.votes_against = 0;
        self.voting_power_for = 0;
        self.voting_power_against = 0;
        self.total_voting_power = 0;
    }

    /// Swap one vote's contribution for another's, all or nothing
    fn replace_tally(&mut self, old: Option<&VoteRecord>, new: Option<&VoteRecord>) -> Result<()> {
        let mut votes_for = self.votes_for;
        let mut votes_against = self.votes_against;
        let mut power_for = self.voting_power_for;
        let mut power_against = self.voting_power_against;
        let mut total = self.total_voting_power;

        if let Some(old) = old {
            match old.choice {
                VoteChoice::For => {
                    votes_for = votes_for.saturating_sub(1);
                    power_for = power_for.saturating_sub(old.voting_power);
                }
                VoteChoice::Against => {
                    votes_against = votes_against.saturating_sub(1);
                    power_against = power_against.saturating_sub(old.voting_power);
                }
            }
            total = total.saturating_sub(old.voting_power);
        }

        if let Some(new) = new {
            let overflow = || {
                FundFlowError::Validation(format!("voting power on milestone {} overflows", self.id))
            };
            match new.choice {
                VoteChoice::For => {
                    votes_for = votes_for.checked_add(1).ok_or_else(overflow)?;
                    power_for = power_for.checked_add(new.voting_power).ok_or_else(overflow)?;
                }
                VoteChoice::Against => {
                    votes_against = votes_against.checked_add(1).ok_or_else(overflow)?;
                    power_against = power_against
                        .checked_add(new.voting_power)
                        .ok_or_else(overflow)?;
                }
            }
            total = total.checked_add(new.voting_power).ok_or_else(overflow)?;
        }

        self.votes_for = votes_for;
        self.votes_against = votes_against;
        self.voting_power_for = power_for;
        self.voting_power_against = power_against;
        self.total_voting_power = total;
        Ok(())
    }
}
