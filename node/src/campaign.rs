//! Campaign documents
//!
//! A campaign embeds summaries of its milestones and confirmed investments.
//! The standalone milestone and investment documents are authoritative; the
//! embedded arrays are rebuilt from them whenever either changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::error::{FundFlowError, Result};
use crate::investment::Investment;
use crate::milestone::{Milestone, MilestoneStatus};
use crate::util::{generate_id, percentage, validate_address};

/// Maximum campaign title length
pub const MAX_TITLE_LENGTH: usize = 128;

/// Maximum campaign description length
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Completed,
    Cancelled,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
            CampaignStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CampaignStatus::Active)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = FundFlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(CampaignStatus::Active),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            "failed" => Ok(CampaignStatus::Failed),
            other => Err(FundFlowError::Validation(format!(
                "unknown campaign status: {}",
                other
            ))),
        }
    }
}

/// Embedded copy of a milestone's headline fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneSummary {
    pub milestone_id: String,
    pub order: u32,
    pub title: String,
    pub target_amount: u64,
    pub status: MilestoneStatus,
    pub funds_released: bool,
}

impl MilestoneSummary {
    fn from_milestone(m: &Milestone) -> Self {
        Self {
            milestone_id: m.id.clone(),
            order: m.order,
            title: m.title.clone(),
            target_amount: m.target_amount,
            status: m.status,
            funds_released: m.funds_released,
        }
    }
}

/// Embedded copy of a confirmed investment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentSummary {
    pub investment_id: String,
    pub investor_address: String,
    pub net_amount: u64,
    pub invested_at: u64,
}

impl InvestmentSummary {
    fn from_investment(inv: &Investment) -> Self {
        Self {
            investment_id: inv.id.clone(),
            investor_address: inv.investor_address.clone(),
            net_amount: inv.net_amount,
            invested_at: inv.confirmed_at.unwrap_or(inv.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub title: String,
    pub description: String,
    pub creator_address: String,
    pub target_amount: u64,
    /// Sum of confirmed net amounts
    pub raised_amount: u64,
    /// Sum of milestone payouts
    pub released_amount: u64,
    pub deadline: u64,
    pub status: CampaignStatus,
    /// Ordered by milestone `order`
    pub milestones: Vec<MilestoneSummary>,
    pub investments: Vec<InvestmentSummary>,
    pub investor_count: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Campaign {
    /// Launch a campaign
    pub fn new(
        title: &str,
        description: &str,
        creator_address: &str,
        target_amount: u64,
        deadline: u64,
        now: u64,
    ) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() || title.len() > MAX_TITLE_LENGTH {
            return Err(FundFlowError::Validation(format!(
                "campaign title must be 1-{} characters",
                MAX_TITLE_LENGTH
            )));
        }
        if description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(FundFlowError::Validation(format!(
                "campaign description too long: {} chars (max {})",
                description.len(),
                MAX_DESCRIPTION_LENGTH
            )));
        }
        let creator_address = validate_address(creator_address)?;
        if target_amount == 0 {
            return Err(FundFlowError::Validation(
                "campaign target amount must be > 0".to_string(),
            ));
        }
        if deadline <= now {
            return Err(FundFlowError::Validation(
                "campaign deadline must be in the future".to_string(),
            ));
        }

        Ok(Self {
            id: generate_id("cmp"),
            title: title.to_string(),
            description: description.to_string(),
            creator_address,
            target_amount,
            raised_amount: 0,
            released_amount: 0,
            deadline,
            status: CampaignStatus::Active,
            milestones: Vec::new(),
            investments: Vec::new(),
            investor_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether new investments may be recorded at `now`
    pub fn accepts_investments(&self, now: u64) -> bool {
        self.status == CampaignStatus::Active && now <= self.deadline
    }

    /// Append a confirmed investment and refresh the aggregates
    pub fn add_investment(&mut self, investment: &Investment, now: u64) -> Result<()> {
        if self.status != CampaignStatus::Active {
            return Err(FundFlowError::CampaignNotActive(self.id.clone()));
        }
        if investment.campaign_id != self.id {
            return Err(FundFlowError::Validation(format!(
                "investment {} belongs to campaign {}",
                investment.id, investment.campaign_id
            )));
        }
        if self
            .investments
            .iter()
            .any(|s| s.investment_id == investment.id)
        {
            return Err(FundFlowError::Validation(format!(
                "investment {} already recorded",
                investment.id
            )));
        }
        let raised = self
            .raised_amount
            .checked_add(investment.net_amount)
            .ok_or_else(|| {
                FundFlowError::Validation(format!("raised amount of {} would overflow", self.id))
            })?;

        self.investments
            .push(InvestmentSummary::from_investment(investment));
        self.raised_amount = raised;
        self.recount_investors();
        self.updated_at = now;
        Ok(())
    }

    /// Rebuild the embedded investments from the standalone documents
    pub fn rebuild_investments<'a>(
        &mut self,
        investments: impl IntoIterator<Item = &'a Investment>,
        now: u64,
    ) {
        let mut summaries: Vec<InvestmentSummary> = investments
            .into_iter()
            .filter(|inv| inv.campaign_id == self.id && inv.is_counted())
            .map(InvestmentSummary::from_investment)
            .collect();
        summaries.sort_by(|a, b| {
            a.invested_at
                .cmp(&b.invested_at)
                .then_with(|| a.investment_id.cmp(&b.investment_id))
        });

        self.raised_amount = summaries
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.net_amount));
        self.investments = summaries;
        self.recount_investors();
        self.updated_at = now;
    }

    /// Rebuild the embedded milestones from the standalone documents
    pub fn rebuild_milestones<'a>(
        &mut self,
        milestones: impl IntoIterator<Item = &'a Milestone>,
        now: u64,
    ) {
        let mut summaries: Vec<MilestoneSummary> = milestones
            .into_iter()
            .filter(|m| m.campaign_id == self.id)
            .map(MilestoneSummary::from_milestone)
            .collect();
        summaries.sort_by_key(|s| s.order);

        self.released_amount = milestones_released(&summaries);
        self.milestones = summaries;
        self.updated_at = now;
    }

    fn recount_investors(&mut self) {
        let distinct: BTreeSet<&str> = self
            .investments
            .iter()
            .map(|s| s.investor_address.as_str())
            .collect();
        self.investor_count = distinct.len() as u32;
    }

    /// Resolve an expired active campaign
    ///
    /// Returns the new status when a transition happened.
    pub fn update_status(&mut self, now: u64) -> Option<CampaignStatus> {
        if self.status != CampaignStatus::Active || now <= self.deadline {
            return None;
        }
        self.status = if self.raised_amount >= self.target_amount {
            CampaignStatus::Completed
        } else {
            CampaignStatus::Failed
        };
        self.updated_at = now;

        info!(
            "Campaign {} {} with {}/{} raised",
            self.id, self.status, self.raised_amount, self.target_amount
        );
        Some(self.status)
    }

    pub fn cancel(&mut self, now: u64) -> Result<()> {
        if self.status.is_terminal() {
            return Err(FundFlowError::transition(self.status, "cancel campaign"));
        }
        self.status = CampaignStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Raised funds not yet paid out to milestones
    pub fn available_for_release(&self) -> u64 {
        self.raised_amount.saturating_sub(self.released_amount)
    }

    /// Sum of milestone targets
    pub fn milestone_target_total(&self) -> u64 {
        self.milestones
            .iter()
            .fold(0u64, |acc, m| acc.saturating_add(m.target_amount))
    }

    pub fn funding_progress(&self) -> f64 {
        percentage(self.raised_amount, self.target_amount)
    }

    pub fn next_milestone_order(&self) -> u32 {
        self.milestones.iter().map(|m| m.order).max().unwrap_or(0) + 1
    }
}

fn milestones_released(summaries: &[MilestoneSummary]) -> u64 {
    summaries
        .iter()
        .filter(|s| s.funds_released)
        .fold(0u64, |acc, s| acc.saturating_add(s.target_amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investment::InvestmentStatus;
    use proptest::prelude::*;

    const NOW: u64 = 1_700_000_000;
    const DEADLINE: u64 = NOW + 30 * 24 * 3600;

    fn campaign(target: u64) -> Campaign {
        Campaign::new("Solar farm", "Community solar", "0xcreator", target, DEADLINE, NOW).unwrap()
    }

    fn confirmed(campaign: &Campaign, investor: &str, amount: u64) -> Investment {
        let mut inv = Investment::new(campaign.id.clone(), investor, amount, 0, NOW).unwrap();
        inv.confirm("0xtx", NOW + 1).unwrap();
        inv
    }

    #[test]
    fn test_new_campaign_validation() {
        assert!(Campaign::new("", "", "0xc", 100, DEADLINE, NOW).is_err());
        assert!(Campaign::new("t", "", "", 100, DEADLINE, NOW).is_err());
        assert!(Campaign::new("t", "", "0xc", 0, DEADLINE, NOW).is_err());
        assert!(Campaign::new("t", "", "0xc", 100, NOW, NOW).is_err());
        assert!(Campaign::new("t", &"d".repeat(MAX_DESCRIPTION_LENGTH + 1), "0xc", 100, DEADLINE, NOW).is_err());

        let c = campaign(1_000);
        assert!(c.id.starts_with("cmp_"));
        assert_eq!(c.status, CampaignStatus::Active);
        assert!(c.accepts_investments(NOW));
        assert!(!c.accepts_investments(DEADLINE + 1));
    }

    #[test]
    fn test_add_investment_updates_aggregates() {
        let mut c = campaign(1_000);
        let a1 = confirmed(&c, "0xalice", 300);
        let a2 = confirmed(&c, "0xalice", 200);
        let b1 = confirmed(&c, "0xbob", 100);

        c.add_investment(&a1, NOW + 2).unwrap();
        c.add_investment(&a2, NOW + 2).unwrap();
        c.add_investment(&b1, NOW + 2).unwrap();

        assert_eq!(c.raised_amount, 600);
        assert_eq!(c.investments.len(), 3);
        assert_eq!(c.investor_count, 2);
    }

    #[test]
    fn test_add_investment_rejects_duplicates_and_foreign() {
        let mut c = campaign(1_000);
        let inv = confirmed(&c, "0xalice", 300);
        c.add_investment(&inv, NOW).unwrap();
        assert!(c.add_investment(&inv, NOW).is_err());

        let other = campaign(1_000);
        let foreign = confirmed(&other, "0xbob", 100);
        assert!(c.add_investment(&foreign, NOW).is_err());
        assert_eq!(c.raised_amount, 300);
    }

    #[test]
    fn test_add_investment_requires_active() {
        let mut c = campaign(1_000);
        c.cancel(NOW).unwrap();
        let inv = confirmed(&c, "0xalice", 300);
        assert!(matches!(
            c.add_investment(&inv, NOW),
            Err(FundFlowError::CampaignNotActive(_))
        ));
    }

    #[test]
    fn test_add_investment_rejects_overflow() {
        let mut c = campaign(1_000);
        let whale = confirmed(&c, "0xwhale", u64::MAX);
        c.add_investment(&whale, NOW + 2).unwrap();

        let extra = confirmed(&c, "0xalice", 1);
        assert!(matches!(
            c.add_investment(&extra, NOW + 2),
            Err(FundFlowError::Validation(_))
        ));
        assert_eq!(c.raised_amount, u64::MAX);
        assert_eq!(c.investments.len(), 1);
        assert_eq!(c.investor_count, 1);
    }

    #[test]
    fn test_rebuild_counts_only_confirmed() {
        let mut c = campaign(1_000);
        let a = confirmed(&c, "0xalice", 300);
        let pending = Investment::new(c.id.clone(), "0xbob", 500, 0, NOW).unwrap();
        let mut refunded = confirmed(&c, "0xcarol", 200);
        refunded.override_status(InvestmentStatus::Refunded, NOW + 2);

        c.rebuild_investments([&a, &pending, &refunded], NOW + 3);
        assert_eq!(c.raised_amount, 300);
        assert_eq!(c.investor_count, 1);
        assert_eq!(c.investments[0].investor_address, "0xalice");
    }

    #[test]
    fn test_rebuild_milestones_sorted_with_released_total() {
        let mut c = campaign(1_000);
        let mut m2 = Milestone::new(c.id.clone(), 2, "Second", "", 400, 50, 0, NOW).unwrap();
        let m1 = Milestone::new(c.id.clone(), 1, "First", "", 300, 50, 0, NOW).unwrap();
        m2.release_funds(400, "0xtx", NOW + 1);

        c.rebuild_milestones([&m2, &m1], NOW + 2);
        assert_eq!(c.milestones[0].title, "First");
        assert_eq!(c.milestones[1].status, MilestoneStatus::Completed);
        assert_eq!(c.released_amount, 400);
        assert_eq!(c.milestone_target_total(), 700);
        assert_eq!(c.next_milestone_order(), 3);
    }

    #[test]
    fn test_update_status_completed_when_target_met() {
        let mut c = campaign(1_000);
        c.raised_amount = 1_200;
        assert_eq!(c.update_status(DEADLINE + 1), Some(CampaignStatus::Completed));
    }

    #[test]
    fn test_update_status_failed_when_target_missed() {
        let mut c = campaign(1_000);
        c.raised_amount = 800;
        assert_eq!(c.update_status(DEADLINE + 1), Some(CampaignStatus::Failed));
    }

    #[test]
    fn test_update_status_noop_before_deadline_or_terminal() {
        let mut c = campaign(1_000);
        c.raised_amount = 5_000;
        assert_eq!(c.update_status(DEADLINE), None);
        assert_eq!(c.status, CampaignStatus::Active);

        c.cancel(NOW).unwrap();
        assert_eq!(c.update_status(DEADLINE + 1), None);
        assert_eq!(c.status, CampaignStatus::Cancelled);
        assert!(c.cancel(NOW).is_err());
    }

    #[test]
    fn test_available_for_release() {
        let mut c = campaign(1_000);
        c.raised_amount = 900;
        c.released_amount = 400;
        assert_eq!(c.available_for_release(), 500);
        assert_eq!(c.funding_progress(), 90.0);
    }

    proptest! {
        #[test]
        fn prop_investor_count_matches_distinct_addresses(
            entries in prop::collection::vec((0usize..6, 1u64..10_000), 0..50)
        ) {
            let investors = ["0xa", "0xb", "0xc", "0xd", "0xe", "0xf"];
            let mut c = campaign(1_000_000);
            for (idx, amount) in entries {
                let inv = confirmed(&c, investors[idx], amount);
                c.add_investment(&inv, NOW + 2).unwrap();
            }

            let distinct: BTreeSet<&str> =
                c.investments.iter().map(|s| s.investor_address.as_str()).collect();
            prop_assert_eq!(c.investor_count as usize, distinct.len());
            let sum: u64 = c.investments.iter().map(|s| s.net_amount).sum();
            prop_assert_eq!(c.raised_amount, sum);
        }
    }
}
