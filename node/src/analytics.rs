//! Read-only views over the ledger: platform statistics, campaign analytics,
//! investor portfolios and campaign reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::campaign::CampaignStatus;
use crate::error::{FundFlowError, Result};
use crate::investment::{Investment, InvestmentStatus};
use crate::milestone::MilestoneStatus;
use crate::store::Ledger;
use crate::util::percentage;

/// Default portfolio page size
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest accepted portfolio page size
pub const MAX_PAGE_SIZE: usize = 100;

/// Investors listed in campaign analytics
const TOP_INVESTOR_COUNT: usize = 5;

const SECONDS_PER_DAY: u64 = 24 * 3600;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_campaigns: usize,
    pub active_campaigns: usize,
    pub completed_campaigns: usize,
    pub failed_campaigns: usize,
    pub cancelled_campaigns: usize,
    /// Confirmed net amounts across all campaigns
    pub total_raised: u64,
    pub total_released: u64,
    pub total_fees: u64,
    pub total_investments: usize,
    pub confirmed_investments: usize,
    pub pending_investments: usize,
    pub unique_investors: usize,
    pub total_milestones: usize,
    pub milestones_in_voting: usize,
    pub milestones_completed: usize,
    /// Completed campaigns as a share of resolved ones
    pub success_rate: f64,
}

pub fn platform_stats(ledger: &Ledger) -> PlatformStats {
    let mut stats = PlatformStats {
        total_campaigns: ledger.campaigns.len(),
        total_investments: ledger.investments.len(),
        total_milestones: ledger.milestones.len(),
        ..Default::default()
    };

    for campaign in ledger.campaigns.values() {
        match campaign.status {
            CampaignStatus::Active => stats.active_campaigns += 1,
            CampaignStatus::Completed => stats.completed_campaigns += 1,
            CampaignStatus::Failed => stats.failed_campaigns += 1,
            CampaignStatus::Cancelled => stats.cancelled_campaigns += 1,
        }
        stats.total_released += campaign.released_amount;
    }

    let mut investors = BTreeSet::new();
    for investment in ledger.investments.values() {
        match investment.status {
            InvestmentStatus::Confirmed => {
                stats.confirmed_investments += 1;
                stats.total_raised += investment.net_amount;
                stats.total_fees += investment.platform_fee;
                investors.insert(investment.investor_address.as_str());
            }
            InvestmentStatus::Pending => stats.pending_investments += 1,
            InvestmentStatus::Failed | InvestmentStatus::Refunded => {}
        }
    }
    stats.unique_investors = investors.len();

    for milestone in ledger.milestones.values() {
        match milestone.status {
            MilestoneStatus::Voting => stats.milestones_in_voting += 1,
            MilestoneStatus::Completed => stats.milestones_completed += 1,
            _ => {}
        }
    }

    let resolved = stats.completed_campaigns + stats.failed_campaigns;
    stats.success_rate = percentage(stats.completed_campaigns as u64, resolved as u64);
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorShare {
    pub investor_address: String,
    pub net_amount: u64,
    pub share_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignAnalytics {
    pub campaign_id: String,
    pub title: String,
    pub status: CampaignStatus,
    pub target_amount: u64,
    pub raised_amount: u64,
    pub funding_progress: f64,
    pub released_amount: u64,
    pub available_for_release: u64,
    pub investor_count: u32,
    pub confirmed_investments: usize,
    pub pending_investments: usize,
    pub average_investment: u64,
    pub largest_investment: u64,
    pub milestones_total: usize,
    pub milestones_completed: usize,
    pub milestones_in_voting: usize,
    /// Whole days until the deadline, 0 once it has passed
    pub days_remaining: u64,
    pub top_investors: Vec<InvestorShare>,
}

pub fn campaign_analytics(ledger: &Ledger, campaign_id: &str, now: u64) -> Result<CampaignAnalytics> {
    let campaign = ledger
        .campaign(campaign_id)
        .ok_or_else(|| FundFlowError::CampaignNotFound(campaign_id.to_string()))?;

    let investments = ledger.campaign_investments(campaign_id);
    let confirmed: Vec<&Investment> = investments.iter().copied().filter(|i| i.is_counted()).collect();
    let pending = investments
        .iter()
        .filter(|i| i.status == InvestmentStatus::Pending)
        .count();

    let mut by_investor: HashMap<&str, u64> = HashMap::new();
    for investment in &confirmed {
        *by_investor.entry(investment.investor_address.as_str()).or_default() += investment.net_amount;
    }
    let raised: u64 = confirmed.iter().map(|i| i.net_amount).sum();
    let mut top_investors: Vec<InvestorShare> = by_investor
        .into_iter()
        .map(|(address, net_amount)| InvestorShare {
            investor_address: address.to_string(),
            net_amount,
            share_percentage: percentage(net_amount, raised),
        })
        .collect();
    top_investors.sort_by(|a, b| {
        b.net_amount
            .cmp(&a.net_amount)
            .then_with(|| a.investor_address.cmp(&b.investor_address))
    });
    top_investors.truncate(TOP_INVESTOR_COUNT);

    let milestones = ledger.campaign_milestones(campaign_id);

    Ok(CampaignAnalytics {
        campaign_id: campaign.id.clone(),
        title: campaign.title.clone(),
        status: campaign.status,
        target_amount: campaign.target_amount,
        raised_amount: campaign.raised_amount,
        funding_progress: campaign.funding_progress(),
        released_amount: campaign.released_amount,
        available_for_release: campaign.available_for_release(),
        investor_count: campaign.investor_count,
        confirmed_investments: confirmed.len(),
        pending_investments: pending,
        average_investment: if confirmed.is_empty() {
            0
        } else {
            confirmed.iter().map(|i| i.amount).sum::<u64>() / confirmed.len() as u64
        },
        largest_investment: confirmed.iter().map(|i| i.amount).max().unwrap_or(0),
        milestones_total: milestones.len(),
        milestones_completed: milestones
            .iter()
            .filter(|m| m.status == MilestoneStatus::Completed)
            .count(),
        milestones_in_voting: milestones
            .iter()
            .filter(|m| m.status == MilestoneStatus::Voting)
            .count(),
        days_remaining: campaign.deadline.saturating_sub(now) / SECONDS_PER_DAY,
        top_investors,
    })
}

/// One investment as seen from the investor's side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub investment_id: String,
    pub campaign_id: String,
    pub campaign_title: String,
    pub campaign_status: Option<CampaignStatus>,
    pub amount: u64,
    pub net_amount: u64,
    pub voting_power: u64,
    pub status: InvestmentStatus,
    pub votes_cast: usize,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub investor_address: String,
    /// Gross confirmed amounts
    pub total_invested: u64,
    pub total_fees: u64,
    pub total_voting_power: u64,
    pub campaigns_backed: usize,
    pub holdings: Vec<Holding>,
    pub page: usize,
    pub limit: usize,
    /// Holdings across all pages
    pub total: usize,
}

/// Holdings for `investor_address`, newest first; `page` starts at 1
pub fn portfolio(ledger: &Ledger, investor_address: &str, page: usize, limit: usize) -> Portfolio {
    let page = page.max(1);
    let limit = if limit == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    };

    let investments = ledger.investor_investments(investor_address);
    let confirmed: Vec<&&Investment> = investments.iter().filter(|i| i.is_counted()).collect();
    let campaigns_backed = confirmed
        .iter()
        .map(|i| i.campaign_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    let holdings = investments
        .iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .map(|i| {
            let campaign = ledger.campaign(&i.campaign_id);
            Holding {
                investment_id: i.id.clone(),
                campaign_id: i.campaign_id.clone(),
                campaign_title: campaign.map(|c| c.title.clone()).unwrap_or_default(),
                campaign_status: campaign.map(|c| c.status),
                amount: i.amount,
                net_amount: i.net_amount,
                voting_power: i.voting_power,
                status: i.status,
                votes_cast: i.votes.len(),
                created_at: i.created_at,
            }
        })
        .collect();

    Portfolio {
        investor_address: investor_address.to_string(),
        total_invested: confirmed.iter().map(|i| i.amount).sum(),
        total_fees: confirmed.iter().map(|i| i.platform_fee).sum(),
        total_voting_power: confirmed.iter().map(|i| i.voting_power).sum(),
        campaigns_backed,
        holdings,
        page,
        limit,
        total: investments.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneReport {
    pub milestone_id: String,
    pub order: u32,
    pub title: String,
    pub status: MilestoneStatus,
    pub target_amount: u64,
    pub votes_for: u32,
    pub votes_against: u32,
    pub approval_percentage: f64,
    pub voting_deadline: Option<String>,
    pub released_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub generated_at: String,
    pub deadline: String,
    pub creator_address: String,
    pub analytics: CampaignAnalytics,
    pub milestones: Vec<MilestoneReport>,
}

pub fn campaign_report(ledger: &Ledger, campaign_id: &str, now: u64) -> Result<CampaignReport> {
    let analytics = campaign_analytics(ledger, campaign_id, now)?;
    let campaign = ledger
        .campaign(campaign_id)
        .ok_or_else(|| FundFlowError::CampaignNotFound(campaign_id.to_string()))?;

    let milestones = ledger
        .campaign_milestones(campaign_id)
        .into_iter()
        .map(|m| MilestoneReport {
            milestone_id: m.id.clone(),
            order: m.order,
            title: m.title.clone(),
            status: m.status,
            target_amount: m.target_amount,
            votes_for: m.votes_for,
            votes_against: m.votes_against,
            approval_percentage: m.approval_percentage(),
            voting_deadline: m.voting_deadline.map(format_timestamp),
            released_at: m.release.as_ref().map(|r| format_timestamp(r.released_at)),
        })
        .collect();

    Ok(CampaignReport {
        generated_at: format_timestamp(now),
        deadline: format_timestamp(campaign.deadline),
        creator_address: campaign.creator_address.clone(),
        analytics,
        milestones,
    })
}

/// RFC 3339 rendering of a Unix timestamp
pub fn format_timestamp(secs: u64) -> String {
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::Campaign;
    use crate::milestone::Milestone;

    const NOW: u64 = 1_700_000_000;

    fn ledger_with_campaign() -> (Ledger, String) {
        let mut ledger = Ledger::default();
        let mut campaign =
            Campaign::new("Solar", "", "0xcreator", 10_000, NOW + 10 * SECONDS_PER_DAY, NOW).unwrap();
        let cid = campaign.id.clone();

        let mut investments = Vec::new();
        for (investor, amount) in [("0xalice", 4_000), ("0xbob", 1_000), ("0xalice", 1_000)] {
            let mut inv = Investment::new(cid.clone(), investor, amount, 250, NOW).unwrap();
            inv.confirm("0xtx", NOW).unwrap();
            investments.push(inv);
        }
        investments.push(Investment::new(cid.clone(), "0xcarol", 500, 250, NOW).unwrap());
        campaign.rebuild_investments(&investments, NOW);

        let milestone = Milestone::new(cid.clone(), 1, "Panels", "", 2_000, 50, 0, NOW).unwrap();
        campaign.rebuild_milestones([&milestone], NOW);

        ledger.milestones.insert(milestone.id.clone(), milestone);
        for inv in investments {
            ledger.investments.insert(inv.id.clone(), inv);
        }
        ledger.campaigns.insert(cid.clone(), campaign);
        (ledger, cid)
    }

    #[test]
    fn test_platform_stats() {
        let (ledger, _) = ledger_with_campaign();
        let stats = platform_stats(&ledger);
        assert_eq!(stats.total_campaigns, 1);
        assert_eq!(stats.active_campaigns, 1);
        assert_eq!(stats.confirmed_investments, 3);
        assert_eq!(stats.pending_investments, 1);
        assert_eq!(stats.unique_investors, 2);
        assert_eq!(stats.total_raised, 3_900 + 975 + 975);
        assert_eq!(stats.total_fees, 150);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn test_campaign_analytics() {
        let (ledger, cid) = ledger_with_campaign();
        let analytics = campaign_analytics(&ledger, &cid, NOW).unwrap();

        assert_eq!(analytics.raised_amount, 5_850);
        assert_eq!(analytics.investor_count, 2);
        assert_eq!(analytics.pending_investments, 1);
        assert_eq!(analytics.largest_investment, 4_000);
        assert_eq!(analytics.average_investment, 2_000);
        assert_eq!(analytics.days_remaining, 10);
        assert_eq!(analytics.top_investors[0].investor_address, "0xalice");
        assert_eq!(analytics.top_investors[0].net_amount, 4_875);
        assert_eq!(analytics.milestones_total, 1);

        assert!(campaign_analytics(&ledger, "cmp_missing", NOW).is_err());
    }

    #[test]
    fn test_portfolio_pagination() {
        let (ledger, _) = ledger_with_campaign();

        let first = portfolio(&ledger, "0xalice", 1, 1);
        assert_eq!(first.total, 2);
        assert_eq!(first.holdings.len(), 1);
        assert_eq!(first.total_invested, 5_000);
        assert_eq!(first.total_voting_power, 4_875);
        assert_eq!(first.campaigns_backed, 1);

        let second = portfolio(&ledger, "0xalice", 2, 1);
        assert_eq!(second.holdings.len(), 1);
        assert_ne!(first.holdings[0].investment_id, second.holdings[0].investment_id);

        let beyond = portfolio(&ledger, "0xalice", 5, 1);
        assert!(beyond.holdings.is_empty());

        let defaults = portfolio(&ledger, "0xalice", 0, 0);
        assert_eq!(defaults.page, 1);
        assert_eq!(defaults.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(portfolio(&ledger, "0xalice", 1, 5_000).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_campaign_report() {
        let (ledger, cid) = ledger_with_campaign();
        let report = campaign_report(&ledger, &cid, NOW).unwrap();
        assert_eq!(report.generated_at, "2023-11-14T22:13:20+00:00");
        assert_eq!(report.milestones.len(), 1);
        assert_eq!(report.milestones[0].status, MilestoneStatus::Pending);
        assert!(report.milestones[0].released_at.is_none());
    }
}
