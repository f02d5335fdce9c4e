//! Campaign Service
//!
//! Orchestrates campaigns, milestones and investments on top of the
//! [`LedgerStore`]. Milestone and investment documents are authoritative;
//! every write that touches them rebuilds the owning campaign's embedded
//! summaries inside the same transaction.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::analytics::{self, CampaignAnalytics, CampaignReport, PlatformStats, Portfolio};
use crate::campaign::{Campaign, CampaignStatus};
use crate::config::FundFlowConfig;
use crate::error::{FundFlowError, Result};
use crate::events::{LedgerEvent, EVENT_CHANNEL_CAPACITY};
use crate::investment::{Investment, InvestmentStatus};
use crate::milestone::{Evidence, Milestone, MilestoneStatus, VoteChoice};
use crate::payment::PaymentGateway;
use crate::scheduler::SweepReport;
use crate::store::{LedgerStore, Transaction};
use crate::util::{current_timestamp, validate_address};

/// Source of the current Unix time
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Business rules applied by the service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub fee_bps: u16,
    pub min_investment: u64,
    pub voting_period_secs: u64,
    pub required_approval_percentage: u8,
    pub minimum_voting_power: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&FundFlowConfig::default())
    }
}

impl From<&FundFlowConfig> for ServiceConfig {
    fn from(config: &FundFlowConfig) -> Self {
        Self {
            fee_bps: config.platform.fee_bps,
            min_investment: config.platform.min_investment,
            voting_period_secs: config.voting.voting_period_secs,
            required_approval_percentage: config.voting.required_approval_percentage,
            minimum_voting_power: config.voting.minimum_voting_power,
        }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub creator_address: String,
    pub target_amount: u64,
    /// Unix seconds
    pub deadline: u64,
}

/// Body for creator-only actions that carry no other data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorRequest {
    pub creator_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMilestoneRequest {
    pub creator_address: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub target_amount: u64,
    #[serde(default)]
    pub required_approval_percentage: Option<u8>,
    #[serde(default)]
    pub minimum_voting_power: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordInvestmentRequest {
    pub investor_address: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInvestmentStatusRequest {
    pub status: InvestmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRequest {
    pub creator_address: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitMilestoneRequest {
    pub creator_address: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Defaults to now plus the configured voting period
    #[serde(default)]
    pub voting_deadline: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub investor_address: String,
    #[serde(alias = "vote")]
    pub choice: VoteChoice,
    #[serde(default)]
    pub tx_id: Option<String>,
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct CampaignService {
    store: Arc<LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: ServiceConfig,
    clock: Clock,
    events: broadcast::Sender<LedgerEvent>,
}

impl CampaignService {
    pub fn new(
        store: Arc<LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: ServiceConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            gateway,
            config,
            clock: Arc::new(current_timestamp),
            events,
        }
    }

    /// Replace the wall clock, mainly for deadline tests
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    fn emit(&self, event: LedgerEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    // =========================================================================
    // CAMPAIGNS
    // =========================================================================

    pub async fn create_campaign(&self, request: CreateCampaignRequest) -> Result<Campaign> {
        let now = self.now();
        let campaign = Campaign::new(
            &request.title,
            &request.description,
            &request.creator_address,
            request.target_amount,
            request.deadline,
            now,
        )?;

        let created = campaign.clone();
        self.store
            .transaction(move |tx| {
                tx.put_campaign(campaign);
                Ok(())
            })
            .await?;

        info!(
            "Campaign {} created by {} with target {}",
            created.id, created.creator_address, created.target_amount
        );
        self.emit(LedgerEvent::CampaignCreated {
            campaign_id: created.id.clone(),
            target_amount: created.target_amount,
        });
        Ok(created)
    }

    pub async fn cancel_campaign(&self, campaign_id: &str, creator_address: &str) -> Result<Campaign> {
        let now = self.now();
        let campaign = self
            .store
            .transaction(|tx| {
                let mut campaign = find_campaign(tx, campaign_id)?;
                ensure_creator(&campaign, creator_address)?;
                campaign.cancel(now)?;
                tx.put_campaign(campaign.clone());
                Ok(campaign)
            })
            .await?;

        info!("Campaign {} cancelled", campaign.id);
        self.emit(LedgerEvent::CampaignStatusChanged {
            campaign_id: campaign.id.clone(),
            status: campaign.status,
        });
        Ok(campaign)
    }

    pub async fn get_campaign(&self, campaign_id: &str) -> Result<Campaign> {
        self.store
            .read(|ledger| ledger.campaign(campaign_id).cloned())
            .await
            .ok_or_else(|| FundFlowError::CampaignNotFound(campaign_id.to_string()))
    }

    /// Campaigns newest first, optionally filtered by status
    ///
    /// Returns the requested page and the total number of matches.
    pub async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
        offset: usize,
        limit: usize,
    ) -> (Vec<Campaign>, usize) {
        self.store
            .read(|ledger| {
                let mut matches: Vec<&Campaign> = ledger
                    .campaigns
                    .values()
                    .filter(|c| status.map_or(true, |s| c.status == s))
                    .collect();
                matches.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then_with(|| a.id.cmp(&b.id))
                });
                let total = matches.len();
                let page = matches
                    .into_iter()
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect();
                (page, total)
            })
            .await
    }

    // =========================================================================
    // MILESTONES
    // =========================================================================

    /// Add a milestone to a campaign on behalf of its creator
    pub async fn create_milestone(
        &self,
        campaign_id: &str,
        request: CreateMilestoneRequest,
    ) -> Result<Milestone> {
        let now = self.now();
        let milestone = self
            .store
            .transaction(|tx| {
                let campaign = find_campaign(tx, campaign_id)?;
                ensure_creator(&campaign, &request.creator_address)?;
                if campaign.status != CampaignStatus::Active {
                    return Err(FundFlowError::CampaignNotActive(campaign.id));
                }

                let (allocated, order) = {
                    let existing = tx.campaign_milestones(&campaign.id);
                    let allocated: u64 = existing.iter().map(|m| m.target_amount).sum();
                    let order = existing.iter().map(|m| m.order).max().unwrap_or(0) + 1;
                    (allocated, order)
                };

                let milestone = Milestone::new(
                    campaign.id.clone(),
                    order,
                    request.title.clone(),
                    request.description.clone(),
                    request.target_amount,
                    request
                        .required_approval_percentage
                        .unwrap_or(self.config.required_approval_percentage),
                    request
                        .minimum_voting_power
                        .unwrap_or(self.config.minimum_voting_power),
                    now,
                )?;

                let within_target = allocated
                    .checked_add(milestone.target_amount)
                    .map_or(false, |total| total <= campaign.target_amount);
                if !within_target {
                    return Err(FundFlowError::Validation(format!(
                        "milestone targets would exceed campaign target {} ({} already allocated)",
                        campaign.target_amount, allocated
                    )));
                }

                tx.put_milestone(milestone.clone());
                refresh_milestone_cache(tx, &campaign.id, now)?;
                Ok(milestone)
            })
            .await?;

        info!(
            "Milestone {} #{} added to campaign {}",
            milestone.id, milestone.order, milestone.campaign_id
        );
        Ok(milestone)
    }

    pub async fn get_milestone(&self, milestone_id: &str) -> Result<Milestone> {
        self.store
            .read(|ledger| ledger.milestone(milestone_id).cloned())
            .await
            .ok_or_else(|| FundFlowError::MilestoneNotFound(milestone_id.to_string()))
    }

    pub async fn campaign_milestones(&self, campaign_id: &str) -> Result<Vec<Milestone>> {
        self.store
            .read(|ledger| {
                if ledger.campaign(campaign_id).is_none() {
                    return Err(FundFlowError::CampaignNotFound(campaign_id.to_string()));
                }
                Ok(ledger
                    .campaign_milestones(campaign_id)
                    .into_iter()
                    .cloned()
                    .collect())
            })
            .await
    }

    pub async fn start_milestone(&self, milestone_id: &str, creator_address: &str) -> Result<Milestone> {
        self.modify_milestone(milestone_id, creator_address, |milestone, _, now| {
            milestone.start(now)
        })
        .await
    }

    pub async fn attach_evidence(
        &self,
        milestone_id: &str,
        request: EvidenceRequest,
    ) -> Result<Milestone> {
        let EvidenceRequest {
            creator_address,
            evidence,
            notes,
        } = request;
        self.modify_milestone(milestone_id, &creator_address, move |milestone, _, now| {
            milestone.attach_evidence(evidence, notes, now)
        })
        .await
    }

    /// Open investor voting on a milestone
    pub async fn submit_milestone(
        &self,
        milestone_id: &str,
        request: SubmitMilestoneRequest,
    ) -> Result<Milestone> {
        let SubmitMilestoneRequest {
            creator_address,
            evidence,
            notes,
            voting_deadline,
        } = request;
        let voting_period = self.config.voting_period_secs;

        self.modify_milestone(milestone_id, &creator_address, move |milestone, campaign, now| {
            if matches!(
                campaign.status,
                CampaignStatus::Cancelled | CampaignStatus::Failed
            ) {
                return Err(FundFlowError::CampaignNotActive(campaign.id.clone()));
            }
            let deadline = voting_deadline.unwrap_or(now + voting_period);
            milestone.submit_for_voting(evidence, notes, deadline, now)
        })
        .await
    }

    async fn modify_milestone(
        &self,
        milestone_id: &str,
        creator_address: &str,
        f: impl FnOnce(&mut Milestone, &Campaign, u64) -> Result<()>,
    ) -> Result<Milestone> {
        let now = self.now();
        let milestone = self
            .store
            .transaction(|tx| {
                let mut milestone = find_milestone(tx, milestone_id)?;
                let campaign = find_campaign(tx, &milestone.campaign_id)?;
                ensure_creator(&campaign, creator_address)?;

                f(&mut milestone, &campaign, now)?;

                tx.put_milestone(milestone.clone());
                refresh_milestone_cache(tx, &campaign.id, now)?;
                Ok(milestone)
            })
            .await?;

        debug!("Milestone {} is now {}", milestone.id, milestone.status);
        self.emit(milestone_status_event(&milestone));
        Ok(milestone)
    }

    /// Record an investor's vote, weighted by their confirmed stake
    ///
    /// The vote is written to the milestone and to every confirmed investment
    /// the investor holds in the campaign. Later settlements and status
    /// overrides re-weight the vote while the round is unresolved.
    pub async fn cast_vote(&self, milestone_id: &str, request: CastVoteRequest) -> Result<Milestone> {
        let now = self.now();
        let investor = validate_address(&request.investor_address)?;

        let (milestone, voting_power) = self
            .store
            .transaction(|tx| {
                let mut milestone = find_milestone(tx, milestone_id)?;
                let campaign = find_campaign(tx, &milestone.campaign_id)?;
                if matches!(
                    campaign.status,
                    CampaignStatus::Cancelled | CampaignStatus::Failed
                ) {
                    return Err(FundFlowError::CampaignNotActive(campaign.id));
                }

                let backing: Vec<Investment> = tx
                    .campaign_investments(&milestone.campaign_id)
                    .into_iter()
                    .filter(|i| i.investor_address == investor && i.is_counted())
                    .cloned()
                    .collect();
                let voting_power = stake_of(backing.iter())?;

                milestone.add_vote(&investor, voting_power, request.choice, request.tx_id.clone(), now)?;

                for mut investment in backing {
                    investment.record_vote(&milestone.id, request.choice, now);
                    tx.put_investment(investment);
                }
                tx.put_milestone(milestone.clone());
                Ok((milestone, voting_power))
            })
            .await?;

        info!(
            "Investor {} voted {} on milestone {} with power {}",
            investor, request.choice, milestone.id, voting_power
        );
        self.emit(LedgerEvent::VoteCast {
            milestone_id: milestone.id.clone(),
            investor_address: investor,
            choice: request.choice,
            voting_power,
        });
        Ok(milestone)
    }

    /// Resolve a milestone vote if its deadline has passed and quorum is met
    pub async fn finalize_milestone(&self, milestone_id: &str) -> Result<Milestone> {
        let now = self.now();
        let (milestone, changed) = self
            .store
            .transaction(|tx| {
                let mut milestone = find_milestone(tx, milestone_id)?;
                let changed = milestone.check_approval_status(now).is_some();
                if changed {
                    tx.put_milestone(milestone.clone());
                    if tx.campaign(&milestone.campaign_id).is_some() {
                        refresh_milestone_cache(tx, &milestone.campaign_id, now)?;
                    }
                }
                Ok((milestone, changed))
            })
            .await?;

        if changed {
            self.emit(milestone_status_event(&milestone));
        }
        Ok(milestone)
    }

    /// Pay out an approved milestone's target amount to the campaign creator
    pub async fn release_milestone_funds(&self, milestone_id: &str) -> Result<Milestone> {
        let (milestone, campaign) = self
            .store
            .read(|ledger| {
                let milestone = ledger
                    .milestone(milestone_id)
                    .cloned()
                    .ok_or_else(|| FundFlowError::MilestoneNotFound(milestone_id.to_string()))?;
                let campaign = ledger
                    .campaign(&milestone.campaign_id)
                    .cloned()
                    .ok_or_else(|| FundFlowError::CampaignNotFound(milestone.campaign_id.clone()))?;
                Ok::<_, FundFlowError>((milestone, campaign))
            })
            .await?;
        ensure_releasable(&milestone, &campaign)?;

        let tx_hash = self
            .gateway
            .release_funds(&milestone.id, &campaign.creator_address, milestone.target_amount)
            .await?;

        let now = self.now();
        let released = self
            .store
            .transaction(|tx| {
                let mut milestone = find_milestone(tx, milestone_id)?;
                let campaign = find_campaign(tx, &milestone.campaign_id)?;
                ensure_releasable(&milestone, &campaign)?;

                milestone.release_funds(milestone.target_amount, tx_hash.clone(), now);
                tx.put_milestone(milestone.clone());
                refresh_milestone_cache(tx, &campaign.id, now)?;
                Ok(milestone)
            })
            .await?;

        info!(
            "Released {} for milestone {} of campaign {} ({})",
            released.target_amount, released.id, released.campaign_id, tx_hash
        );
        self.emit(LedgerEvent::FundsReleased {
            milestone_id: released.id.clone(),
            campaign_id: released.campaign_id.clone(),
            amount: released.target_amount,
            tx_hash,
        });
        Ok(released)
    }

    // =========================================================================
    // INVESTMENTS
    // =========================================================================

    /// Record a pending investment; settlement happens separately
    pub async fn record_investment(
        &self,
        campaign_id: &str,
        request: RecordInvestmentRequest,
    ) -> Result<Investment> {
        if request.amount < self.config.min_investment {
            return Err(FundFlowError::Validation(format!(
                "investment amount {} is below the minimum of {}",
                request.amount, self.config.min_investment
            )));
        }

        let now = self.now();
        let fee_bps = self.config.fee_bps;
        let investment = self
            .store
            .transaction(|tx| {
                let campaign = tx
                    .campaign(campaign_id)
                    .ok_or_else(|| FundFlowError::CampaignNotFound(campaign_id.to_string()))?;
                if !campaign.accepts_investments(now) {
                    return Err(FundFlowError::CampaignNotActive(campaign.id.clone()));
                }

                let investment = Investment::new(
                    campaign.id.clone(),
                    &request.investor_address,
                    request.amount,
                    fee_bps,
                    now,
                )?;

                // Pending and confirmed stakes must fit the campaign total once settled
                let outstanding = tx
                    .campaign_investments(&investment.campaign_id)
                    .into_iter()
                    .filter(|i| i.status == InvestmentStatus::Pending || i.is_counted())
                    .try_fold(investment.net_amount, |acc, i| acc.checked_add(i.net_amount));
                if outstanding.is_none() {
                    return Err(FundFlowError::Validation(format!(
                        "investment of {} would overflow the raised amount of campaign {}",
                        request.amount, investment.campaign_id
                    )));
                }

                tx.put_investment(investment.clone());
                Ok(investment)
            })
            .await?;

        info!(
            "Investment {} of {} recorded for campaign {} (fee {})",
            investment.id, investment.amount, investment.campaign_id, investment.platform_fee
        );
        self.emit(LedgerEvent::InvestmentRecorded {
            investment_id: investment.id.clone(),
            campaign_id: investment.campaign_id.clone(),
            amount: investment.amount,
        });
        Ok(investment)
    }

    /// Settle a pending investment through the payment gateway
    ///
    /// A gateway failure, or a campaign that closed while the payment was in
    /// flight, leaves the investment `failed` rather than returning an error.
    pub async fn settle_investment(&self, investment_id: &str) -> Result<Investment> {
        let pending = self.get_investment(investment_id).await?;
        if pending.status != InvestmentStatus::Pending {
            return Err(FundFlowError::transition(pending.status, "settle investment"));
        }

        let outcome = self
            .gateway
            .settle_investment(&pending.id, pending.amount)
            .await;

        let now = self.now();
        let investment = self
            .store
            .transaction(|tx| {
                let mut investment = find_investment(tx, investment_id)?;
                if investment.status != InvestmentStatus::Pending {
                    return Err(FundFlowError::transition(investment.status, "settle investment"));
                }

                match &outcome {
                    Ok(hash) => {
                        let mut campaign = find_campaign(tx, &investment.campaign_id)?;
                        if campaign.status == CampaignStatus::Active {
                            investment.confirm(hash.clone(), now)?;
                            campaign.add_investment(&investment, now)?;
                            tx.put_campaign(campaign);
                            tx.put_investment(investment.clone());
                            refresh_investor_votes(
                                tx,
                                &investment.campaign_id,
                                &investment.investor_address,
                                now,
                            )?;
                        } else {
                            warn!(
                                "Investment {} settled after campaign {} became {}",
                                investment.id, campaign.id, campaign.status
                            );
                            investment.mark_failed(now)?;
                        }
                    }
                    Err(e) => {
                        warn!("Settlement of investment {} failed: {}", investment.id, e);
                        investment.mark_failed(now)?;
                    }
                }

                tx.put_investment(investment.clone());
                Ok(investment)
            })
            .await?;

        info!("Investment {} is {}", investment.id, investment.status);
        self.emit(LedgerEvent::InvestmentStatusChanged {
            investment_id: investment.id.clone(),
            campaign_id: investment.campaign_id.clone(),
            status: investment.status,
        });
        Ok(investment)
    }

    /// Settle every investment still pending, e.g. after a restart
    ///
    /// Returns how many were settled; individual failures are logged.
    pub async fn settle_pending(&self) -> usize {
        let pending: Vec<String> = self
            .store
            .read(|ledger| {
                ledger
                    .investments
                    .values()
                    .filter(|i| i.status == InvestmentStatus::Pending)
                    .map(|i| i.id.clone())
                    .collect()
            })
            .await;
        if pending.is_empty() {
            return 0;
        }

        info!("Resuming settlement of {} pending investments", pending.len());
        let results = join_all(pending.iter().map(|id| self.settle_investment(id))).await;

        let mut settled = 0;
        for (id, result) in pending.iter().zip(results) {
            match result {
                Ok(_) => settled += 1,
                Err(e) => warn!("Could not settle pending investment {}: {}", id, e),
            }
        }
        settled
    }

    /// Administrative status override
    pub async fn update_investment_status(
        &self,
        investment_id: &str,
        status: InvestmentStatus,
    ) -> Result<Investment> {
        let now = self.now();
        let (investment, changed) = self
            .store
            .transaction(|tx| {
                let mut investment = find_investment(tx, investment_id)?;
                if !investment.override_status(status, now) {
                    return Ok((investment, false));
                }
                tx.put_investment(investment.clone());
                refresh_investment_cache(tx, &investment.campaign_id, now)?;
                refresh_investor_votes(
                    tx,
                    &investment.campaign_id,
                    &investment.investor_address,
                    now,
                )?;
                Ok((investment, true))
            })
            .await?;

        if changed {
            info!("Investment {} set to {}", investment.id, investment.status);
            self.emit(LedgerEvent::InvestmentStatusChanged {
                investment_id: investment.id.clone(),
                campaign_id: investment.campaign_id.clone(),
                status: investment.status,
            });
        }
        Ok(investment)
    }

    pub async fn get_investment(&self, investment_id: &str) -> Result<Investment> {
        self.store
            .read(|ledger| ledger.investment(investment_id).cloned())
            .await
            .ok_or_else(|| FundFlowError::InvestmentNotFound(investment_id.to_string()))
    }

    pub async fn campaign_investments(&self, campaign_id: &str) -> Result<Vec<Investment>> {
        self.store
            .read(|ledger| {
                if ledger.campaign(campaign_id).is_none() {
                    return Err(FundFlowError::CampaignNotFound(campaign_id.to_string()));
                }
                Ok(ledger
                    .campaign_investments(campaign_id)
                    .into_iter()
                    .cloned()
                    .collect())
            })
            .await
    }

    // =========================================================================
    // STATUS SWEEP
    // =========================================================================

    /// Resolve expired campaigns and milestone votes in one transaction
    pub async fn update_statuses(&self) -> Result<SweepReport> {
        let now = self.now();
        let (report, events) = self
            .store
            .transaction(|tx| {
                let mut report = SweepReport::default();
                let mut events = Vec::new();
                let mut touched = BTreeSet::new();

                for id in tx.milestone_ids() {
                    let Some(mut milestone) = tx
                        .milestone(&id)
                        .filter(|m| m.status == MilestoneStatus::Voting)
                        .cloned()
                    else {
                        continue;
                    };
                    match milestone.check_approval_status(now) {
                        Some(MilestoneStatus::Approved) => report.milestones_approved += 1,
                        Some(MilestoneStatus::Rejected) => report.milestones_rejected += 1,
                        _ => continue,
                    }
                    events.push(milestone_status_event(&milestone));
                    touched.insert(milestone.campaign_id.clone());
                    tx.put_milestone(milestone);
                }

                for campaign_id in &touched {
                    if tx.campaign(campaign_id).is_some() {
                        refresh_milestone_cache(tx, campaign_id, now)?;
                    }
                }

                for id in tx.campaign_ids() {
                    let Some(mut campaign) = tx
                        .campaign(&id)
                        .filter(|c| c.status == CampaignStatus::Active && now > c.deadline)
                        .cloned()
                    else {
                        continue;
                    };
                    match campaign.update_status(now) {
                        Some(CampaignStatus::Completed) => report.campaigns_completed += 1,
                        Some(CampaignStatus::Failed) => report.campaigns_failed += 1,
                        _ => continue,
                    }
                    events.push(LedgerEvent::CampaignStatusChanged {
                        campaign_id: campaign.id.clone(),
                        status: campaign.status,
                    });
                    tx.put_campaign(campaign);
                }

                Ok((report, events))
            })
            .await?;

        for event in events {
            self.emit(event);
        }
        Ok(report)
    }

    // =========================================================================
    // ANALYTICS
    // =========================================================================

    /// Paginated holdings for a wallet; `page` starts at 1
    pub async fn portfolio(&self, wallet_address: &str, page: usize, limit: usize) -> Result<Portfolio> {
        let wallet = validate_address(wallet_address)?;
        Ok(self
            .store
            .read(|ledger| analytics::portfolio(ledger, &wallet, page, limit))
            .await)
    }

    pub async fn platform_stats(&self) -> PlatformStats {
        self.store.read(analytics::platform_stats).await
    }

    pub async fn campaign_analytics(&self, campaign_id: &str) -> Result<CampaignAnalytics> {
        let now = self.now();
        self.store
            .read(|ledger| analytics::campaign_analytics(ledger, campaign_id, now))
            .await
    }

    pub async fn campaign_report(&self, campaign_id: &str) -> Result<CampaignReport> {
        let now = self.now();
        self.store
            .read(|ledger| analytics::campaign_report(ledger, campaign_id, now))
            .await
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn find_campaign(tx: &Transaction<'_>, campaign_id: &str) -> Result<Campaign> {
    tx.campaign(campaign_id)
        .cloned()
        .ok_or_else(|| FundFlowError::CampaignNotFound(campaign_id.to_string()))
}

fn find_milestone(tx: &Transaction<'_>, milestone_id: &str) -> Result<Milestone> {
    tx.milestone(milestone_id)
        .cloned()
        .ok_or_else(|| FundFlowError::MilestoneNotFound(milestone_id.to_string()))
}

fn find_investment(tx: &Transaction<'_>, investment_id: &str) -> Result<Investment> {
    tx.investment(investment_id)
        .cloned()
        .ok_or_else(|| FundFlowError::InvestmentNotFound(investment_id.to_string()))
}

fn ensure_creator(campaign: &Campaign, address: &str) -> Result<()> {
    let address = validate_address(address)?;
    if address != campaign.creator_address {
        return Err(FundFlowError::Forbidden(format!(
            "{} is not the creator of campaign {}",
            address, campaign.id
        )));
    }
    Ok(())
}

fn ensure_releasable(milestone: &Milestone, campaign: &Campaign) -> Result<()> {
    if milestone.funds_released || milestone.status != MilestoneStatus::Approved {
        return Err(FundFlowError::transition(milestone.status, "release funds"));
    }
    if matches!(
        campaign.status,
        CampaignStatus::Cancelled | CampaignStatus::Failed
    ) {
        return Err(FundFlowError::CampaignNotActive(campaign.id.clone()));
    }
    let available = campaign.available_for_release();
    if available < milestone.target_amount {
        return Err(FundFlowError::InsufficientFunds {
            need: milestone.target_amount,
            available,
        });
    }
    Ok(())
}

/// Rebuild a campaign's embedded milestone summaries from the documents
fn refresh_milestone_cache(tx: &mut Transaction<'_>, campaign_id: &str, now: u64) -> Result<()> {
    let mut campaign = find_campaign(tx, campaign_id)?;
    let milestones: Vec<Milestone> = tx
        .campaign_milestones(campaign_id)
        .into_iter()
        .cloned()
        .collect();
    campaign.rebuild_milestones(&milestones, now);
    tx.put_campaign(campaign);
    Ok(())
}

/// Rebuild a campaign's embedded investment summaries from the documents
fn refresh_investment_cache(tx: &mut Transaction<'_>, campaign_id: &str, now: u64) -> Result<()> {
    let mut campaign = find_campaign(tx, campaign_id)?;
    let investments: Vec<Investment> = tx
        .campaign_investments(campaign_id)
        .into_iter()
        .cloned()
        .collect();
    campaign.rebuild_investments(&investments, now);
    tx.put_campaign(campaign);
    Ok(())
}

/// Total voting power of a set of investments
fn stake_of<'a>(investments: impl IntoIterator<Item = &'a Investment>) -> Result<u64> {
    investments
        .into_iter()
        .try_fold(0u64, |acc, i| acc.checked_add(i.voting_power))
        .ok_or_else(|| FundFlowError::Validation("voting power overflows".to_string()))
}

/// Re-weight an investor's unresolved votes in a campaign to their current
/// confirmed stake
fn refresh_investor_votes(
    tx: &mut Transaction<'_>,
    campaign_id: &str,
    investor_address: &str,
    now: u64,
) -> Result<()> {
    let voting_power = stake_of(
        tx.campaign_investments(campaign_id)
            .into_iter()
            .filter(|i| i.investor_address == investor_address && i.is_counted()),
    )?;
    let voted: Vec<Milestone> = tx
        .campaign_milestones(campaign_id)
        .into_iter()
        .filter(|m| m.vote_of(investor_address).is_some())
        .cloned()
        .collect();

    for mut milestone in voted {
        if milestone.reweigh_vote(investor_address, voting_power, now)? {
            debug!(
                "Milestone {} tally now {}/{} after stake change of {}",
                milestone.id, milestone.voting_power_for, milestone.total_voting_power, investor_address
            );
            tx.put_milestone(milestone);
        }
    }
    Ok(())
}

fn milestone_status_event(milestone: &Milestone) -> LedgerEvent {
    LedgerEvent::MilestoneStatusChanged {
        milestone_id: milestone.id.clone(),
        campaign_id: milestone.campaign_id.clone(),
        status: milestone.status,
    }
}
