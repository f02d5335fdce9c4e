//! HTTP client for the FundFlow node REST API

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::CliError;

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneSummary {
    pub milestone_id: String,
    pub order: u32,
    pub title: String,
    pub target_amount: u64,
    pub status: String,
    pub funds_released: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub creator_address: String,
    pub target_amount: u64,
    pub raised_amount: u64,
    pub released_amount: u64,
    pub deadline: u64,
    pub status: String,
    #[serde(default)]
    pub milestones: Vec<MilestoneSummary>,
    pub investor_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct CampaignPage {
    pub total: usize,
    pub offset: usize,
    pub campaigns: Vec<Campaign>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub campaign_id: String,
    pub order: u32,
    pub title: String,
    pub target_amount: u64,
    pub status: String,
    pub votes_for: u32,
    pub votes_against: u32,
    pub voting_power_for: u64,
    pub voting_power_against: u64,
    pub voting_deadline: Option<u64>,
    pub required_approval_percentage: u8,
    pub funds_released: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Investment {
    pub id: String,
    pub amount: u64,
    pub platform_fee: u64,
    pub net_amount: u64,
    pub status: String,
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Holding {
    pub investment_id: String,
    pub campaign_title: String,
    pub amount: u64,
    pub voting_power: u64,
    pub status: String,
    pub votes_cast: usize,
}

#[derive(Debug, Deserialize)]
pub struct Portfolio {
    pub investor_address: String,
    pub total_invested: u64,
    pub total_fees: u64,
    pub total_voting_power: u64,
    pub campaigns_backed: usize,
    pub holdings: Vec<Holding>,
    pub page: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct PlatformStats {
    pub total_campaigns: usize,
    pub active_campaigns: usize,
    pub completed_campaigns: usize,
    pub failed_campaigns: usize,
    pub cancelled_campaigns: usize,
    pub total_raised: u64,
    pub total_released: u64,
    pub total_fees: u64,
    pub total_investments: usize,
    pub unique_investors: usize,
    pub milestones_in_voting: usize,
    pub success_rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct SweepReport {
    pub campaigns_completed: usize,
    pub campaigns_failed: usize,
    pub milestones_approved: usize,
    pub milestones_rejected: usize,
}

#[derive(Debug, Serialize)]
pub struct CreateCampaignRequest {
    pub title: String,
    pub description: String,
    pub creator_address: String,
    pub target_amount: u64,
    pub deadline: u64,
}

#[derive(Debug, Serialize)]
pub struct CreateMilestoneRequest {
    pub creator_address: String,
    pub title: String,
    pub description: String,
    pub target_amount: u64,
}

#[derive(Debug, Serialize)]
pub struct SubmitMilestoneRequest {
    pub creator_address: String,
    pub evidence: Vec<EvidenceItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvidenceItem {
    pub title: String,
    pub url: String,
}

// =============================================================================
// API CLIENT
// =============================================================================

pub struct FundFlowClient {
    client: Client,
    base_url: String,
}

impl FundFlowClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| CliError::Unreachable {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        let resp: ApiResponse<T> = response
            .json()
            .await
            .context("Failed to parse node response")?;

        if !resp.success {
            return Err(CliError::Api(resp.message).into());
        }

        resp.data.context("Node response carried no data")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.client.get(self.url(path))).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    pub async fn list_campaigns(
        &self,
        status: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<CampaignPage> {
        let mut path = format!("campaigns?offset={}&limit={}", offset, limit);
        if let Some(status) = status {
            path.push_str(&format!("&status={}", status));
        }
        self.get(&path).await
    }

    pub async fn get_campaign(&self, id: &str) -> Result<Campaign> {
        self.get(&format!("campaigns/{}", id)).await
    }

    pub async fn create_campaign(&self, req: &CreateCampaignRequest) -> Result<Campaign> {
        self.post("campaigns", req).await
    }

    pub async fn cancel_campaign(&self, id: &str, creator: &str) -> Result<Campaign> {
        self.post(
            &format!("campaigns/{}/cancel", id),
            &serde_json::json!({ "creator_address": creator }),
        )
        .await
    }

    pub async fn create_milestone(
        &self,
        campaign_id: &str,
        req: &CreateMilestoneRequest,
    ) -> Result<Milestone> {
        self.post(&format!("campaigns/{}/milestones", campaign_id), req).await
    }

    pub async fn get_milestone(&self, id: &str) -> Result<Milestone> {
        self.get(&format!("milestones/{}", id)).await
    }

    pub async fn submit_milestone(&self, id: &str, req: &SubmitMilestoneRequest) -> Result<Milestone> {
        self.post(&format!("milestones/{}/submit", id), req).await
    }

    pub async fn cast_vote(&self, id: &str, investor: &str, vote: &str) -> Result<Milestone> {
        self.post(
            &format!("milestones/{}/votes", id),
            &serde_json::json!({ "investor_address": investor, "vote": vote }),
        )
        .await
    }

    pub async fn finalize_milestone(&self, id: &str) -> Result<Milestone> {
        self.post(&format!("milestones/{}/finalize", id), &serde_json::json!({})).await
    }

    pub async fn release_milestone(&self, id: &str) -> Result<Milestone> {
        self.post(&format!("milestones/{}/release", id), &serde_json::json!({})).await
    }

    pub async fn invest(&self, campaign_id: &str, investor: &str, amount: u64) -> Result<Investment> {
        self.post(
            &format!("campaigns/{}/investments", campaign_id),
            &serde_json::json!({ "investor_address": investor, "amount": amount }),
        )
        .await
    }

    pub async fn get_investment(&self, id: &str) -> Result<Investment> {
        self.get(&format!("investments/{}", id)).await
    }

    pub async fn portfolio(&self, wallet: &str, page: usize, limit: usize) -> Result<Portfolio> {
        self.get(&format!(
            "investments/portfolio/{}?page={}&limit={}",
            wallet, page, limit
        ))
        .await
    }

    pub async fn platform_stats(&self) -> Result<PlatformStats> {
        self.get("analytics/platform").await
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.post("admin/sweep", &serde_json::json!({})).await
    }
}
