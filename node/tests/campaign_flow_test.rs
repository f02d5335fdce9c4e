use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::{json, Value};

use fundflow_node::service::{CreateCampaignRequest, RecordInvestmentRequest};
use fundflow_node::{
    CampaignService, FundFlowApi, InvestmentStatus, LedgerPersistence, LedgerStore,
    ServiceConfig, SimulatedGateway,
};

/// End-to-end tests driving the FundFlow API in process

const START: u64 = 1_700_000_000;
const DAY: u64 = 24 * 3600;

struct TestNode {
    api: FundFlowApi,
    clock: Arc<AtomicU64>,
}

impl TestNode {
    fn new() -> Self {
        Self::with_store(LedgerStore::new())
    }

    fn with_store(store: LedgerStore) -> Self {
        let clock = Arc::new(AtomicU64::new(START));
        let clock_ref = clock.clone();
        let service = CampaignService::new(
            Arc::new(store),
            Arc::new(SimulatedGateway::instant()),
            ServiceConfig::default(),
        )
        .with_clock(Arc::new(move || clock_ref.load(Ordering::SeqCst)));

        Self {
            api: FundFlowApi::new(Arc::new(service)),
            clock,
        }
    }

    fn advance(&self, secs: u64) {
        self.clock.fetch_add(secs, Ordering::SeqCst);
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = match body {
            Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
            None => Body::empty(),
        };
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(body)
            .unwrap();

        let response = self.api.handle_request(req).await.unwrap();
        read_json(response).await
    }

    async fn create_campaign(&self, target: u64) -> String {
        let (status, json) = self
            .send(
                Method::POST,
                "/api/campaigns",
                Some(json!({
                    "title": "Community solar",
                    "description": "Panels for the town hall",
                    "creator_address": "0xcreator",
                    "target_amount": target,
                    "deadline": START + 30 * DAY,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        json["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_milestone(&self, campaign_id: &str, target: u64) -> String {
        let (status, json) = self
            .send(
                Method::POST,
                &format!("/api/campaigns/{}/milestones", campaign_id),
                Some(json!({
                    "creator_address": "0xcreator",
                    "title": "Install panels",
                    "target_amount": target,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        json["data"]["id"].as_str().unwrap().to_string()
    }

    /// Record an investment and wait for background settlement
    async fn invest(&self, campaign_id: &str, investor: &str, amount: u64) -> Value {
        let (status, json) = self
            .send(
                Method::POST,
                &format!("/api/campaigns/{}/investments", campaign_id),
                Some(json!({"investor_address": investor, "amount": amount})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["status"], "pending");
        let id = json["data"]["id"].as_str().unwrap().to_string();

        for _ in 0..100 {
            let (_, json) = self
                .send(Method::GET, &format!("/api/investments/{}", id), None)
                .await;
            if json["data"]["status"] != "pending" {
                return json["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("investment {} never settled", id);
    }

    async fn vote(&self, milestone_id: &str, investor: &str, vote: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            &format!("/api/milestones/{}/votes", milestone_id),
            Some(json!({"investor_address": investor, "vote": vote})),
        )
        .await
    }
}

async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_full_milestone_lifecycle() {
    let node = TestNode::new();
    let campaign_id = node.create_campaign(10_000).await;
    let milestone_id = node.create_milestone(&campaign_id, 5_000).await;

    let settled = node.invest(&campaign_id, "0xwhale", 6_000).await;
    assert_eq!(settled["status"], "confirmed");
    assert_eq!(settled["net_amount"], 5_850);
    node.invest(&campaign_id, "0xsmall1", 2_000).await;
    node.invest(&campaign_id, "0xsmall2", 2_000).await;

    let (status, campaign) = node
        .send(Method::GET, &format!("/api/campaigns/{}", campaign_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(campaign["data"]["raised_amount"], 5_850 + 1_950 + 1_950);
    assert_eq!(campaign["data"]["investor_count"], 3);

    let (status, _) = node
        .send(
            Method::POST,
            &format!("/api/milestones/{}/submit", milestone_id),
            Some(json!({
                "creator_address": "0xcreator",
                "evidence": [{"title": "Photos", "url": "https://example.com/p"}],
                "notes": "Panels installed",
                "voting_deadline": START + DAY,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // One vote for, two against: weighted power still approves
    assert_eq!(node.vote(&milestone_id, "0xwhale", "for").await.0, StatusCode::OK);
    assert_eq!(node.vote(&milestone_id, "0xsmall1", "against").await.0, StatusCode::OK);
    let (_, milestone) = node.vote(&milestone_id, "0xsmall2", "against").await;
    assert_eq!(milestone["data"]["votes_for"], 1);
    assert_eq!(milestone["data"]["votes_against"], 2);

    // Too early to resolve
    let (_, milestone) = node
        .send(Method::POST, &format!("/api/milestones/{}/finalize", milestone_id), None)
        .await;
    assert_eq!(milestone["data"]["status"], "voting");

    let (status, _) = node
        .send(Method::POST, &format!("/api/milestones/{}/release", milestone_id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    node.advance(DAY + 1);
    let (_, milestone) = node
        .send(Method::POST, &format!("/api/milestones/{}/finalize", milestone_id), None)
        .await;
    assert_eq!(milestone["data"]["status"], "approved");

    let (status, milestone) = node
        .send(Method::POST, &format!("/api/milestones/{}/release", milestone_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(milestone["data"]["status"], "completed");
    assert_eq!(milestone["data"]["funds_released"], true);

    let (_, report) = node
        .send(Method::GET, &format!("/api/campaigns/{}/report", campaign_id), None)
        .await;
    assert_eq!(report["data"]["milestones"][0]["status"], "completed");
    assert_eq!(report["data"]["analytics"]["released_amount"], 5_000);
}

#[tokio::test]
async fn test_vote_change_is_not_double_counted() {
    let node = TestNode::new();
    let campaign_id = node.create_campaign(10_000).await;
    let milestone_id = node.create_milestone(&campaign_id, 1_000).await;
    node.invest(&campaign_id, "0xalice", 1_000).await;

    node.send(
        Method::POST,
        &format!("/api/milestones/{}/submit", milestone_id),
        Some(json!({"creator_address": "0xcreator"})),
    )
    .await;

    node.vote(&milestone_id, "0xalice", "for").await;
    node.vote(&milestone_id, "0xalice", "against").await;
    let (_, milestone) = node.vote(&milestone_id, "0xalice", "against").await;

    assert_eq!(milestone["data"]["voting_power_for"], 0);
    assert_eq!(milestone["data"]["voting_power_against"], 975);
    assert_eq!(milestone["data"]["total_voting_power"], 975);
}

#[tokio::test]
async fn test_sweep_resolves_expired_campaigns() {
    let node = TestNode::new();
    let funded = node.create_campaign(1_000).await;
    let short = node.create_campaign(1_000).await;
    node.invest(&funded, "0xalice", 1_200).await;
    node.invest(&short, "0xalice", 800).await;

    node.advance(30 * DAY + 1);
    let (status, report) = node.send(Method::POST, "/api/admin/sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["data"]["campaigns_completed"], 1);
    assert_eq!(report["data"]["campaigns_failed"], 1);

    let (_, stats) = node.send(Method::GET, "/api/analytics/platform", None).await;
    assert_eq!(stats["data"]["completed_campaigns"], 1);
    assert_eq!(stats["data"]["failed_campaigns"], 1);
    assert_eq!(stats["data"]["success_rate"], 50.0);

    // Closed campaigns refuse new money
    let (status, _) = node
        .send(
            Method::POST,
            &format!("/api/campaigns/{}/investments", funded),
            Some(json!({"investor_address": "0xbob", "amount": 100})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_portfolio_and_status_override() {
    let node = TestNode::new();
    let campaign_id = node.create_campaign(10_000).await;
    let first = node.invest(&campaign_id, "0xalice", 1_000).await;
    node.invest(&campaign_id, "0xalice", 3_000).await;

    let (status, portfolio) = node
        .send(Method::GET, "/api/investments/portfolio/0xalice?page=1&limit=1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(portfolio["data"]["total"], 2);
    assert_eq!(portfolio["data"]["holdings"].as_array().unwrap().len(), 1);
    assert_eq!(portfolio["data"]["total_invested"], 4_000);

    let (status, refunded) = node
        .send(
            Method::PUT,
            &format!("/api/investments/{}/status", first["id"].as_str().unwrap()),
            Some(json!({"status": "refunded"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["data"]["status"], "refunded");

    let (_, campaign) = node
        .send(Method::GET, &format!("/api/campaigns/{}", campaign_id), None)
        .await;
    assert_eq!(campaign["data"]["raised_amount"], 2_925);
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("ledger.db");
    let db_path = db_path.to_str().unwrap();

    let campaign_id = {
        let persistence = Arc::new(LedgerPersistence::new(db_path).unwrap());
        let store = LedgerStore::with_persistence(persistence).await.unwrap();
        let node = TestNode::with_store(store);
        let campaign_id = node.create_campaign(10_000).await;
        node.create_milestone(&campaign_id, 2_000).await;
        node.invest(&campaign_id, "0xalice", 1_000).await;
        campaign_id
    };

    let persistence = Arc::new(LedgerPersistence::new(db_path).unwrap());
    let store = LedgerStore::with_persistence(persistence).await.unwrap();
    let node = TestNode::with_store(store);

    let (status, campaign) = node
        .send(Method::GET, &format!("/api/campaigns/{}", campaign_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(campaign["data"]["raised_amount"], 975);
    assert_eq!(campaign["data"]["milestones"].as_array().unwrap().len(), 1);

    let (_, milestones) = node
        .send(Method::GET, &format!("/api/campaigns/{}/milestones", campaign_id), None)
        .await;
    assert_eq!(milestones["data"]["count"], 1);
}

fn fixed_clock_service(store: LedgerStore) -> CampaignService {
    CampaignService::new(
        Arc::new(store),
        Arc::new(SimulatedGateway::instant()),
        ServiceConfig::default(),
    )
    .with_clock(Arc::new(|| START + DAY))
}

#[tokio::test]
async fn test_pending_investment_settles_after_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("ledger.db");
    let db_path = db_path.to_str().unwrap();

    // Recorded but never handed to the gateway before shutdown
    let (campaign_id, investment_id) = {
        let persistence = Arc::new(LedgerPersistence::new(db_path).unwrap());
        let store = LedgerStore::with_persistence(persistence).await.unwrap();
        let service = fixed_clock_service(store);
        let campaign = service
            .create_campaign(CreateCampaignRequest {
                title: "Community solar".to_string(),
                description: String::new(),
                creator_address: "0xcreator".to_string(),
                target_amount: 10_000,
                deadline: START + 30 * DAY,
            })
            .await
            .unwrap();
        let pending = service
            .record_investment(
                &campaign.id,
                RecordInvestmentRequest {
                    investor_address: "0xalice".to_string(),
                    amount: 1_000,
                },
            )
            .await
            .unwrap();
        (campaign.id, pending.id)
    };

    let persistence = Arc::new(LedgerPersistence::new(db_path).unwrap());
    let store = LedgerStore::with_persistence(persistence).await.unwrap();
    let service = fixed_clock_service(store);
    assert_eq!(
        service.get_investment(&investment_id).await.unwrap().status,
        InvestmentStatus::Pending
    );

    assert_eq!(service.settle_pending().await, 1);
    assert_eq!(
        service.get_investment(&investment_id).await.unwrap().status,
        InvestmentStatus::Confirmed
    );
    assert_eq!(service.get_campaign(&campaign_id).await.unwrap().raised_amount, 975);

    // Nothing left to resume
    assert_eq!(service.settle_pending().await, 0);
}
