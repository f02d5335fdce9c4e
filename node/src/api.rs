/// FundFlow HTTP API
///
/// REST endpoints over the campaign service:
/// - Campaign creation, listing and cancellation
/// - Milestone lifecycle and investor voting
/// - Investment recording with background settlement
/// - Portfolio, analytics and reports
/// - Live ledger events over SSE
///
/// Base path: /api

use crate::campaign::CampaignStatus;
use crate::error::FundFlowError;
use crate::service::{
    CampaignService, CastVoteRequest, CreateCampaignRequest, CreateMilestoneRequest,
    CreatorRequest, EvidenceRequest, RecordInvestmentRequest, SubmitMilestoneRequest,
    UpdateInvestmentStatusRequest,
};

use anyhow::Result;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

// =============================================================================
// SECURITY: Request body size limits
// =============================================================================

/// Maximum allowed request body size (64KB for API requests)
const MAX_REQUEST_BODY_SIZE: usize = 64 * 1024;

/// Read request body with size limit
async fn read_body_limited(body: Body) -> Result<Vec<u8>, String> {
    use futures::StreamExt;

    let mut total_size = 0usize;
    let mut result = Vec::new();

    let mut stream = body;
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| format!("Error reading body: {}", e))?;
        total_size += chunk.len();
        if total_size > MAX_REQUEST_BODY_SIZE {
            return Err(format!(
                "Request body size exceeds maximum allowed {} bytes",
                MAX_REQUEST_BODY_SIZE
            ));
        }
        result.extend_from_slice(&chunk);
    }

    Ok(result)
}

// =============================================================================
// API RESPONSE
// =============================================================================

/// Standard API response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn success_with_message(message: &str, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            data: None,
        }
    }
}

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

fn query_params(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Offset pagination parameters
#[derive(Debug, Default)]
struct Pagination {
    offset: usize,
    limit: usize,
}

impl Pagination {
    fn from_query(query: &str) -> Self {
        let params = query_params(query);

        Self {
            offset: params
                .get("offset")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            limit: params
                .get("limit")
                .and_then(|s| s.parse().ok())
                .unwrap_or(100)
                .min(1000), // Max 1000 items
        }
    }
}

// =============================================================================
// API HANDLER
// =============================================================================

/// FundFlow API handler
pub struct FundFlowApi {
    service: Arc<CampaignService>,
}

impl FundFlowApi {
    pub fn new(service: Arc<CampaignService>) -> Self {
        Self { service }
    }

    /// Handle HTTP requests
    pub async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>> {
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or("").to_string();
        let method = req.method().clone();

        debug!("FundFlow API request: {} {}", method, path);

        if path == "/health" {
            return match method {
                Method::GET => self.handle_health().await,
                _ => Ok(self.error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")),
            };
        }

        let segments: Vec<&str> = match path.strip_prefix("/api/") {
            Some(rest) => rest.trim_end_matches('/').split('/').collect(),
            None => Vec::new(),
        };

        match (method, segments.as_slice()) {
            // Campaigns
            (Method::POST, ["campaigns"]) => self.handle_create_campaign(req).await,
            (Method::GET, ["campaigns"]) => self.handle_list_campaigns(&query).await,
            (Method::GET, ["campaigns", id]) => self.handle_get_campaign(id).await,
            (Method::POST, ["campaigns", id, "cancel"]) => {
                self.handle_cancel_campaign(id, req).await
            }
            (Method::POST, ["campaigns", id, "milestones"]) => {
                self.handle_create_milestone(id, req).await
            }
            (Method::GET, ["campaigns", id, "milestones"]) => {
                self.handle_campaign_milestones(id).await
            }
            (Method::POST, ["campaigns", id, "investments"]) => {
                self.handle_record_investment(id, req).await
            }
            (Method::GET, ["campaigns", id, "investments"]) => {
                self.handle_campaign_investments(id).await
            }
            (Method::GET, ["campaigns", id, "analytics"]) => {
                self.handle_campaign_analytics(id).await
            }
            (Method::GET, ["campaigns", id, "report"]) => self.handle_campaign_report(id).await,

            // Investments
            (Method::GET, ["investments", "portfolio", wallet]) => {
                self.handle_portfolio(wallet, &query).await
            }
            (Method::GET, ["investments", id]) => self.handle_get_investment(id).await,
            (Method::PUT, ["investments", id, "status"]) => {
                self.handle_update_investment_status(id, req).await
            }

            // Milestones
            (Method::GET, ["milestones", id]) => self.handle_get_milestone(id).await,
            (Method::POST, ["milestones", id, "start"]) => {
                self.handle_start_milestone(id, req).await
            }
            (Method::POST, ["milestones", id, "evidence"]) => {
                self.handle_attach_evidence(id, req).await
            }
            (Method::POST, ["milestones", id, "submit"]) => {
                self.handle_submit_milestone(id, req).await
            }
            (Method::POST, ["milestones", id, "votes"]) => self.handle_cast_vote(id, req).await,
            (Method::POST, ["milestones", id, "finalize"]) => {
                self.handle_finalize_milestone(id).await
            }
            (Method::POST, ["milestones", id, "release"]) => {
                self.handle_release_funds(id).await
            }

            // Platform
            (Method::GET, ["analytics", "platform"]) => self.handle_platform_stats().await,
            (Method::POST, ["admin", "sweep"]) => self.handle_sweep().await,
            (Method::GET, ["events"]) => self.handle_sse_stream().await,

            // Not found
            _ => Ok(self.error_response(StatusCode::NOT_FOUND, "Endpoint not found")),
        }
    }

    // =========================================================================
    // HEALTH
    // =========================================================================

    async fn handle_health(&self) -> Result<Response<Body>> {
        let response = ApiResponse::success(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "campaigns": self.service.store().campaign_count().await,
            "persistent": self.service.store().is_persistent(),
        }));
        json_response(StatusCode::OK, &response)
    }

    // =========================================================================
    // CAMPAIGNS
    // =========================================================================

    async fn handle_create_campaign(&self, req: Request<Body>) -> Result<Response<Body>> {
        let request: CreateCampaignRequest = match self.parse_body(req).await {
            Ok(r) => r,
            Err(response) => return Ok(response),
        };

        match self.service.create_campaign(request).await {
            Ok(campaign) => json_response(
                StatusCode::CREATED,
                &ApiResponse::success_with_message("Campaign created", serde_json::to_value(&campaign)?),
            ),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_list_campaigns(&self, query: &str) -> Result<Response<Body>> {
        let pagination = Pagination::from_query(query);
        let status = match query_params(query).get("status") {
            Some(s) => match s.parse::<CampaignStatus>() {
                Ok(status) => Some(status),
                Err(e) => return Ok(self.service_error(e)),
            },
            None => None,
        };

        let (campaigns, total) = self
            .service
            .list_campaigns(status, pagination.offset, pagination.limit)
            .await;

        let response = ApiResponse::success(serde_json::json!({
            "total": total,
            "offset": pagination.offset,
            "limit": pagination.limit,
            "campaigns": campaigns,
        }));
        json_response(StatusCode::OK, &response)
    }

    async fn handle_get_campaign(&self, id: &str) -> Result<Response<Body>> {
        match self.service.get_campaign(id).await {
            Ok(campaign) => ok_json(&campaign),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_cancel_campaign(&self, id: &str, req: Request<Body>) -> Result<Response<Body>> {
        let request: CreatorRequest = match self.parse_body(req).await {
            Ok(r) => r,
            Err(response) => return Ok(response),
        };

        match self.service.cancel_campaign(id, &request.creator_address).await {
            Ok(campaign) => json_response(
                StatusCode::OK,
                &ApiResponse::success_with_message("Campaign cancelled", serde_json::to_value(&campaign)?),
            ),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_create_milestone(&self, id: &str, req: Request<Body>) -> Result<Response<Body>> {
        let request: CreateMilestoneRequest = match self.parse_body(req).await {
            Ok(r) => r,
            Err(response) => return Ok(response),
        };

        match self.service.create_milestone(id, request).await {
            Ok(milestone) => json_response(
                StatusCode::CREATED,
                &ApiResponse::success_with_message("Milestone created", serde_json::to_value(&milestone)?),
            ),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_campaign_milestones(&self, id: &str) -> Result<Response<Body>> {
        match self.service.campaign_milestones(id).await {
            Ok(milestones) => ok_json(&serde_json::json!({
                "count": milestones.len(),
                "milestones": milestones,
            })),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_record_investment(&self, id: &str, req: Request<Body>) -> Result<Response<Body>> {
        let request: RecordInvestmentRequest = match self.parse_body(req).await {
            Ok(r) => r,
            Err(response) => return Ok(response),
        };

        let investment = match self.service.record_investment(id, request).await {
            Ok(investment) => investment,
            Err(e) => return Ok(self.service_error(e)),
        };

        // Settle in the background; the caller polls the investment
        let service = self.service.clone();
        let investment_id = investment.id.clone();
        tokio::spawn(async move {
            if let Err(e) = service.settle_investment(&investment_id).await {
                warn!("Settlement of {} aborted: {}", investment_id, e);
            }
        });

        json_response(
            StatusCode::CREATED,
            &ApiResponse::success_with_message(
                "Investment recorded, settlement pending",
                serde_json::to_value(&investment)?,
            ),
        )
    }

    async fn handle_campaign_investments(&self, id: &str) -> Result<Response<Body>> {
        match self.service.campaign_investments(id).await {
            Ok(investments) => ok_json(&serde_json::json!({
                "count": investments.len(),
                "investments": investments,
            })),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_campaign_analytics(&self, id: &str) -> Result<Response<Body>> {
        match self.service.campaign_analytics(id).await {
            Ok(analytics) => ok_json(&analytics),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_campaign_report(&self, id: &str) -> Result<Response<Body>> {
        match self.service.campaign_report(id).await {
            Ok(report) => ok_json(&report),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    // =========================================================================
    // INVESTMENTS
    // =========================================================================

    async fn handle_get_investment(&self, id: &str) -> Result<Response<Body>> {
        match self.service.get_investment(id).await {
            Ok(investment) => ok_json(&investment),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_update_investment_status(
        &self,
        id: &str,
        req: Request<Body>,
    ) -> Result<Response<Body>> {
        let request: UpdateInvestmentStatusRequest = match self.parse_body(req).await {
            Ok(r) => r,
            Err(response) => return Ok(response),
        };

        match self.service.update_investment_status(id, request.status).await {
            Ok(investment) => ok_json(&investment),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_portfolio(&self, wallet: &str, query: &str) -> Result<Response<Body>> {
        let wallet = match urlencoding::decode(wallet) {
            Ok(w) => w.into_owned(),
            Err(_) => {
                return Ok(self.error_response(StatusCode::BAD_REQUEST, "Invalid wallet address"));
            }
        };
        let params = query_params(query);
        let page = params.get("page").and_then(|s| s.parse().ok()).unwrap_or(1);
        let limit = params.get("limit").and_then(|s| s.parse().ok()).unwrap_or(0);

        match self.service.portfolio(&wallet, page, limit).await {
            Ok(portfolio) => ok_json(&portfolio),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    // =========================================================================
    // MILESTONES
    // =========================================================================

    async fn handle_get_milestone(&self, id: &str) -> Result<Response<Body>> {
        match self.service.get_milestone(id).await {
            Ok(milestone) => ok_json(&milestone),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_start_milestone(&self, id: &str, req: Request<Body>) -> Result<Response<Body>> {
        let request: CreatorRequest = match self.parse_body(req).await {
            Ok(r) => r,
            Err(response) => return Ok(response),
        };

        match self.service.start_milestone(id, &request.creator_address).await {
            Ok(milestone) => ok_json(&milestone),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_attach_evidence(&self, id: &str, req: Request<Body>) -> Result<Response<Body>> {
        let request: EvidenceRequest = match self.parse_body(req).await {
            Ok(r) => r,
            Err(response) => return Ok(response),
        };

        match self.service.attach_evidence(id, request).await {
            Ok(milestone) => ok_json(&milestone),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_submit_milestone(&self, id: &str, req: Request<Body>) -> Result<Response<Body>> {
        let request: SubmitMilestoneRequest = match self.parse_body(req).await {
            Ok(r) => r,
            Err(response) => return Ok(response),
        };

        match self.service.submit_milestone(id, request).await {
            Ok(milestone) => json_response(
                StatusCode::OK,
                &ApiResponse::success_with_message("Milestone open for voting", serde_json::to_value(&milestone)?),
            ),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_cast_vote(&self, id: &str, req: Request<Body>) -> Result<Response<Body>> {
        let request: CastVoteRequest = match self.parse_body(req).await {
            Ok(r) => r,
            Err(response) => return Ok(response),
        };

        match self.service.cast_vote(id, request).await {
            Ok(milestone) => json_response(
                StatusCode::OK,
                &ApiResponse::success_with_message("Vote recorded", serde_json::to_value(&milestone)?),
            ),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_finalize_milestone(&self, id: &str) -> Result<Response<Body>> {
        match self.service.finalize_milestone(id).await {
            Ok(milestone) => ok_json(&milestone),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_release_funds(&self, id: &str) -> Result<Response<Body>> {
        match self.service.release_milestone_funds(id).await {
            Ok(milestone) => json_response(
                StatusCode::OK,
                &ApiResponse::success_with_message("Funds released", serde_json::to_value(&milestone)?),
            ),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    // =========================================================================
    // PLATFORM
    // =========================================================================

    async fn handle_platform_stats(&self) -> Result<Response<Body>> {
        let stats = self.service.platform_stats().await;
        ok_json(&stats)
    }

    async fn handle_sweep(&self) -> Result<Response<Body>> {
        match self.service.update_statuses().await {
            Ok(report) => ok_json(&report),
            Err(e) => Ok(self.service_error(e)),
        }
    }

    async fn handle_sse_stream(&self) -> Result<Response<Body>> {
        let mut receiver = self.service.subscribe_events();

        let stream = async_stream::stream! {
            yield Ok::<_, hyper::Error>(format!(
                "event: connected\ndata: {}\n\n",
                serde_json::json!({"status": "connected"})
            ));

            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        yield Ok(event.to_sse_string());
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("SSE stream lagged, skipped {} events", n);
                        yield Ok(format!(
                            "event: warning\ndata: {}\n\n",
                            serde_json::json!({"message": format!("Skipped {} events", n)})
                        ));
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        };

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(Body::wrap_stream(stream))?)
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    async fn parse_body<T: DeserializeOwned>(&self, req: Request<Body>) -> Result<T, Response<Body>> {
        let body_bytes = read_body_limited(req.into_body())
            .await
            .map_err(|e| self.error_response(StatusCode::PAYLOAD_TOO_LARGE, &e))?;

        serde_json::from_slice(&body_bytes).map_err(|e| {
            self.error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {}", e))
        })
    }

    fn service_error(&self, e: FundFlowError) -> Response<Body> {
        if matches!(e, FundFlowError::Storage(_)) {
            warn!("Ledger storage error: {}", e);
            return self.error_response(e.status_code(), "Internal storage error");
        }
        self.error_response(e.status_code(), &e.to_string())
    }

    fn error_response(&self, status: StatusCode, message: &str) -> Response<Body> {
        let body = serde_json::to_string(&ApiResponse::error(message))
            .unwrap_or_else(|_| "{}".to_string());
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

fn json_response(status: StatusCode, response: &ApiResponse) -> Result<Response<Body>> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(response)?))?)
}

fn ok_json<T: Serialize>(data: &T) -> Result<Response<Body>> {
    json_response(StatusCode::OK, &ApiResponse::success(serde_json::to_value(data)?))
}

// =============================================================================
// SERVER
// =============================================================================

/// Run the FundFlow API server
pub async fn run_api(addr: SocketAddr, api: Arc<FundFlowApi>) -> Result<()> {
    info!("Starting FundFlow API server on {}", addr);

    let make_svc = make_service_fn(move |_conn| {
        let api = api.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let api = api.clone();
                async move {
                    match api.handle_request(req).await {
                        Ok(response) => Ok::<_, Infallible>(response),
                        Err(e) => {
                            error!("FundFlow API error: {}", e);
                            let body = serde_json::to_string(&ApiResponse::error("Internal server error"))
                                .unwrap_or_default();
                            let mut response = Response::new(Body::from(body));
                            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                            Ok(response)
                        }
                    }
                }
            }))
        }
    });

    let server = Server::bind(&addr).serve(make_svc);
    server.await?;

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::SimulatedGateway;
    use crate::service::ServiceConfig;
    use crate::store::LedgerStore;
    use crate::util::current_timestamp;

    fn create_test_api() -> Arc<FundFlowApi> {
        let service = CampaignService::new(
            Arc::new(LedgerStore::new()),
            Arc::new(SimulatedGateway::instant()),
            ServiceConfig::default(),
        );
        Arc::new(FundFlowApi::new(Arc::new(service)))
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_campaign(api: &FundFlowApi) -> String {
        let response = api
            .handle_request(post(
                "/api/campaigns",
                serde_json::json!({
                    "title": "Solar farm",
                    "creator_address": "0xcreator",
                    "target_amount": 10_000,
                    "deadline": current_timestamp() + 86_400,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        json["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let api = create_test_api();
        let response = api.handle_request(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_campaign_crud() {
        let api = create_test_api();
        let id = create_campaign(&api).await;

        let response = api
            .handle_request(get(&format!("/api/campaigns/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "active");

        let response = api.handle_request(get("/api/campaigns?status=active")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"]["total"], 1);

        let response = api
            .handle_request(post(
                &format!("/api/campaigns/{}/cancel", id),
                serde_json::json!({"creator_address": "0xcreator"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_campaign_not_found() {
        let api = create_test_api();
        let response = api.handle_request(get("/api/campaigns/cmp_missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_invalid_status_filter() {
        let api = create_test_api();
        let response = api.handle_request(get("/api/campaigns?status=bogus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_milestone_creator_mismatch_forbidden() {
        let api = create_test_api();
        let id = create_campaign(&api).await;

        let response = api
            .handle_request(post(
                &format!("/api/campaigns/{}/milestones", id),
                serde_json::json!({
                    "creator_address": "0xmallory",
                    "title": "Prototype",
                    "target_amount": 100,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_vote_without_stake_rejected() {
        let api = create_test_api();
        let id = create_campaign(&api).await;

        let response = api
            .handle_request(post(
                &format!("/api/campaigns/{}/milestones", id),
                serde_json::json!({
                    "creator_address": "0xcreator",
                    "title": "Prototype",
                    "target_amount": 100,
                }),
            ))
            .await
            .unwrap();
        let milestone_id = body_json(response).await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = api
            .handle_request(post(
                &format!("/api/milestones/{}/votes", milestone_id),
                serde_json::json!({"investor_address": "0xalice", "vote": "for"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = api
            .handle_request(post(
                &format!("/api/milestones/{}/submit", milestone_id),
                serde_json::json!({"creator_address": "0xcreator"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = api
            .handle_request(post(
                &format!("/api/milestones/{}/votes", milestone_id),
                serde_json::json!({"investor_address": "0xalice", "vote": "for"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_not_found() {
        let api = create_test_api();
        let response = api.handle_request(get("/api/unknown")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let api = create_test_api();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/campaigns")
            .header("Content-Type", "application/json")
            .body(Body::from("invalid json"))
            .unwrap();

        let response = api.handle_request(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body() {
        let api = create_test_api();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/campaigns")
            .body(Body::from(vec![b'a'; MAX_REQUEST_BODY_SIZE + 1]))
            .unwrap();

        let response = api.handle_request(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_platform_stats_and_sweep() {
        let api = create_test_api();
        create_campaign(&api).await;

        let response = api.handle_request(get("/api/analytics/platform")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"]["total_campaigns"], 1);

        let response = api
            .handle_request(post("/api/admin/sweep", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["campaigns_failed"], 0);
    }

    #[tokio::test]
    async fn test_sse_headers() {
        let api = create_test_api();
        let response = api.handle_request(get("/api/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "text/event-stream"
        );
    }

    #[test]
    fn test_pagination_parsing() {
        let pagination = Pagination::from_query("offset=10&limit=50");
        assert_eq!(pagination.offset, 10);
        assert_eq!(pagination.limit, 50);

        let pagination = Pagination::from_query("limit=5000");
        assert_eq!(pagination.limit, 1000);
    }
}
