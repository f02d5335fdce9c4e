//! Periodic status sweep
//!
//! Resolves campaigns past their deadline and closes milestone votes whose
//! voting window has ended.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

use crate::service::CampaignService;

/// What one sweep changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub campaigns_completed: u32,
    pub campaigns_failed: u32,
    pub milestones_approved: u32,
    pub milestones_rejected: u32,
}

impl SweepReport {
    pub fn total(&self) -> u32 {
        self.campaigns_completed
            + self.campaigns_failed
            + self.milestones_approved
            + self.milestones_rejected
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

pub struct StatusScheduler {
    service: Arc<CampaignService>,
    interval: Duration,
}

impl StatusScheduler {
    pub fn new(service: Arc<CampaignService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Sweep forever on the configured interval
    pub async fn run(&self) {
        info!(
            "Starting status scheduler with {}s interval",
            self.interval.as_secs()
        );

        let mut ticker = interval(self.interval);

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// Run a single sweep, logging instead of propagating failures
    pub async fn run_once(&self) -> Option<SweepReport> {
        match self.service.update_statuses().await {
            Ok(report) => {
                if !report.is_empty() {
                    info!(
                        "Status sweep: {} completed, {} failed, {} approved, {} rejected",
                        report.campaigns_completed,
                        report.campaigns_failed,
                        report.milestones_approved,
                        report.milestones_rejected
                    );
                }
                Some(report)
            }
            Err(e) => {
                error!("Status sweep failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::SimulatedGateway;
    use crate::service::{CreateCampaignRequest, ServiceConfig};
    use crate::store::LedgerStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_run_once_resolves_expired_campaign() {
        let clock = Arc::new(AtomicU64::new(1_000));
        let clock_ref = clock.clone();
        let service = Arc::new(
            CampaignService::new(
                Arc::new(LedgerStore::new()),
                Arc::new(SimulatedGateway::instant()),
                ServiceConfig::default(),
            )
            .with_clock(Arc::new(move || clock_ref.load(Ordering::SeqCst))),
        );

        service
            .create_campaign(CreateCampaignRequest {
                title: "Expiring".to_string(),
                description: String::new(),
                creator_address: "0xcreator".to_string(),
                target_amount: 100,
                deadline: 2_000,
            })
            .await
            .unwrap();

        let scheduler = StatusScheduler::new(service, Duration::from_secs(60));
        assert_eq!(scheduler.run_once().await, Some(SweepReport::default()));

        clock.store(2_001, Ordering::SeqCst);
        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report.campaigns_failed, 1);
        assert_eq!(report.total(), 1);
    }
}
