//! Ledger events streamed to API subscribers over SSE

use serde::Serialize;

use crate::campaign::CampaignStatus;
use crate::investment::InvestmentStatus;
use crate::milestone::{MilestoneStatus, VoteChoice};

/// Capacity of the event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    CampaignCreated {
        campaign_id: String,
        target_amount: u64,
    },
    CampaignStatusChanged {
        campaign_id: String,
        status: CampaignStatus,
    },
    InvestmentRecorded {
        investment_id: String,
        campaign_id: String,
        amount: u64,
    },
    InvestmentStatusChanged {
        investment_id: String,
        campaign_id: String,
        status: InvestmentStatus,
    },
    VoteCast {
        milestone_id: String,
        investor_address: String,
        choice: VoteChoice,
        voting_power: u64,
    },
    MilestoneStatusChanged {
        milestone_id: String,
        campaign_id: String,
        status: MilestoneStatus,
    },
    FundsReleased {
        milestone_id: String,
        campaign_id: String,
        amount: u64,
        tx_hash: String,
    },
}

impl LedgerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::CampaignCreated { .. } => "campaign_created",
            LedgerEvent::CampaignStatusChanged { .. } => "campaign_status_changed",
            LedgerEvent::InvestmentRecorded { .. } => "investment_recorded",
            LedgerEvent::InvestmentStatusChanged { .. } => "investment_status_changed",
            LedgerEvent::VoteCast { .. } => "vote_cast",
            LedgerEvent::MilestoneStatusChanged { .. } => "milestone_status_changed",
            LedgerEvent::FundsReleased { .. } => "funds_released",
        }
    }

    /// Format as SSE message
    pub fn to_sse_string(&self) -> String {
        format!(
            "event: {}\ndata: {}\n\n",
            self.event_type(),
            serde_json::to_string(self).unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_format() {
        let event = LedgerEvent::VoteCast {
            milestone_id: "ms_1".to_string(),
            investor_address: "0xalice".to_string(),
            choice: VoteChoice::For,
            voting_power: 975,
        };

        let sse = event.to_sse_string();
        assert!(sse.starts_with("event: vote_cast\n"));
        assert!(sse.contains("\"choice\":\"for\""));
        assert!(sse.ends_with("\n\n"));
    }

    #[test]
    fn test_status_serialized_lowercase() {
        let event = LedgerEvent::MilestoneStatusChanged {
            milestone_id: "ms_1".to_string(),
            campaign_id: "cmp_1".to_string(),
            status: MilestoneStatus::InProgress,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "milestone_status_changed");
        assert_eq!(json["status"], "in-progress");
    }
}
