//! FundFlow error types
//!
//! A single error enum shared by the domain model, the ledger store and the
//! campaign service. The API layer maps each variant to an HTTP status.

use hyper::StatusCode;

/// FundFlow domain errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FundFlowError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Milestone not found: {0}")]
    MilestoneNotFound(String),

    #[error("Investment not found: {0}")]
    InvestmentNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid transition: cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Campaign {0} is not accepting investments")]
    CampaignNotActive(String),

    #[error("Voting is closed for milestone {0}")]
    VotingClosed(String),

    #[error("Investor {0} has no voting power in this campaign")]
    NoVotingPower(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Insufficient funds: need {need}, available {available}")]
    InsufficientFunds { need: u64, available: u64 },

    #[error("Settlement failed: {0}")]
    Settlement(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FundFlowError {
    /// HTTP status used when this error reaches the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            FundFlowError::CampaignNotFound(_)
            | FundFlowError::MilestoneNotFound(_)
            | FundFlowError::InvestmentNotFound(_) => StatusCode::NOT_FOUND,
            FundFlowError::Validation(_)
            | FundFlowError::NoVotingPower(_)
            | FundFlowError::Config(_) => StatusCode::BAD_REQUEST,
            FundFlowError::InvalidTransition { .. }
            | FundFlowError::CampaignNotActive(_)
            | FundFlowError::VotingClosed(_)
            | FundFlowError::InsufficientFunds { .. } => StatusCode::CONFLICT,
            FundFlowError::Forbidden(_) => StatusCode::FORBIDDEN,
            FundFlowError::Settlement(_) | FundFlowError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the message is safe to show to API callers
    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    pub(crate) fn transition(from: impl std::fmt::Display, action: &str) -> Self {
        FundFlowError::InvalidTransition {
            from: from.to_string(),
            action: action.to_string(),
        }
    }
}

impl From<rusqlite::Error> for FundFlowError {
    fn from(e: rusqlite::Error) -> Self {
        FundFlowError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for FundFlowError {
    fn from(e: serde_json::Error) -> Self {
        FundFlowError::Storage(format!("document encoding: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, FundFlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err = FundFlowError::CampaignNotFound("cmp_1".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("cmp_1"));
    }

    #[test]
    fn test_transition_message() {
        let err = FundFlowError::transition("completed", "submit for voting");
        assert_eq!(
            err.to_string(),
            "Invalid transition: cannot submit for voting while completed"
        );
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_forbidden_maps_to_403() {
        let err = FundFlowError::Forbidden("not the campaign creator".to_string());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_storage_errors_are_internal() {
        let err = FundFlowError::Storage("disk full".to_string());
        assert!(err.is_internal());
        assert!(!FundFlowError::Validation("x".to_string()).is_internal());
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = FundFlowError::InsufficientFunds { need: 500, available: 200 };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("200"));
    }
}
