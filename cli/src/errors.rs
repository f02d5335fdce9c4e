use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Wallet address not set. Run 'fundflow-cli config set-wallet <ADDRESS>' or pass --wallet")]
    WalletNotSet,

    #[error("Invalid API URL: {0}. Must start with http:// or https://")]
    InvalidApiUrl(String),

    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),

    #[error("Invalid amount: {0}. Must be greater than zero")]
    InvalidAmount(u64),

    #[error("Invalid vote: {0}. Valid options: for, against")]
    InvalidVote(String),

    #[error("Invalid deadline: {0}. Use a number of days or an RFC 3339 timestamp")]
    InvalidDeadline(String),

    #[error("Node rejected request: {0}")]
    Api(String),

    #[error("Cannot reach FundFlow node at {url}: {reason}")]
    Unreachable { url: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_not_set_error() {
        let err = CliError::WalletNotSet;
        assert!(err.to_string().contains("set-wallet"));
    }

    #[test]
    fn test_invalid_api_url_error() {
        let err = CliError::InvalidApiUrl("localhost:8080".to_string());
        assert!(err.to_string().contains("localhost:8080"));
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn test_invalid_vote_error() {
        let err = CliError::InvalidVote("maybe".to_string());
        assert!(err.to_string().contains("maybe"));
        assert!(err.to_string().contains("against"));
    }

    #[test]
    fn test_unreachable_error() {
        let err = CliError::Unreachable {
            url: "http://127.0.0.1:1".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("127.0.0.1:1"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_invalid_amount() {
        let err = CliError::InvalidAmount(0);
        assert!(err.to_string().contains("greater than zero"));
    }
}
