//! Simulated settlement
//!
//! Investments and milestone payouts settle through a [`PaymentGateway`].
//! The node ships with [`SimulatedGateway`], which waits for a configured
//! confirmation delay and returns a random transaction hash.

use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FundFlowError, Result};

/// Settlement backend for investments and fund releases
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Collect an investment, returning the transaction hash
    async fn settle_investment(&self, investment_id: &str, amount: u64) -> Result<String>;

    /// Pay a released milestone amount to the campaign creator
    async fn release_funds(&self, milestone_id: &str, recipient: &str, amount: u64)
        -> Result<String>;
}

/// Gateway that simulates confirmation latency and failures
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    confirmation_delay: Duration,
    failure_rate: f64,
}

impl SimulatedGateway {
    pub fn new(confirmation_delay: Duration, failure_rate: f64) -> Self {
        Self {
            confirmation_delay,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Gateway with no delay that always succeeds
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, 0.0)
    }

    async fn settle(&self, kind: &str, reference: &str) -> Result<String> {
        if !self.confirmation_delay.is_zero() {
            tokio::time::sleep(self.confirmation_delay).await;
        }

        let failed = self.failure_rate > 0.0 && rand::thread_rng().gen::<f64>() < self.failure_rate;
        if failed {
            warn!("Simulated {} for {} failed", kind, reference);
            return Err(FundFlowError::Settlement(format!(
                "{} for {} was not confirmed",
                kind, reference
            )));
        }

        let hash = generate_tx_hash();
        debug!("Simulated {} for {} confirmed: {}", kind, reference, hash);
        Ok(hash)
    }
}

#[async_trait::async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn settle_investment(&self, investment_id: &str, _amount: u64) -> Result<String> {
        self.settle("payment", investment_id).await
    }

    async fn release_funds(
        &self,
        milestone_id: &str,
        _recipient: &str,
        _amount: u64,
    ) -> Result<String> {
        self.settle("payout", milestone_id).await
    }
}

/// `0x` followed by 32 random bytes in hex
pub fn generate_tx_hash() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_format() {
        let hash = generate_tx_hash();
        assert!(hash.starts_with("0x"));
        assert_eq!(hash.len(), 66);
        assert!(hash[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_instant_gateway_succeeds() {
        let gateway = SimulatedGateway::instant();
        let hash = gateway.settle_investment("inv_1", 100).await.unwrap();
        assert_eq!(hash.len(), 66);
        let payout = gateway.release_funds("ms_1", "0xcreator", 100).await.unwrap();
        assert_ne!(hash, payout);
    }

    #[tokio::test]
    async fn test_certain_failure() {
        let gateway = SimulatedGateway::new(Duration::ZERO, 1.0);
        let err = gateway.settle_investment("inv_1", 100).await.unwrap_err();
        assert!(matches!(err, FundFlowError::Settlement(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_delay() {
        let gateway = SimulatedGateway::new(Duration::from_millis(2000), 0.0);
        let started = tokio::time::Instant::now();
        gateway.settle_investment("inv_1", 100).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }

    #[test]
    fn test_failure_rate_clamped() {
        let gateway = SimulatedGateway::new(Duration::ZERO, 7.0);
        assert_eq!(gateway.failure_rate, 1.0);
    }
}
