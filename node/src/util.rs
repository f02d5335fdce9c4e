//! Small helpers shared across the ledger: clocks, ids and address checks.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{FundFlowError, Result};

/// Maximum accepted wallet address length
pub const MAX_ADDRESS_LENGTH: usize = 128;

/// Current Unix timestamp in seconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Generate a document id such as `cmp_9f2c4e1a0b3d5c7e`
pub fn generate_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 8] = rng.gen();
    format!("{}_{}", prefix, hex::encode(bytes))
}

/// Validate a wallet address and return it trimmed
pub fn validate_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(FundFlowError::Validation(
            "wallet address cannot be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_ADDRESS_LENGTH {
        return Err(FundFlowError::Validation(format!(
            "wallet address too long: {} chars (max {})",
            trimmed.len(),
            MAX_ADDRESS_LENGTH
        )));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(FundFlowError::Validation(
            "wallet address cannot contain whitespace".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// `part` as a percentage of `whole`, 0.0 when `whole` is zero
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
