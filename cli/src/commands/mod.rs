pub mod campaign;
pub mod invest;
pub mod milestone;
pub mod portfolio;
pub mod stats;

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

/// Render a Unix timestamp for display
pub fn format_timestamp(secs: u64) -> String {
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Format an amount with thousands separators
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Color a campaign, milestone or investment status
pub fn colored_status(status: &str) -> ColoredString {
    match status {
        "active" | "confirmed" | "approved" | "completed" => status.bright_green(),
        "voting" | "submitted" | "in-progress" | "pending" => status.yellow(),
        "failed" | "rejected" | "cancelled" | "refunded" => status.bright_red(),
        _ => status.normal(),
    }
}

/// Funded share of a target, as a percentage
pub fn progress(raised: u64, target: u64) -> f64 {
    if target == 0 {
        return 0.0;
    }
    raised as f64 * 100.0 / target as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1000), "1,000");
        assert_eq!(format_amount(1234567), "1,234,567");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13 UTC");
    }

    #[test]
    fn test_progress() {
        assert_eq!(progress(500, 1000), 50.0);
        assert_eq!(progress(1200, 1000), 120.0);
        assert_eq!(progress(10, 0), 0.0);
    }
}
