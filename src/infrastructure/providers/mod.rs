//! Simulated payment processors.
//!
//! Both providers share the same failure messages and identifier scheme and
//! differ in which cards they accept and how often refunds fail.

pub mod provider_a;
pub mod provider_b;

pub use provider_a::ProviderAGateway;
pub use provider_b::ProviderBGateway;

use uuid::Uuid;

pub const INVALID_CARD: &str = "invalid card for this provider";
pub const MISSING_AUTH_TOKEN: &str = "missing authorization token for capture";
pub const CAPTURE_SYSTEM_ERROR: &str = "capture system error, please try again later";
pub const INVALID_TRANSACTION_ID: &str = "invalid transaction id for refund";
pub const REFUND_SYSTEM_ERROR: &str = "refund system error, please try again later";
pub const REFUND_LIMIT_EXCEEDED: &str = "refund amount exceeds provider limits";

/// Percentage of captures failing with a system error.
pub const CAPTURE_FAILURE_PERCENT: u32 = 10;
/// Percentage of refunds failing with a system error.
pub const REFUND_SYSTEM_ERROR_PERCENT: u32 = 10;

/// A provider identifier: the given prefix followed by a fresh UUID.
fn issue_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
