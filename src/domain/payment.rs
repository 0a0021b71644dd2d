use super::provider::ProviderName;
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A positive amount in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, PaymentError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationFailure(vec![
                "amount must be positive".to_string(),
            ]))
        }
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = PaymentError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Card details for an authorization.
///
/// `Debug` masks everything but the last four digits of the card number.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentData {
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
    pub amount: Amount,
}

impl PaymentData {
    /// Last four digits of the card number, the only part that may be logged.
    pub fn card_suffix(&self) -> &str {
        let len = self.card_number.len();
        self.card_number.get(len.saturating_sub(4)..).unwrap_or("")
    }
}

impl fmt::Debug for PaymentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentData")
            .field("card_number", &format_args!("****{}", self.card_suffix()))
            .field("expiry_date", &self.expiry_date)
            .field("cvv", &"***")
            .field("amount", &self.amount)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaptureData {
    pub auth_token: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefundData {
    pub transaction_id: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationOutcome {
    pub auth_token: String,
    pub provider: ProviderName,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
    pub transaction_id: String,
    pub provider: ProviderName,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundOutcome {
    pub refund_id: String,
    pub provider: ProviderName,
    pub timestamp: i64,
}

/// Where a logical transaction stands, as far as the store still remembers.
///
/// Failed attempts are audited separately and never move a transaction
/// backwards, so they do not appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Unauthorized,
    Authorized,
    Captured,
    Refunded,
}
