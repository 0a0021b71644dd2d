use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of providers the orchestrator can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderName {
    ProviderA,
    ProviderB,
}

impl ProviderName {
    pub const ALL: [ProviderName; 2] = [ProviderName::ProviderA, ProviderName::ProviderB];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::ProviderA => "ProviderA",
            ProviderName::ProviderB => "ProviderB",
        }
    }

    /// The provider authorization falls back to when this one rejects a card.
    pub fn other(&self) -> Self {
        match self {
            ProviderName::ProviderA => ProviderName::ProviderB,
            ProviderName::ProviderB => ProviderName::ProviderA,
        }
    }

    pub fn token_prefix(&self) -> &'static str {
        match self {
            ProviderName::ProviderA => "pa",
            ProviderName::ProviderB => "pb",
        }
    }

    pub fn transaction_prefix(&self) -> &'static str {
        match self {
            ProviderName::ProviderA => "txa",
            ProviderName::ProviderB => "txb",
        }
    }

    pub fn refund_prefix(&self) -> &'static str {
        match self {
            ProviderName::ProviderA => "rfa",
            ProviderName::ProviderB => "rfb",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ProviderA" => Ok(ProviderName::ProviderA),
            "ProviderB" => Ok(ProviderName::ProviderB),
            other => Err(PaymentError::UnknownProvider(other.to_string())),
        }
    }
}
