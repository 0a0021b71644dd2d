use super::payment::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Retention for authorization, capture, refund, error and alias records.
pub const DEFAULT_OPERATION_TTL: u64 = 18_000;
/// Retention for the load balancer counter.
pub const COUNTER_TTL: u64 = 300;
/// Provider name recorded when a failure happens before any provider is known.
pub const UNKNOWN_PROVIDER: &str = "unknown";

/// One of the three phases of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Authorization,
    Capture,
    Refund,
}

impl Phase {
    /// Prefix used in operation keys for this phase.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Phase::Authorization => "auth",
            Phase::Capture => "capture",
            Phase::Refund => "refund",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Authorization => "authorization",
            Phase::Capture => "capture",
            Phase::Refund => "refund",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Authorization,
    Capture,
    Refund,
    Error,
    LookupAlias,
    Counter,
}

impl From<Phase> for OperationKind {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Authorization => OperationKind::Authorization,
            Phase::Capture => OperationKind::Capture,
            Phase::Refund => OperationKind::Refund,
        }
    }
}

/// The unit of persisted state.
///
/// Counter records reuse `amount` for the counter value. Alias records point at
/// their canonical record through `related_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation_key: String,
    pub kind: OperationKind,
    pub provider: String,
    pub amount: i64,
    pub related_key: Option<String>,
    pub message: Option<String>,
    /// Seconds since epoch, stamped by the store on save.
    pub timestamp: i64,
    pub ttl_seconds: u64,
}

impl OperationRecord {
    pub fn new(
        operation_key: impl Into<String>,
        kind: OperationKind,
        provider: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            operation_key: operation_key.into(),
            kind,
            provider: provider.into(),
            amount: amount.minor_units(),
            related_key: None,
            message: None,
            timestamp: 0,
            ttl_seconds: DEFAULT_OPERATION_TTL,
        }
    }

    /// An alias from `operation_key` to the record stored under `target_key`.
    pub fn alias(
        operation_key: impl Into<String>,
        target_key: impl Into<String>,
        provider: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self::new(operation_key, OperationKind::LookupAlias, provider, amount)
            .with_related(target_key)
    }

    pub fn counter(operation_key: impl Into<String>, value: u64) -> Self {
        Self {
            operation_key: operation_key.into(),
            kind: OperationKind::Counter,
            provider: UNKNOWN_PROVIDER.to_string(),
            amount: i64::try_from(value).unwrap_or(i64::MAX),
            related_key: None,
            message: None,
            timestamp: 0,
            ttl_seconds: COUNTER_TTL,
        }
    }

    pub fn with_related(mut self, related_key: impl Into<String>) -> Self {
        self.related_key = Some(related_key.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Value held by a counter record.
    pub fn counter_value(&self) -> u64 {
        u64::try_from(self.amount).unwrap_or(0)
    }

    /// The provider-issued identifier this record is keyed by, e.g. the
    /// transaction id of a capture record.
    pub fn subject_id(&self) -> Option<&str> {
        let prefix = match self.kind {
            OperationKind::Authorization => Phase::Authorization.key_prefix(),
            OperationKind::Capture => Phase::Capture.key_prefix(),
            OperationKind::Refund => Phase::Refund.key_prefix(),
            _ => return None,
        };
        self.operation_key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|id| !id.is_empty())
    }
}

/// Builders for every key the orchestrator writes.
pub mod keys {
    use super::Phase;
    use uuid::Uuid;

    pub const LOAD_BALANCER_COUNTER: &str = "load_balancer_counter";

    pub fn authorization(auth_token: &str) -> String {
        format!("{}_{}", Phase::Authorization.key_prefix(), auth_token)
    }

    pub fn capture(transaction_id: &str) -> String {
        format!("{}_{}", Phase::Capture.key_prefix(), transaction_id)
    }

    pub fn refund(refund_id: &str) -> String {
        format!("{}_{}", Phase::Refund.key_prefix(), refund_id)
    }

    /// Alias key guarding a phase, keyed by the identifier of the previous phase.
    pub fn lookup(phase: Phase, originating_id: &str) -> String {
        format!("{}_lookup_{}", phase.key_prefix(), originating_id)
    }

    /// A fresh key for an error record; never collides with an earlier one.
    pub fn error(phase: Phase) -> String {
        format!("{}_error_{}", phase.key_prefix(), Uuid::new_v4().simple())
    }
}
