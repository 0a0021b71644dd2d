use super::{
    CAPTURE_FAILURE_PERCENT, CAPTURE_SYSTEM_ERROR, INVALID_CARD, INVALID_TRANSACTION_ID,
    MISSING_AUTH_TOKEN, REFUND_LIMIT_EXCEEDED, REFUND_SYSTEM_ERROR, REFUND_SYSTEM_ERROR_PERCENT,
    issue_id, now,
};
use crate::domain::gateway::ProviderGateway;
use crate::domain::payment::{
    AuthorizationOutcome, CaptureData, CaptureOutcome, PaymentData, RefundData, RefundOutcome,
};
use crate::domain::provider::ProviderName;
use crate::domain::random::RandomSource;
use crate::error::ProviderFailure;
use async_trait::async_trait;
use std::sync::Arc;

/// Leading digit of the only card numbers this provider authorizes.
pub const ACCEPTED_CARD_PREFIX: char = '4';
/// Percentage of refunds, on top of system errors, rejected for exceeding limits.
pub const REFUND_LIMIT_PERCENT: u32 = 10;

/// The stricter simulated provider.
///
/// Authorizes only cards starting with `4`. Captures fail 10% of the time and
/// refunds 20% of the time, split evenly between system errors and limit
/// violations.
#[derive(Clone)]
pub struct ProviderAGateway {
    random: Arc<dyn RandomSource>,
}

impl ProviderAGateway {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    fn failure(&self, message: &str) -> ProviderFailure {
        ProviderFailure::new(self.name().as_str(), message)
    }
}

#[async_trait]
impl ProviderGateway for ProviderAGateway {
    fn name(&self) -> ProviderName {
        ProviderName::ProviderA
    }

    fn accepts(&self, payment: &PaymentData) -> bool {
        payment.card_number.starts_with(ACCEPTED_CARD_PREFIX)
    }

    async fn authorize(
        &self,
        payment: &PaymentData,
    ) -> Result<AuthorizationOutcome, ProviderFailure> {
        if !self.accepts(payment) {
            return Err(self.failure(INVALID_CARD));
        }
        Ok(AuthorizationOutcome {
            auth_token: issue_id(self.name().token_prefix()),
            provider: self.name(),
            timestamp: now(),
        })
    }

    async fn capture(&self, capture: &CaptureData) -> Result<CaptureOutcome, ProviderFailure> {
        if capture.auth_token.trim().is_empty() {
            return Err(self.failure(MISSING_AUTH_TOKEN));
        }
        if self.random.percentile() <= CAPTURE_FAILURE_PERCENT {
            return Err(self.failure(CAPTURE_SYSTEM_ERROR));
        }
        Ok(CaptureOutcome {
            transaction_id: issue_id(self.name().transaction_prefix()),
            provider: self.name(),
            timestamp: now(),
        })
    }

    async fn refund(&self, refund: &RefundData) -> Result<RefundOutcome, ProviderFailure> {
        if refund.transaction_id.trim().is_empty() {
            return Err(self.failure(INVALID_TRANSACTION_ID));
        }
        let roll = self.random.percentile();
        if roll <= REFUND_SYSTEM_ERROR_PERCENT {
            return Err(self.failure(REFUND_SYSTEM_ERROR));
        }
        if roll <= REFUND_SYSTEM_ERROR_PERCENT + REFUND_LIMIT_PERCENT {
            return Err(self.failure(REFUND_LIMIT_EXCEEDED));
        }
        Ok(RefundOutcome {
            refund_id: issue_id(self.name().refund_prefix()),
            provider: self.name(),
            timestamp: now(),
        })
    }
}
