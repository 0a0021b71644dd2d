use super::{
    CAPTURE_FAILURE_PERCENT, CAPTURE_SYSTEM_ERROR, INVALID_TRANSACTION_ID, MISSING_AUTH_TOKEN,
    REFUND_SYSTEM_ERROR, REFUND_SYSTEM_ERROR_PERCENT, issue_id, now,
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

/// The permissive simulated provider: authorizes every card.
#[derive(Clone)]
pub struct ProviderBGateway {
    random: Arc<dyn RandomSource>,
}

impl ProviderBGateway {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    fn failure(&self, message: &str) -> ProviderFailure {
        ProviderFailure::new(self.name().as_str(), message)
    }
}

#[async_trait]
impl ProviderGateway for ProviderBGateway {
    fn name(&self) -> ProviderName {
        ProviderName::ProviderB
    }

    async fn authorize(
        &self,
        _payment: &PaymentData,
    ) -> Result<AuthorizationOutcome, ProviderFailure> {
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
        if self.random.percentile() <= REFUND_SYSTEM_ERROR_PERCENT {
            return Err(self.failure(REFUND_SYSTEM_ERROR));
        }
        Ok(RefundOutcome {
            refund_id: issue_id(self.name().refund_prefix()),
            provider: self.name(),
            timestamp: now(),
        })
    }
}
