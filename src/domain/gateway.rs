use super::payment::{
    AuthorizationOutcome, CaptureData, CaptureOutcome, PaymentData, RefundData, RefundOutcome,
};
use super::provider::ProviderName;
use crate::error::ProviderFailure;
use async_trait::async_trait;
use std::sync::Arc;

/// A downstream payment processor.
///
/// Implementations report rejections as [`ProviderFailure`] and never retry;
/// retrying is the caller's decision.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Whether this provider would authorize the given card.
    fn accepts(&self, _payment: &PaymentData) -> bool {
        true
    }

    async fn authorize(
        &self,
        payment: &PaymentData,
    ) -> Result<AuthorizationOutcome, ProviderFailure>;

    async fn capture(&self, capture: &CaptureData) -> Result<CaptureOutcome, ProviderFailure>;

    async fn refund(&self, refund: &RefundData) -> Result<RefundOutcome, ProviderFailure>;
}

pub type GatewayRef = Arc<dyn ProviderGateway>;
