use crate::application::selector::{Gateways, ProviderSelector};
use crate::config::OrchestratorConfig;
use crate::domain::gateway::GatewayRef;
use crate::domain::operation::{OperationKind, OperationRecord, Phase, UNKNOWN_PROVIDER, keys};
use crate::domain::payment::{Amount, CaptureData, PaymentData, RefundData, TransactionState};
use crate::domain::ports::SharedOperationStore;
use crate::domain::provider::ProviderName;
use crate::error::{PaymentError, ProviderFailure, Result};
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Reported when a provider call exceeds the configured timeout.
pub const PROVIDER_TIMED_OUT: &str = "provider timed out";

/// Drives a payment through authorize, capture and refund.
///
/// Every successful phase is persisted exactly once; capture and refund are
/// idempotent per originating identifier through lookup aliases. Every failure
/// is recorded as an error record under a fresh key and returned to the
/// caller. Nothing is retried here.
///
/// The orchestrator is `Send + Sync` and meant to be shared behind an `Arc`.
pub struct PaymentOrchestrator {
    store: SharedOperationStore,
    selector: ProviderSelector,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    /// Creates a new `PaymentOrchestrator`.
    ///
    /// # Arguments
    ///
    /// * `store` - The store for operation records and the selection counter.
    /// * `gateways` - The gateway behind each provider.
    /// * `config` - TTLs, selection policy and provider call settings.
    pub fn new(store: SharedOperationStore, gateways: Gateways, config: OrchestratorConfig) -> Self {
        let selector = ProviderSelector::new(
            store.clone(),
            gateways,
            config.selection,
            config.counter_ttl,
        );
        Self {
            store,
            selector,
            config,
        }
    }

    pub fn store(&self) -> &SharedOperationStore {
        &self.store
    }

    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Authorizes a payment and returns the provider's auth token.
    pub async fn authorize(&self, payment: PaymentData) -> Result<String> {
        info!(
            card = payment.card_suffix(),
            amount = %payment.amount,
            "Authorization request received"
        );

        let mut provider = self.selector.select_for_new_authorization().await?;
        let mut gateway = self.selector.gateway(provider);
        if self.config.provider_switch && !gateway.accepts(&payment) {
            let fallback = provider.other();
            info!(
                card = payment.card_suffix(),
                switch_from = %provider,
                switch_to = %fallback,
                "Authorization provider switched"
            );
            provider = fallback;
            gateway = self.selector.gateway(provider);
        }

        match self.call_provider(provider, gateway.authorize(&payment)).await {
            Ok(outcome) => {
                let key = keys::authorization(&outcome.auth_token);
                let record = OperationRecord::new(
                    &key,
                    OperationKind::Authorization,
                    outcome.provider.as_str(),
                    payment.amount,
                )
                .with_message("authorized");
                self.store
                    .save(&key, record, self.config.operation_ttl)
                    .await?;

                info!(
                    auth_token = %outcome.auth_token,
                    provider = %outcome.provider,
                    "Authorization successful"
                );
                Ok(outcome.auth_token)
            }
            Err(failure) => Err(self.reject(Phase::Authorization, failure, payment.amount).await),
        }
    }

    /// Captures an authorized payment and returns the transaction id.
    ///
    /// Repeating a capture for the same auth token returns the first
    /// transaction id without contacting the provider again.
    pub async fn capture(&self, capture: CaptureData) -> Result<String> {
        let auth_token = capture.auth_token.as_str();
        info!(auth_token, amount = %capture.amount, "Capture request received");

        if let Some(transaction_id) = self.completed(Phase::Capture, auth_token).await? {
            debug!(transaction_id = %transaction_id, "Capture already processed");
            return Ok(transaction_id);
        }

        let Some(authorization) = self
            .find(&keys::authorization(auth_token), Phase::Authorization)
            .await?
        else {
            error!(auth_token, "Capture failed: Authorization not found for capture");
            self.record_failure(
                Phase::Capture,
                UNKNOWN_PROVIDER,
                capture.amount,
                "Authorization not found for capture",
            )
            .await;
            return Err(PaymentError::AuthorizationNotFound {
                auth_token: auth_token.to_string(),
            });
        };

        let gateway = self
            .resolve(Phase::Capture, &authorization, capture.amount)
            .await?;

        match self
            .call_provider(gateway.name(), gateway.capture(&capture))
            .await
        {
            Ok(outcome) => {
                let key = keys::capture(&outcome.transaction_id);
                let record = OperationRecord::new(
                    &key,
                    OperationKind::Capture,
                    outcome.provider.as_str(),
                    capture.amount,
                )
                .with_related(auth_token)
                .with_message("Captured successfully");
                self.store
                    .save(&key, record, self.config.operation_ttl)
                    .await?;
                self.link(
                    Phase::Capture,
                    auth_token,
                    &key,
                    outcome.provider,
                    capture.amount,
                )
                .await?;

                info!(
                    transaction_id = %outcome.transaction_id,
                    provider = %outcome.provider,
                    "Capture successful"
                );
                Ok(outcome.transaction_id)
            }
            Err(failure) => Err(self.reject(Phase::Capture, failure, capture.amount).await),
        }
    }

    /// Refunds a captured payment and returns the refund id.
    ///
    /// Repeating a refund for the same transaction id returns the first refund
    /// id without contacting the provider again.
    pub async fn refund(&self, refund: RefundData) -> Result<String> {
        let transaction_id = refund.transaction_id.as_str();
        info!(transaction_id, amount = %refund.amount, "Refund request received");

        if let Some(refund_id) = self.completed(Phase::Refund, transaction_id).await? {
            debug!(refund_id = %refund_id, "Refund already processed");
            return Ok(refund_id);
        }

        let Some(captured) = self
            .find(&keys::capture(transaction_id), Phase::Capture)
            .await?
        else {
            error!(transaction_id, "Refund failed: Capture not found for refund");
            self.record_failure(
                Phase::Refund,
                UNKNOWN_PROVIDER,
                refund.amount,
                "Capture not found for refund",
            )
            .await;
            return Err(PaymentError::CaptureNotFound {
                transaction_id: transaction_id.to_string(),
            });
        };

        let gateway = self
            .resolve(Phase::Refund, &captured, refund.amount)
            .await?;

        match self
            .call_provider(gateway.name(), gateway.refund(&refund))
            .await
        {
            Ok(outcome) => {
                let key = keys::refund(&outcome.refund_id);
                let record = OperationRecord::new(
                    &key,
                    OperationKind::Refund,
                    outcome.provider.as_str(),
                    refund.amount,
                )
                .with_related(transaction_id)
                .with_message("Refunded successfully");
                self.store
                    .save(&key, record, self.config.operation_ttl)
                    .await?;
                self.link(
                    Phase::Refund,
                    transaction_id,
                    &key,
                    outcome.provider,
                    refund.amount,
                )
                .await?;

                info!(
                    refund_id = %outcome.refund_id,
                    provider = %outcome.provider,
                    "Refund successful"
                );
                Ok(outcome.refund_id)
            }
            Err(failure) => Err(self.reject(Phase::Refund, failure, refund.amount).await),
        }
    }

    /// Where the transaction started by `auth_token` currently stands.
    pub async fn transaction_state(&self, auth_token: &str) -> Result<TransactionState> {
        if let Some(transaction_id) = self.completed(Phase::Capture, auth_token).await? {
            if self
                .completed(Phase::Refund, &transaction_id)
                .await?
                .is_some()
            {
                return Ok(TransactionState::Refunded);
            }
            return Ok(TransactionState::Captured);
        }
        if self
            .find(&keys::authorization(auth_token), Phase::Authorization)
            .await?
            .is_some()
        {
            Ok(TransactionState::Authorized)
        } else {
            Ok(TransactionState::Unauthorized)
        }
    }

    /// Reads the record under `key` if it was written by `phase`.
    ///
    /// Caller-supplied identifiers can make a phase key collide with an alias
    /// or error key, so the kind is checked before the record is trusted.
    async fn find(&self, key: &str, phase: Phase) -> Result<Option<OperationRecord>> {
        let record = self.store.get(key).await?;
        Ok(record.filter(|record| record.kind == OperationKind::from(phase)))
    }

    /// The identifier a phase already produced for `originating_id`, if any.
    async fn completed(&self, phase: Phase, originating_id: &str) -> Result<Option<String>> {
        let record = self.follow(&keys::lookup(phase, originating_id)).await?;
        Ok(record
            .filter(|record| record.kind == OperationKind::from(phase))
            .and_then(|record| record.subject_id().map(str::to_owned)))
    }

    /// Reads the record an alias points at.
    async fn follow(&self, lookup_key: &str) -> Result<Option<OperationRecord>> {
        let Some(alias) = self.store.get(lookup_key).await? else {
            return Ok(None);
        };
        if alias.kind != OperationKind::LookupAlias {
            return Ok(None);
        }
        match alias.related_key.as_deref() {
            Some(target) => self.store.get(target).await,
            None => {
                warn!(lookup_key, "Lookup alias without target");
                Ok(None)
            }
        }
    }

    /// Points the phase's lookup alias at its freshly written record.
    ///
    /// Must run only after the record itself was saved. A live alias left by a
    /// concurrent request for the same identifier wins.
    async fn link(
        &self,
        phase: Phase,
        originating_id: &str,
        target_key: &str,
        provider: ProviderName,
        amount: Amount,
    ) -> Result<()> {
        let lookup_key = keys::lookup(phase, originating_id);
        let alias = OperationRecord::alias(&lookup_key, target_key, provider.as_str(), amount);
        let ttl = self.config.operation_ttl;

        if self
            .store
            .save_if_absent(&lookup_key, alias.clone(), ttl)
            .await?
        {
            return Ok(());
        }
        if self.follow(&lookup_key).await?.is_some() {
            warn!(
                phase = %phase,
                lookup_key = %lookup_key,
                duplicate_key = target_key,
                "Concurrent request already completed this phase; keeping the first result"
            );
            return Ok(());
        }
        // The existing alias points at a record that has since expired.
        self.store.save(&lookup_key, alias, ttl).await
    }

    async fn resolve(
        &self,
        phase: Phase,
        record: &OperationRecord,
        amount: Amount,
    ) -> Result<GatewayRef> {
        match self.selector.resolve_by_name(&record.provider) {
            Ok(gateway) => Ok(gateway),
            Err(err) => {
                error!(
                    phase = %phase,
                    operation_key = %record.operation_key,
                    provider = %record.provider,
                    "Stored provider matches no gateway"
                );
                self.record_failure(phase, &record.provider, amount, &err.to_string())
                    .await;
                Err(err)
            }
        }
    }

    async fn call_provider<T>(
        &self,
        provider: ProviderName,
        call: impl Future<Output = std::result::Result<T, ProviderFailure>>,
    ) -> std::result::Result<T, ProviderFailure> {
        match self.config.provider_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderFailure::new(provider.as_str(), PROVIDER_TIMED_OUT)),
            },
            None => call.await,
        }
    }

    async fn reject(&self, phase: Phase, failure: ProviderFailure, amount: Amount) -> PaymentError {
        error!(
            phase = %phase,
            provider = %failure.provider,
            reason = %failure.message,
            "Provider rejected operation"
        );
        self.record_failure(phase, &failure.provider, amount, &failure.message)
            .await;
        PaymentError::PaymentFailure {
            phase,
            source: failure,
        }
    }

    /// Writes an audit record for a failed phase.
    ///
    /// A store fault here is logged and swallowed so the caller still sees the
    /// failure that triggered it.
    async fn record_failure(&self, phase: Phase, provider: &str, amount: Amount, message: &str) {
        let key = keys::error(phase);
        let record = OperationRecord::new(&key, OperationKind::Error, provider, amount)
            .with_message(message);
        if let Err(e) = self
            .store
            .save(&key, record, self.config.operation_ttl)
            .await
        {
            error!(operation_key = %key, error = %e, "Failed to record operation error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::OperationStore;
    use crate::domain::random::FixedRandom;
    use crate::infrastructure::in_memory::InMemoryOperationStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn orchestrator_with(
        config: OrchestratorConfig,
        random: FixedRandom,
    ) -> (PaymentOrchestrator, InMemoryOperationStore) {
        let store = InMemoryOperationStore::new();
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Gateways::simulated(Arc::new(random)),
            config,
        );
        (orchestrator, store)
    }

    fn orchestrator() -> (PaymentOrchestrator, InMemoryOperationStore) {
        orchestrator_with(OrchestratorConfig::default(), FixedRandom::ALWAYS_SUCCEED)
    }

    fn payment(card: &str) -> PaymentData {
        PaymentData {
            card_number: card.to_string(),
            expiry_date: "12/30".to_string(),
            cvv: "123".to_string(),
            amount: Amount::new(10000).unwrap(),
        }
    }

    fn capture(auth_token: &str) -> CaptureData {
        CaptureData {
            auth_token: auth_token.to_string(),
            amount: Amount::new(10000).unwrap(),
        }
    }

    fn refund(transaction_id: &str) -> RefundData {
        RefundData {
            transaction_id: transaction_id.to_string(),
            amount: Amount::new(10000).unwrap(),
        }
    }

    async fn keys_with_prefix(store: &InMemoryOperationStore, prefix: &str) -> Vec<String> {
        store
            .keys()
            .await
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect()
    }

    #[tokio::test]
    async fn test_authorize_persists_authorization() {
        let (orchestrator, store) = orchestrator();
        let token = orchestrator
            .authorize(payment("4111111111111111"))
            .await
            .unwrap();
        assert!(token.starts_with("pa"));

        let record = store
            .get(&keys::authorization(&token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.kind, OperationKind::Authorization);
        assert_eq!(record.provider, "ProviderA");
        assert_eq!(record.amount, 10000);
        assert_eq!(record.ttl_seconds, 18_000);
    }

    #[tokio::test]
    async fn test_rejected_authorization_writes_one_error_record() {
        let (orchestrator, store) = orchestrator();
        let err = orchestrator
            .authorize(payment("5111111111111111"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::PaymentFailure {
                phase: Phase::Authorization,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Payment authorization failed: invalid card for this provider"
        );

        let errors = keys_with_prefix(&store, "auth_error_").await;
        assert_eq!(errors.len(), 1);
        let record = store.get(&errors[0]).await.unwrap().unwrap();
        assert_eq!(record.kind, OperationKind::Error);
        assert_eq!(record.provider, "ProviderA");
        assert_eq!(record.amount, 10000);
        assert_eq!(
            record.message.as_deref(),
            Some("invalid card for this provider")
        );
        assert!(keys_with_prefix(&store, "auth_pa").await.is_empty());
    }

    #[tokio::test]
    async fn test_provider_switch_reroutes_rejected_card() {
        let config = OrchestratorConfig {
            provider_switch: true,
            ..OrchestratorConfig::default()
        };
        let (orchestrator, _) = orchestrator_with(config, FixedRandom::ALWAYS_SUCCEED);
        let token = orchestrator
            .authorize(payment("5111111111111111"))
            .await
            .unwrap();
        assert!(token.starts_with("pb"));
    }

    #[tokio::test]
    async fn test_full_lifecycle_is_idempotent() {
        let (orchestrator, store) = orchestrator();
        let token = orchestrator
            .authorize(payment("4111111111111111"))
            .await
            .unwrap();
        assert_eq!(
            orchestrator.transaction_state(&token).await.unwrap(),
            TransactionState::Authorized
        );

        let transaction_id = orchestrator.capture(capture(&token)).await.unwrap();
        assert!(transaction_id.starts_with("txa"));
        assert_eq!(
            orchestrator.capture(capture(&token)).await.unwrap(),
            transaction_id
        );
        assert_eq!(
            orchestrator.transaction_state(&token).await.unwrap(),
            TransactionState::Captured
        );

        let refund_id = orchestrator.refund(refund(&transaction_id)).await.unwrap();
        assert!(refund_id.starts_with("rfa"));
        assert_eq!(
            orchestrator.refund(refund(&transaction_id)).await.unwrap(),
            refund_id
        );
        assert_eq!(
            orchestrator.transaction_state(&token).await.unwrap(),
            TransactionState::Refunded
        );

        assert_eq!(keys_with_prefix(&store, "capture_txa").await.len(), 1);
        assert_eq!(keys_with_prefix(&store, "refund_rfa").await.len(), 1);
        let alias = store
            .get(&keys::lookup(Phase::Capture, &token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alias.kind, OperationKind::LookupAlias);
        assert_eq!(
            alias.related_key,
            Some(keys::capture(&transaction_id))
        );
    }

    #[tokio::test]
    async fn test_capture_without_authorization() {
        let (orchestrator, store) = orchestrator();
        let err = orchestrator
            .capture(capture("nonexistent_auth"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::AuthorizationNotFound { .. }));
        assert_eq!(err.to_string(), "Capture failed: Authorization not found.");

        let errors = keys_with_prefix(&store, "capture_error_").await;
        assert_eq!(errors.len(), 1);
        let record = store.get(&errors[0]).await.unwrap().unwrap();
        assert_eq!(record.provider, UNKNOWN_PROVIDER);
    }

    #[tokio::test]
    async fn test_refund_before_capture() {
        let (orchestrator, store) = orchestrator();
        let err = orchestrator.refund(refund("txa_missing")).await.unwrap_err();
        assert!(matches!(err, PaymentError::CaptureNotFound { .. }));
        assert_eq!(keys_with_prefix(&store, "refund_error_").await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_capture_can_be_retried() {
        let store = InMemoryOperationStore::new();
        let failing = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Gateways::simulated(Arc::new(FixedRandom::ALWAYS_FAIL)),
            OrchestratorConfig::default(),
        );
        let token = failing
            .authorize(payment("4111111111111111"))
            .await
            .unwrap();
        let err = failing.capture(capture(&token)).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::PaymentFailure {
                phase: Phase::Capture,
                ..
            }
        ));
        assert_eq!(
            failing.transaction_state(&token).await.unwrap(),
            TransactionState::Authorized
        );

        let healthy = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Gateways::simulated(Arc::new(FixedRandom::ALWAYS_SUCCEED)),
            OrchestratorConfig::default(),
        );
        let transaction_id = healthy.capture(capture(&token)).await.unwrap();
        assert!(transaction_id.starts_with("txa"));
    }

    #[tokio::test]
    async fn test_unknown_stored_provider() {
        let (orchestrator, store) = orchestrator();
        let key = keys::authorization("pz1");
        store
            .save(
                &key,
                OperationRecord::new(
                    &key,
                    OperationKind::Authorization,
                    "ProviderZ",
                    Amount::new(1).unwrap(),
                ),
                60,
            )
            .await
            .unwrap();

        let err = orchestrator.capture(capture("pz1")).await.unwrap_err();
        assert!(matches!(err, PaymentError::UnknownProvider(name) if name == "ProviderZ"));
        assert_eq!(keys_with_prefix(&store, "capture_error_").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_authorization_is_forgotten() {
        let config = OrchestratorConfig {
            operation_ttl: 30,
            ..OrchestratorConfig::default()
        };
        let (orchestrator, _) = orchestrator_with(config, FixedRandom::ALWAYS_SUCCEED);
        let token = orchestrator
            .authorize(payment("4111111111111111"))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let err = orchestrator.capture(capture(&token)).await.unwrap_err();
        assert!(matches!(err, PaymentError::AuthorizationNotFound { .. }));
        assert_eq!(
            orchestrator.transaction_state(&token).await.unwrap(),
            TransactionState::Unauthorized
        );
    }
}
