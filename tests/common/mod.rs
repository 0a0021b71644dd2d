#![allow(dead_code)]

use async_trait::async_trait;
use payflow::application::orchestrator::PaymentOrchestrator;
use payflow::application::selector::Gateways;
use payflow::config::OrchestratorConfig;
use payflow::domain::gateway::ProviderGateway;
use payflow::domain::operation::OperationRecord;
use payflow::domain::payment::{
    Amount, AuthorizationOutcome, CaptureData, CaptureOutcome, PaymentData, RefundData,
    RefundOutcome,
};
use payflow::domain::ports::OperationStore;
use payflow::domain::provider::ProviderName;
use payflow::error::{PaymentError, ProviderFailure, Result};
use payflow::infrastructure::in_memory::InMemoryOperationStore;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const VISA: &str = "4111111111111111";
pub const MASTERCARD: &str = "5555555555554444";

pub fn payment(card_number: &str, amount: i64) -> PaymentData {
    PaymentData {
        card_number: card_number.to_string(),
        expiry_date: "12/30".to_string(),
        cvv: "123".to_string(),
        amount: Amount::new(amount).unwrap(),
    }
}

pub fn capture(auth_token: &str, amount: i64) -> CaptureData {
    CaptureData {
        auth_token: auth_token.to_string(),
        amount: Amount::new(amount).unwrap(),
    }
}

pub fn refund(transaction_id: &str, amount: i64) -> RefundData {
    RefundData {
        transaction_id: transaction_id.to_string(),
        amount: Amount::new(amount).unwrap(),
    }
}

/// A provider whose failures and latency are set by the test, counting every
/// call it receives.
pub struct ScriptedGateway {
    name: ProviderName,
    accepted_prefix: Option<char>,
    delay: Option<Duration>,
    issued: AtomicUsize,
    authorize_failures: AtomicUsize,
    capture_failures: AtomicUsize,
    refund_failures: AtomicUsize,
    pub authorize_calls: AtomicUsize,
    pub capture_calls: AtomicUsize,
    pub refund_calls: AtomicUsize,
}

pub const SCRIPTED_FAILURE: &str = "scripted failure";

impl ScriptedGateway {
    pub fn new(name: ProviderName) -> Self {
        Self {
            name,
            accepted_prefix: None,
            delay: None,
            issued: AtomicUsize::new(0),
            authorize_failures: AtomicUsize::new(0),
            capture_failures: AtomicUsize::new(0),
            refund_failures: AtomicUsize::new(0),
            authorize_calls: AtomicUsize::new(0),
            capture_calls: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
        }
    }

    /// Only cards starting with `prefix` are accepted.
    pub fn accepting(mut self, prefix: char) -> Self {
        self.accepted_prefix = Some(prefix);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_next_authorizations(&self, count: usize) {
        self.authorize_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_captures(&self, count: usize) {
        self.capture_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_refunds(&self, count: usize) {
        self.refund_failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn issue(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.issued.fetch_add(1, Ordering::SeqCst))
    }

    async fn step(&self, calls: &AtomicUsize, failures: &AtomicUsize) -> std::result::Result<(), ProviderFailure> {
        calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if scripted {
            Err(ProviderFailure::new(self.name.as_str(), SCRIPTED_FAILURE))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    fn name(&self) -> ProviderName {
        self.name
    }

    fn accepts(&self, payment: &PaymentData) -> bool {
        match self.accepted_prefix {
            Some(prefix) => payment.card_number.starts_with(prefix),
            None => true,
        }
    }

    async fn authorize(
        &self,
        payment: &PaymentData,
    ) -> std::result::Result<AuthorizationOutcome, ProviderFailure> {
        self.step(&self.authorize_calls, &self.authorize_failures)
            .await?;
        if !self.accepts(payment) {
            return Err(ProviderFailure::new(self.name.as_str(), "card rejected"));
        }
        Ok(AuthorizationOutcome {
            auth_token: self.issue(self.name.token_prefix()),
            provider: self.name,
            timestamp: 0,
        })
    }

    async fn capture(
        &self,
        _capture: &CaptureData,
    ) -> std::result::Result<CaptureOutcome, ProviderFailure> {
        self.step(&self.capture_calls, &self.capture_failures)
            .await?;
        Ok(CaptureOutcome {
            transaction_id: self.issue(self.name.transaction_prefix()),
            provider: self.name,
            timestamp: 0,
        })
    }

    async fn refund(
        &self,
        _refund: &RefundData,
    ) -> std::result::Result<RefundOutcome, ProviderFailure> {
        self.step(&self.refund_calls, &self.refund_failures)
            .await?;
        Ok(RefundOutcome {
            refund_id: self.issue(self.name.refund_prefix()),
            provider: self.name,
            timestamp: 0,
        })
    }
}

/// Two scripted providers, handed back so tests can inspect them.
pub struct Harness {
    pub orchestrator: PaymentOrchestrator,
    pub store: InMemoryOperationStore,
    pub provider_a: Arc<ScriptedGateway>,
    pub provider_b: Arc<ScriptedGateway>,
}

impl Harness {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_gateways(
            config,
            ScriptedGateway::new(ProviderName::ProviderA),
            ScriptedGateway::new(ProviderName::ProviderB),
        )
    }

    pub fn with_gateways(
        config: OrchestratorConfig,
        provider_a: ScriptedGateway,
        provider_b: ScriptedGateway,
    ) -> Self {
        let store = InMemoryOperationStore::new();
        let provider_a = Arc::new(provider_a);
        let provider_b = Arc::new(provider_b);
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Gateways::new(provider_a.clone(), provider_b.clone()),
            config,
        );
        Self {
            orchestrator,
            store,
            provider_a,
            provider_b,
        }
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.store
            .keys()
            .await
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect()
    }
}

/// An in-memory store that can be taken down, or made to refuse writes to
/// keys with a given prefix.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryOperationStore,
    down: AtomicBool,
    refused_prefix: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryOperationStore {
        &self.inner
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn refuse_writes_to(&self, prefix: &str) {
        *self.refused_prefix.lock().unwrap() = Some(prefix.to_string());
    }

    fn check(&self, key: &str, write: bool) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PaymentError::StorageUnavailable("store is down".to_string()));
        }
        let refused = self.refused_prefix.lock().unwrap();
        match refused.as_deref() {
            Some(prefix) if write && key.starts_with(prefix) => Err(
                PaymentError::StorageUnavailable(format!("writes to {prefix} refused")),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl OperationStore for FlakyStore {
    async fn save(&self, key: &str, record: OperationRecord, ttl_seconds: u64) -> Result<()> {
        self.check(key, true)?;
        self.inner.save(key, record, ttl_seconds).await
    }

    async fn save_if_absent(
        &self,
        key: &str,
        record: OperationRecord,
        ttl_seconds: u64,
    ) -> Result<bool> {
        self.check(key, true)?;
        self.inner.save_if_absent(key, record, ttl_seconds).await
    }

    async fn get(&self, key: &str) -> Result<Option<OperationRecord>> {
        self.check(key, false)?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check(key, true)?;
        self.inner.delete(key).await
    }

    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<u64> {
        self.check(key, true)?;
        self.inner.increment(key, ttl_seconds).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.check("", false)?;
        self.inner.purge_expired().await
    }
}
