use crate::config::SelectionPolicy;
use crate::domain::gateway::GatewayRef;
use crate::domain::operation::keys;
use crate::domain::ports::SharedOperationStore;
use crate::domain::provider::ProviderName;
use crate::domain::random::RandomSource;
use crate::error::Result;
use crate::infrastructure::providers::{ProviderAGateway, ProviderBGateway};
use std::sync::Arc;
use tracing::debug;

/// One gateway per [`ProviderName`].
#[derive(Clone)]
pub struct Gateways {
    provider_a: GatewayRef,
    provider_b: GatewayRef,
}

impl Gateways {
    pub fn new(provider_a: GatewayRef, provider_b: GatewayRef) -> Self {
        Self {
            provider_a,
            provider_b,
        }
    }

    /// The simulated providers, both drawing from `random`.
    pub fn simulated(random: Arc<dyn RandomSource>) -> Self {
        Self::new(
            Arc::new(ProviderAGateway::new(random.clone())),
            Arc::new(ProviderBGateway::new(random)),
        )
    }

    pub fn get(&self, name: ProviderName) -> GatewayRef {
        match name {
            ProviderName::ProviderA => self.provider_a.clone(),
            ProviderName::ProviderB => self.provider_b.clone(),
        }
    }
}

/// Chooses the provider for new authorizations and resolves the provider of
/// earlier phases.
///
/// Selection is a deterministic weighted rotation driven by a counter held in
/// the operation store, so the sequence of choices can be audited and replayed.
pub struct ProviderSelector {
    store: SharedOperationStore,
    gateways: Gateways,
    policy: SelectionPolicy,
    counter_ttl: u64,
}

impl ProviderSelector {
    /// Creates a new `ProviderSelector`.
    ///
    /// # Arguments
    ///
    /// * `store` - Holds the rotation counter.
    /// * `gateways` - The gateway behind each provider name.
    /// * `policy` - Window and share of the weighted rotation.
    /// * `counter_ttl` - Seconds the counter survives without traffic.
    pub fn new(
        store: SharedOperationStore,
        gateways: Gateways,
        policy: SelectionPolicy,
        counter_ttl: u64,
    ) -> Self {
        Self {
            store,
            gateways,
            policy,
            counter_ttl,
        }
    }

    /// Picks the provider for the next authorization and advances the counter.
    pub async fn select_for_new_authorization(&self) -> Result<ProviderName> {
        let counter = self
            .store
            .increment(keys::LOAD_BALANCER_COUNTER, self.counter_ttl)
            .await?;
        let provider = self.pick(counter);
        debug!(counter, provider = %provider, "Provider selected");
        Ok(provider)
    }

    /// The provider a given counter value maps to.
    pub fn pick(&self, counter: u64) -> ProviderName {
        if counter % self.policy.window.max(1) < self.policy.first_share {
            ProviderName::ProviderA
        } else {
            ProviderName::ProviderB
        }
    }

    /// Resolves a provider name read back from a stored record.
    pub fn resolve_by_name(&self, name: &str) -> Result<GatewayRef> {
        let provider: ProviderName = name.parse()?;
        Ok(self.gateways.get(provider))
    }

    pub fn gateway(&self, name: ProviderName) -> GatewayRef {
        self.gateways.get(name)
    }
}
