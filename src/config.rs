//! Orchestrator settings and their command-line / environment binding.

use crate::domain::operation::{COUNTER_TTL, DEFAULT_OPERATION_TTL};
use crate::domain::random::{FixedRandom, RandomSource, SeededRandom, ThreadRandom};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

/// Weighted rotation over a fixed window of requests.
///
/// Counter values whose position in the window is below `first_share` go to
/// the first provider, the rest to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub window: u64,
    pub first_share: u64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            window: 10,
            first_share: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// TTL for phase, error and alias records, in seconds.
    pub operation_ttl: u64,
    /// TTL for the load balancer counter, in seconds.
    pub counter_ttl: u64,
    pub selection: SelectionPolicy,
    /// Re-route an authorization to the other provider when the selected one
    /// would reject the card.
    pub provider_switch: bool,
    /// Upper bound on a single provider call.
    pub provider_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            operation_ttl: DEFAULT_OPERATION_TTL,
            counter_ttl: COUNTER_TTL,
            selection: SelectionPolicy::default(),
            provider_switch: false,
            provider_timeout: None,
        }
    }
}

/// Command-line flags, each overridable through the environment.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Seconds operation records are retained.
    #[arg(long, env = "PAYFLOW_OPERATION_TTL", global = true, default_value_t = DEFAULT_OPERATION_TTL)]
    pub operation_ttl: u64,

    /// Seconds the load balancer counter is retained.
    #[arg(long, env = "PAYFLOW_COUNTER_TTL", global = true, default_value_t = COUNTER_TTL)]
    pub counter_ttl: u64,

    /// Switch to the other provider when the selected one rejects the card.
    #[arg(long, env = "PAYFLOW_PROVIDER_SWITCH", global = true)]
    pub provider_switch: bool,

    /// Abort provider calls taking longer than this many milliseconds.
    #[arg(long, env = "PAYFLOW_PROVIDER_TIMEOUT_MS", global = true)]
    pub provider_timeout_ms: Option<u64>,

    /// Disable simulated provider failures.
    #[arg(long, env = "PAYFLOW_NO_FAILURE_INJECTION", global = true)]
    pub no_failure_injection: bool,

    /// Seed for simulated provider failures.
    #[arg(long, env = "PAYFLOW_SEED", global = true, conflicts_with = "no_failure_injection")]
    pub seed: Option<u64>,
}

impl Settings {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            operation_ttl: self.operation_ttl,
            counter_ttl: self.counter_ttl,
            selection: SelectionPolicy::default(),
            provider_switch: self.provider_switch,
            provider_timeout: self.provider_timeout_ms.map(Duration::from_millis),
        }
    }

    /// The randomness the simulated providers should draw from.
    pub fn random_source(&self) -> Arc<dyn RandomSource> {
        if self.no_failure_injection {
            Arc::new(FixedRandom::ALWAYS_SUCCEED)
        } else if let Some(seed) = self.seed {
            Arc::new(SeededRandom::new(seed))
        } else {
            Arc::new(ThreadRandom)
        }
    }
}
