//! Application layer containing the payment orchestration.
//!
//! `PaymentOrchestrator` is the entry point for authorize, capture and refund.
//! It owns a `ProviderSelector`, which spreads new authorizations over the
//! providers, and persists every outcome through the `OperationStore` port.

pub mod orchestrator;
pub mod selector;
