//! Domain model: operation records, payment inputs and outcomes, and the
//! ports the application layer depends on.

pub mod gateway;
pub mod operation;
pub mod payment;
pub mod ports;
pub mod provider;
pub mod random;
