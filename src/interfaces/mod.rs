//! Boundary adapters: request validation, the JSON request handler and the
//! CSV batch mode.

pub mod csv;
pub mod handler;
pub mod validation;
