//! HTTP boundary for the intake engines.
//!
//! JSON over axum; field names are camelCase. Client mistakes map to 4xx and
//! only infrastructure faults to 5xx.

mod handlers;
mod rest;

pub use handlers::*;
pub use rest::*;
