//! Configuration loading for the intake server.

mod settings;

pub use settings::*;
