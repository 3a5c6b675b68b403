pub mod config;
pub mod errors;
pub mod metrics;
pub mod reference;
pub mod status;
pub mod telemetry;

pub use errors::*;
