/// Custom resource definitions
pub mod api;
pub use api::v1::workload::{Workload, WorkloadSpec, WorkloadStatus};

/// Expose all controller components used by main
pub mod controllers;
pub use controllers::{run, State};

/// Errors, metrics, configuration and other shared plumbing
pub mod util;
pub use util::errors::{Error, Result, StdError};
