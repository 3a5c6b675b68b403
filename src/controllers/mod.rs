/// Cluster access used by the reconciler
pub mod client;

/// Desired state of the owned ServiceAccount
pub mod service_account;

/// Reconciliation of a single Workload
pub mod workload;

/// Controller runtime wiring
pub mod workload_controller;
pub use workload_controller::{run, State};
