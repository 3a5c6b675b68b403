use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "platform-operator-system";
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_HEALTH_PROBE_BIND_ADDRESS: &str = "0.0.0.0:8081";
pub const DEFAULT_RESYNC_PERIOD_SECONDS: u64 = 3600;
pub const DEFAULT_READINESS_ENDPOINT_NAME: &str = "readyz";
pub const DEFAULT_LIVENESS_ENDPOINT_NAME: &str = "healthz";

const SERVICE_ACCOUNT_NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Bind address value that turns a server off
pub const DISABLED_BIND_ADDRESS: &str = "0";

/// Operator configuration, read from an optional YAML file.
///
/// Unknown keys are rejected so settings this operator does not implement fail at load time.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OperatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Namespace the operator is deployed in.
    /// Falls back to the pod's service account namespace, then to `platform-operator-system`.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Name of the cluster this operator is running on
    #[serde(default)]
    pub cluster_name: String,

    /// Only reconcile Workloads in this namespace; all namespaces when unset
    #[serde(default)]
    pub watch_namespace: Option<String>,

    #[serde(default)]
    pub metrics: ControllerMetrics,

    #[serde(default)]
    pub health: ControllerHealth,

    #[serde(default)]
    pub controller: ControllerSettings,

    #[serde(default)]
    pub logging: Logging,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ControllerMetrics {
    /// Address serving prometheus metrics, "0" disables it
    #[serde(default)]
    pub bind_address: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ControllerHealth {
    /// Address serving health probes, "0" disables it
    #[serde(default)]
    pub health_probe_bind_address: String,

    /// Path segment of the readiness probe
    #[serde(default)]
    pub readiness_endpoint_name: String,

    /// Path segment of the liveness probe
    #[serde(default)]
    pub liveness_endpoint_name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ControllerSettings {
    /// Maximum number of concurrent reconciliations, 0 means unbounded
    #[serde(default)]
    pub concurrency: u16,

    /// Seconds between full re-reconciles of an unchanged Workload
    #[serde(default)]
    pub resync_period_seconds: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Logging {
    /// Emit logs as JSON lines instead of the compact text format
    #[serde(default)]
    pub json: bool,
}

impl OperatorConfig {
    /// Load the configuration file at `path`, or the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::parse(&raw).with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };
        cfg.set_defaults(operator_namespace);
        Ok(cfg)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Fill in unset fields. `namespace` is only called when no namespace is configured.
    pub fn set_defaults(&mut self, namespace: impl FnOnce() -> String) {
        if self.namespace.as_deref().map_or(true, str::is_empty) {
            self.namespace = Some(namespace());
        }
        if self.metrics.bind_address.is_empty() {
            self.metrics.bind_address = DEFAULT_METRICS_BIND_ADDRESS.to_string();
        }
        if self.health.health_probe_bind_address.is_empty() {
            self.health.health_probe_bind_address = DEFAULT_HEALTH_PROBE_BIND_ADDRESS.to_string();
        }
        if self.health.readiness_endpoint_name.is_empty() {
            self.health.readiness_endpoint_name = DEFAULT_READINESS_ENDPOINT_NAME.to_string();
        }
        if self.health.liveness_endpoint_name.is_empty() {
            self.health.liveness_endpoint_name = DEFAULT_LIVENESS_ENDPOINT_NAME.to_string();
        }
        if self.controller.resync_period_seconds == 0 {
            self.controller.resync_period_seconds = DEFAULT_RESYNC_PERIOD_SECONDS;
        }
    }

    pub fn metrics_address(&self) -> Option<&str> {
        enabled(&self.metrics.bind_address)
    }

    pub fn health_probe_address(&self) -> Option<&str> {
        enabled(&self.health.health_probe_bind_address)
    }

    pub fn readiness_path(&self) -> String {
        endpoint_path(&self.health.readiness_endpoint_name)
    }

    pub fn liveness_path(&self) -> String {
        endpoint_path(&self.health.liveness_endpoint_name)
    }
}

fn enabled(address: &str) -> Option<&str> {
    if address.is_empty() || address == DISABLED_BIND_ADDRESS {
        None
    } else {
        Some(address)
    }
}

fn endpoint_path(name: &str) -> String {
    format!("/{}", name.trim_start_matches('/'))
}

fn operator_namespace() -> String {
    fs::read_to_string(SERVICE_ACCOUNT_NAMESPACE_FILE)
        .ok()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_unset_field() {
        let mut cfg = OperatorConfig::parse("").unwrap();
        cfg.set_defaults(|| DEFAULT_NAMESPACE.to_string());

        assert_eq!(cfg.namespace.as_deref(), Some(DEFAULT_NAMESPACE));
        assert_eq!(cfg.metrics_address(), Some(DEFAULT_METRICS_BIND_ADDRESS));
        assert_eq!(cfg.health_probe_address(), Some(DEFAULT_HEALTH_PROBE_BIND_ADDRESS));
        assert_eq!(cfg.controller.concurrency, 0);
        assert_eq!(cfg.controller.resync_period_seconds, DEFAULT_RESYNC_PERIOD_SECONDS);
        assert!(cfg.watch_namespace.is_none());
        assert!(!cfg.logging.json);
        assert_eq!(cfg.readiness_path(), "/readyz");
        assert_eq!(cfg.liveness_path(), "/healthz");
    }

    #[test]
    fn file_values_win_over_defaults() {
        let raw = r#"
namespace: ops
clusterName: prod-eu
watchNamespace: team-a
metrics:
  bindAddress: "0"
health:
  healthProbeBindAddress: 127.0.0.1:9000
  readinessEndpointName: ready
  livenessEndpointName: /alive
controller:
  concurrency: 4
  resyncPeriodSeconds: 60
logging:
  json: true
"#;
        let mut cfg = OperatorConfig::parse(raw).unwrap();
        cfg.set_defaults(|| panic!("namespace is configured"));

        assert_eq!(cfg.namespace.as_deref(), Some("ops"));
        assert_eq!(cfg.cluster_name, "prod-eu");
        assert_eq!(cfg.watch_namespace.as_deref(), Some("team-a"));
        assert_eq!(cfg.metrics_address(), None);
        assert_eq!(cfg.health_probe_address(), Some("127.0.0.1:9000"));
        assert_eq!(cfg.readiness_path(), "/ready");
        assert_eq!(cfg.liveness_path(), "/alive");
        assert_eq!(cfg.controller.concurrency, 4);
        assert_eq!(cfg.controller.resync_period_seconds, 60);
        assert!(cfg.logging.json);
    }

    #[test]
    fn unknown_shape_is_rejected() {
        assert!(OperatorConfig::parse("controller: [1, 2]").is_err());
    }

    #[test]
    fn unsupported_settings_fail_to_load() {
        let raw = r#"
apiVersion: config.platform.mydev.org/v1alpha1
kind: OperatorConfig
clientConnection:
  qps: 50
  burst: 100
"#;
        let err = OperatorConfig::parse(raw).unwrap_err();
        assert!(err.to_string().contains("clientConnection"), "{err}");

        let raw = "health:
  readinessEndpoint: ready
";
        assert!(OperatorConfig::parse(raw).is_err());
    }

    #[test]
    fn type_meta_is_accepted() {
        let raw = r#"
apiVersion: config.platform.mydev.org/v1alpha1
kind: OperatorConfig
clusterName: prod-eu
"#;
        let cfg = OperatorConfig::parse(raw).unwrap();
        assert_eq!(cfg.kind.as_deref(), Some("OperatorConfig"));
        assert_eq!(cfg.cluster_name, "prod-eu");
    }
}
