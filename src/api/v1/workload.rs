use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::v1::{conditions_schema, object_reference_schema};

/// Generate the Kubernetes wrapper struct `Workload` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen.rs)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(kind = "Workload", group = "platform.mydev.org", version = "v1", namespaced)]
#[kube(status = "WorkloadStatus", shortname = "wl")]
#[kube(
    printcolumn = r#"{"name":"ServiceAccount","type":"string","jsonPath":".status.serviceAccountRef.name"}"#,
    printcolumn = r#"{"name":"Available","type":"string","jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    /// Name of the ServiceAccount managed for this workload.
    /// Defaults to the name of the workload itself.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// The status object of `Workload`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    /// Reference to the ServiceAccount owned by this workload
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "object_reference_schema")]
    pub service_account_ref: Option<ObjectReference>,

    #[serde(default)]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,
}

impl Workload {
    pub fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map_or(&[], |s| s.conditions.as_slice())
    }
}
