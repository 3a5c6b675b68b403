use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{LocalObjectReference, ServiceAccount};
use kube::api::ObjectMeta;
use kube::ResourceExt;

use crate::api::v1::workload::Workload;
use crate::controllers::client::FIELD_MANAGER;
use crate::util::errors::StdError;
use crate::util::reference::TypeRegistry;

/// Image pull secret attached to every managed ServiceAccount
pub const IMAGE_PULL_SECRET: &str = "imagepullsecret-patcher";

/// Name of the ServiceAccount owned by `workload`
pub fn service_account_name(workload: &Workload) -> String {
    match workload.spec.service_account_name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => workload.name_any(),
    }
}

/// Desired state of the ServiceAccount owned by `workload`.
///
/// The controller owner reference lets the garbage collector remove the ServiceAccount
/// with its Workload and lets the controller map ServiceAccount events back to the owner.
pub fn build_service_account(workload: &Workload, registry: &TypeRegistry) -> Result<ServiceAccount, StdError> {
    let namespace = workload
        .namespace()
        .ok_or_else(|| StdError::MetadataMissing(format!("namespace of workload {}", workload.name_any())))?;
    let owner = registry.controller_owner_ref(workload)?;

    let labels = BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), workload.name_any()),
        ("app.kubernetes.io/managed-by".to_string(), FIELD_MANAGER.to_string()),
    ]);

    Ok(ServiceAccount {
        metadata: ObjectMeta {
            name: Some(service_account_name(workload)),
            namespace: Some(namespace),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        image_pull_secrets: Some(vec![LocalObjectReference {
            name: IMAGE_PULL_SECRET.to_string(),
        }]),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_include;
    use serde_json::json;

    use super::*;
    use crate::api::v1::workload::WorkloadSpec;

    fn workload(name: &str, spec: WorkloadSpec) -> Workload {
        let mut workload = Workload::new(name, spec);
        workload.metadata.namespace = Some("ns1".to_string());
        workload.metadata.uid = Some("wl-uid".to_string());
        workload
    }

    #[test]
    fn builds_owned_service_account_named_after_workload() {
        let sa = build_service_account(&workload("web", WorkloadSpec::default()), &TypeRegistry::new()).unwrap();

        assert_eq!(sa.metadata.name.as_deref(), Some("web"));
        assert_eq!(sa.metadata.namespace.as_deref(), Some("ns1"));

        let owners = sa.metadata.owner_references.as_ref().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "Workload");
        assert_eq!(owners[0].name, "web");
        assert_eq!(owners[0].uid, "wl-uid");
        assert_eq!(owners[0].controller, Some(true));

        assert_json_include!(
            actual: serde_json::to_value(&sa).unwrap(),
            expected: json!({
                "apiVersion": "v1",
                "kind": "ServiceAccount",
                "imagePullSecrets": [{"name": "imagepullsecret-patcher"}],
                "metadata": {
                    "labels": {"app.kubernetes.io/managed-by": "workload-controller"}
                }
            })
        );
    }

    #[test]
    fn override_name_is_honored() {
        let spec = WorkloadSpec {
            service_account_name: Some("custom-sa".to_string()),
        };
        let sa = build_service_account(&workload("web", spec), &TypeRegistry::new()).unwrap();
        assert_eq!(sa.metadata.name.as_deref(), Some("custom-sa"));
        assert_eq!(sa.metadata.owner_references.unwrap()[0].name, "web");
    }

    #[test]
    fn empty_override_falls_back_to_workload_name() {
        let spec = WorkloadSpec {
            service_account_name: Some(String::new()),
        };
        assert_eq!(service_account_name(&workload("web", spec)), "web");
    }

    #[test]
    fn build_is_deterministic() {
        let wl = workload("web", WorkloadSpec::default());
        let registry = TypeRegistry::new();
        assert_eq!(
            build_service_account(&wl, &registry).unwrap(),
            build_service_account(&wl, &registry).unwrap()
        );
    }

    #[test]
    fn fails_without_owner_identity() {
        let mut wl = workload("web", WorkloadSpec::default());
        wl.metadata.uid = None;
        let err = build_service_account(&wl, &TypeRegistry::new()).unwrap_err();
        assert!(matches!(err, StdError::OwnerReference(_)));
    }

    #[test]
    fn fails_when_workload_kind_is_unregistered() {
        let wl = workload("web", WorkloadSpec::default());
        let err = build_service_account(&wl, &TypeRegistry::default()).unwrap_err();
        assert!(matches!(err, StdError::UnregisteredKind(_)));
    }
}
