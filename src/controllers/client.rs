//! Cluster access used by the workload reconciler.
//!
//! The reconciler only talks to the API server through [`WorkloadClient`], so tests
//! can swap the real client for a mock.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

use crate::api::v1::workload::Workload;
use crate::util::errors::StdError;

/// Field manager identity used for every server-side apply issued by this controller
pub const FIELD_MANAGER: &str = "workload-controller";

pub type ClientResult<T> = std::result::Result<T, StdError>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkloadClient: Send + Sync {
    /// Get a Workload by namespace and name, `None` when it does not exist
    async fn get_workload(&self, namespace: &str, name: &str) -> ClientResult<Option<Workload>>;

    /// Server-side apply a ServiceAccount, forcing ownership of conflicting fields
    async fn apply_service_account(&self, service_account: &ServiceAccount) -> ClientResult<ServiceAccount>;

    /// Replace the status subresource of a Workload.
    ///
    /// The write carries the workload's resourceVersion, so a stale copy fails with a conflict.
    async fn replace_workload_status(&self, workload: &Workload) -> ClientResult<Workload>;
}

/// Real Kubernetes client implementation
#[derive(Clone)]
pub struct KubeWorkloadClient {
    client: Client,
}

impl KubeWorkloadClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn namespace_of<K: ResourceExt>(obj: &K) -> ClientResult<String> {
    obj.namespace()
        .ok_or_else(|| StdError::MetadataMissing(format!("namespace of {}", obj.name_any())))
}

#[async_trait]
impl WorkloadClient for KubeWorkloadClient {
    async fn get_workload(&self, namespace: &str, name: &str) -> ClientResult<Option<Workload>> {
        let api: Api<Workload> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await.map_err(StdError::KubeError)
    }

    async fn apply_service_account(&self, service_account: &ServiceAccount) -> ClientResult<ServiceAccount> {
        let namespace = namespace_of(service_account)?;
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), &namespace);

        api.patch(
            &service_account.name_any(),
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(service_account),
        )
        .await
        .map_err(StdError::KubeError)
    }

    async fn replace_workload_status(&self, workload: &Workload) -> ClientResult<Workload> {
        let namespace = namespace_of(workload)?;
        let api: Api<Workload> = Api::namespaced(self.client.clone(), &namespace);
        let data = serde_json::to_vec(workload).map_err(StdError::JsonSerializationError)?;

        api.replace_status(&workload.name_any(), &PostParams::default(), data)
            .await
            .map_err(StdError::KubeError)
    }
}
