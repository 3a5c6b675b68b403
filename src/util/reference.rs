use std::collections::HashSet;

use k8s_openapi::api::core::v1::{ObjectReference, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::GroupVersionKind;
use kube::{Resource, ResourceExt};

use crate::api::v1::workload::Workload;
use crate::util::errors::StdError;

/// Known API identities for the types this operator reads and writes.
///
/// Built once at startup and shared through the reconciler context; references and
/// owner references can only be made for kinds registered here.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    kinds: HashSet<GroupVersionKind>,
}

impl TypeRegistry {
    /// Registry with every kind the workload controller touches
    pub fn new() -> Self {
        Self::default().register::<Workload>().register::<ServiceAccount>()
    }

    pub fn register<K: Resource<DynamicType = ()>>(mut self) -> Self {
        self.kinds.insert(gvk::<K>());
        self
    }

    pub fn is_registered<K: Resource<DynamicType = ()>>(&self) -> bool {
        self.kinds.contains(&gvk::<K>())
    }

    fn ensure_registered<K: Resource<DynamicType = ()>>(&self) -> Result<(), StdError> {
        if self.is_registered::<K>() {
            Ok(())
        } else {
            Err(StdError::UnregisteredKind(format!(
                "{}/{}",
                K::api_version(&()),
                K::kind(&())
            )))
        }
    }

    /// Lightweight reference to `obj` suitable for embedding in another object's status
    pub fn resolve<K: Resource<DynamicType = ()>>(&self, obj: &K) -> Result<ObjectReference, StdError> {
        self.ensure_registered::<K>()?;
        let meta = obj.meta();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| StdError::MetadataMissing(format!("{} has no name", K::kind(&()))))?;

        Ok(ObjectReference {
            api_version: Some(K::api_version(&()).into_owned()),
            kind: Some(K::kind(&()).into_owned()),
            name: Some(name),
            namespace: meta.namespace.clone(),
            uid: meta.uid.clone(),
            resource_version: meta.resource_version.clone(),
            field_path: None,
        })
    }

    /// Owner reference marking `owner` as the managing controller of a dependent object
    pub fn controller_owner_ref<K: Resource<DynamicType = ()>>(
        &self,
        owner: &K,
    ) -> Result<OwnerReference, StdError> {
        self.ensure_registered::<K>()?;
        owner.controller_owner_ref(&()).ok_or_else(|| {
            StdError::OwnerReference(format!(
                "{} {} is missing a name or uid",
                K::kind(&()),
                owner.name_any()
            ))
        })
    }
}

fn gvk<K: Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}
