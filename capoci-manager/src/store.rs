//! Access to the Kubernetes objects the reconcilers read and write.

use async_trait::async_trait;
use capoci_core::resources::crd::{
    capi::{Cluster, MachinePool},
    v1beta1::{
        cluster::OCICluster, managed_cluster::OCIManagedCluster,
        managed_control_plane::OCIManagedControlPlane,
    },
};
use k8s_openapi::{
    api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta,
    NamespaceResourceScope,
};
use kube::{
    api::{ApiResource, DynamicObject, Patch, PatchParams, PostParams},
    Api, Client, Resource,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// namespaced object a merge patch is sent to
#[derive(Clone, Debug)]
pub struct ObjectTarget {
    pub resource: ApiResource,
    pub namespace: String,
    pub name: String,
}

impl ObjectTarget {
    pub fn of<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> Self {
        Self {
            resource: ApiResource::erase::<K>(&()),
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        }
    }
}

#[async_trait]
pub trait KubeStore: Send + Sync {
    async fn get_cluster(&self, namespace: &str, name: &str)
        -> Result<Option<Cluster>, kube::Error>;
    async fn get_machine_pool(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MachinePool>, kube::Error>;
    async fn get_managed_control_plane(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<OCIManagedControlPlane>, kube::Error>;
    async fn get_managed_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<OCIManagedCluster>, kube::Error>;
    async fn get_oci_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<OCICluster>, kube::Error>;

    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<Option<Secret>, kube::Error>;
    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, kube::Error>;
    async fn replace_secret(
        &self,
        namespace: &str,
        name: &str,
        secret: Secret,
    ) -> Result<Secret, kube::Error>;

    /// JSON merge patch of metadata and spec
    async fn patch_object(&self, target: ObjectTarget, patch: Value) -> Result<(), kube::Error>;
    /// JSON merge patch of the status subresource
    async fn patch_object_status(
        &self,
        target: ObjectTarget,
        patch: Value,
    ) -> Result<(), kube::Error>;
}

#[derive(Clone)]
pub struct KubeClientStore {
    client: Client,
}

impl KubeClientStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_namespaced<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + std::fmt::Debug,
    {
        Api::<K>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
    }

    fn dynamic_api(&self, target: &ObjectTarget) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &target.namespace, &target.resource)
    }
}

#[async_trait]
impl KubeStore for KubeClientStore {
    async fn get_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Cluster>, kube::Error> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_machine_pool(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MachinePool>, kube::Error> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_managed_control_plane(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<OCIManagedControlPlane>, kube::Error> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_managed_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<OCIManagedCluster>, kube::Error> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_oci_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<OCICluster>, kube::Error> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, kube::Error> {
        self.get_namespaced(namespace, name).await
    }

    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, kube::Error> {
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .create(&PostParams::default(), &secret)
            .await
    }

    async fn replace_secret(
        &self,
        namespace: &str,
        name: &str,
        secret: Secret,
    ) -> Result<Secret, kube::Error> {
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .replace(name, &PostParams::default(), &secret)
            .await
    }

    async fn patch_object(&self, target: ObjectTarget, patch: Value) -> Result<(), kube::Error> {
        self.dynamic_api(&target)
            .patch(&target.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        Ok(())
    }

    async fn patch_object_status(
        &self,
        target: ObjectTarget,
        patch: Value,
    ) -> Result<(), kube::Error> {
        self.dynamic_api(&target)
            .patch_status(&target.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        Ok(())
    }
}

/// Name and namespace of an owner reference of `kind` in the `group` API group.
pub fn find_owner(meta: &ObjectMeta, kind: &str, group: &str) -> Option<(String, String)> {
    let namespace = meta.namespace.clone()?;

    meta.owner_references
        .as_ref()?
        .iter()
        .find(|owner| {
            owner.kind == kind
                && owner.api_version.split_once('/').map(|(g, _)| g) == Some(group)
        })
        .map(|owner| (namespace, owner.name.clone()))
}
