use std::{borrow::Cow, time::Duration};

use capoci_core::{
    cloud::CloudError, defaults::NetworkValidationError, kubeconfig::KubeConfigError,
    kubernetes::patch::PatchError,
};
use thiserror::Error;

use crate::clients::ClientError;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Object is missing metadata!")]
    MissingObjectMetadata,
    #[error("'{}' resource is missing required data!", .0)]
    MissingObjectData(Cow<'static, str>),
    #[error("'{}' resource contains invalid data!", .0)]
    InvalidObjectData(Cow<'static, str>),
    #[error("Manager is misconfigured! Details: {}", .0)]
    Configuration(String),
    #[error("Couldn't {}! Reason: {}", .context, .source)]
    Cloud {
        context: Cow<'static, str>,
        #[source]
        source: CloudError,
    },
    #[error("Couldn't access the Kubernetes API! Reason: {}", .0)]
    Kube(#[source] kube::Error),
    #[error("Couldn't patch the resource! Reason: {}", .0)]
    Patch(#[source] PatchError),
    #[error("Couldn't prepare the kubeconfig! Reason: {}", .0)]
    Kubeconfig(#[source] KubeConfigError),
    #[error("Couldn't get the cloud clients! Reason: {}", .0)]
    Client(#[source] ClientError),
    #[error("Couldn't build the reconcile scope! Reason: {}", .0)]
    ScopeBuilder(String),
    #[error("{} '{}' isn't tagged as a resource of this cluster!", .kind, .id)]
    ForeignResource { kind: &'static str, id: String },
    #[error("Network topology is invalid! Details: {}", .0)]
    InvalidNetwork(#[source] NetworkValidationError),
    #[error("failed to reconcile {} for OCICluster {}/{}: {}", .component, .namespace, .name, .source)]
    Component {
        component: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: Box<ReconcilerError>,
    },
    #[error("failed to delete {} for OCICluster {}/{}: {}", .component, .namespace, .name, .source)]
    ComponentDeletion {
        component: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: Box<ReconcilerError>,
    },
    #[error("Work request '{}' doesn't reference exactly one cluster!", .0)]
    AmbiguousWorkRequest(String),
    #[error("Resource has an unexpected lifecycle state! Details: {}", .0)]
    UnexpectedLifecycleState(String),
    #[error("Reconciliation didn't finish within {:?}!", .0)]
    Cancelled(Duration),
}

impl ReconcilerError {
    /// Wraps a cloud error with a description of the failed operation, e.g. `list VCNs`.
    pub fn cloud(context: impl Into<Cow<'static, str>>) -> impl FnOnce(CloudError) -> Self {
        let context = context.into();

        move |source| ReconcilerError::Cloud { context, source }
    }
}

impl From<kube::Error> for ReconcilerError {
    fn from(value: kube::Error) -> Self {
        ReconcilerError::Kube(value)
    }
}

impl From<PatchError> for ReconcilerError {
    fn from(value: PatchError) -> Self {
        ReconcilerError::Patch(value)
    }
}
