//! Per pass state of a reconciled object.
//!
//! A scope owns the in-memory copy of the reconciled resource together with a snapshot of
//! what was last read from or written to the API server, only the difference is ever patched.

use capoci_core::kubernetes::patch::PatchHelper;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;

use crate::{
    error::ReconcilerError,
    store::{KubeStore, ObjectTarget},
};

pub mod accessor;
pub mod cluster;
pub mod control_plane;
pub mod machine_pool;

pub use accessor::ClusterAccessor;
pub use cluster::{ClusterScope, ClusterScopeBuilder};
pub use control_plane::{ControlPlaneScope, ControlPlaneScopeBuilder};
pub use machine_pool::{MachinePoolScope, MachinePoolScopeBuilder};

pub const CLUSTER_FINALIZER: &str = "ocicluster.infrastructure.cluster.x-k8s.io";
pub const MANAGED_CLUSTER_FINALIZER: &str = "ocimanagedcluster.infrastructure.cluster.x-k8s.io";
pub const CONTROL_PLANE_FINALIZER: &str =
    "ocimanagedcontrolplane.infrastructure.cluster.x-k8s.io";
pub const MACHINE_POOL_FINALIZER: &str = "ocimachinepool.infrastructure.cluster.x-k8s.io";

/// Adds `finalizer` unless present, returns whether the metadata changed.
pub fn add_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    let finalizers = meta.finalizers.get_or_insert_with(Vec::new);

    if finalizers.iter().any(|f| f == finalizer) {
        return false;
    }

    finalizers.push(finalizer.to_owned());

    true
}

pub fn remove_finalizer(meta: &mut ObjectMeta, finalizer: &str) {
    if let Some(finalizers) = meta.finalizers.as_mut() {
        finalizers.retain(|f| f != finalizer);
    }
}

/// Writes the changes of `resource` since the last snapshot and takes a new snapshot.
///
/// Status patches of objects that are already gone are ignored, removing the last finalizer
/// lets the API server delete the object before its status can be written.
pub(crate) async fn persist<K: Serialize>(
    store: &dyn KubeStore,
    helper: &mut PatchHelper<K>,
    resource: &K,
    target: ObjectTarget,
) -> Result<(), ReconcilerError> {
    let changes = helper.changes(resource)?;

    if let Some(patch) = changes.object {
        store.patch_object(target.clone(), patch).await?;
    }

    if let Some(patch) = changes.status {
        match store.patch_object_status(target, patch).await {
            Ok(()) => (),
            Err(kube::Error::Api(response)) if response.code == 404 => (),
            Err(error) => return Err(error.into()),
        }
    }

    helper.mark_persisted(resource)?;

    Ok(())
}

pub(crate) fn builder_error(error: impl std::fmt::Display) -> ReconcilerError {
    ReconcilerError::ScopeBuilder(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalizer_is_added_once() {
        let mut meta = ObjectMeta::default();

        assert!(add_finalizer(&mut meta, CLUSTER_FINALIZER));
        assert!(!add_finalizer(&mut meta, CLUSTER_FINALIZER));
        assert_eq!(meta.finalizers.as_ref().unwrap().len(), 1);

        remove_finalizer(&mut meta, CLUSTER_FINALIZER);
        assert!(meta.finalizers.unwrap().is_empty());
    }
}
