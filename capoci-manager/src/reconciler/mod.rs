use std::future::Future;

use capoci_core::{
    cloud::{find_owned, optional, CloudResult, Tagged},
    tags::is_created_by_cluster_api,
};
use log::warn;

use crate::error::ReconcilerError;

pub mod control_plane;
pub mod failure_domain;
pub mod load_balancer;
pub mod machine_pool;
pub mod network;

/// Outcome of looking up the cloud resource a step works on.
#[derive(Debug, PartialEq)]
pub enum Lookup<T> {
    Owned(T),
    /// the stored id points to a resource without the provenance tags of the cluster
    Foreign(String),
    Missing,
}

impl<T> Lookup<T> {
    /// Resource to reconcile, a foreign one is an error.
    pub fn owned(self, kind: &'static str) -> Result<Option<T>, ReconcilerError> {
        match self {
            Lookup::Owned(resource) => Ok(Some(resource)),
            Lookup::Foreign(id) => Err(ReconcilerError::ForeignResource { kind, id }),
            Lookup::Missing => Ok(None),
        }
    }

    /// Resource to delete, foreign ones are left alone.
    pub fn deletable(self, kind: &'static str) -> Option<T> {
        match self {
            Lookup::Owned(resource) => Some(resource),
            Lookup::Foreign(id) => {
                warn!("Not deleting {kind} '{id}', it isn't tagged as a resource of this cluster!");
                None
            }
            Lookup::Missing => None,
        }
    }
}

/// Finds a resource by its stored id, falling back to the owned resource named `display_name`.
///
/// A stored id that no longer resolves is treated like an unset one.
pub async fn lookup<T, G, L, LF>(
    kind: &'static str,
    resource_identifier: &str,
    display_name: &str,
    by_id: Option<G>,
    by_name: L,
) -> Result<Lookup<T>, ReconcilerError>
where
    T: Tagged,
    G: Future<Output = CloudResult<T>>,
    L: FnOnce() -> LF,
    LF: Future<Output = CloudResult<Vec<T>>>,
{
    if let Some(get) = by_id {
        let found = optional(get.await).map_err(ReconcilerError::cloud(format!("get {kind}")))?;

        if let Some(resource) = found {
            if is_created_by_cluster_api(resource_identifier, resource.freeform_tags()) {
                return Ok(Lookup::Owned(resource));
            }

            return Ok(Lookup::Foreign(resource.id().to_owned()));
        }
    }

    let candidates = by_name()
        .await
        .map_err(ReconcilerError::cloud(format!("list {kind}s")))?;

    Ok(find_owned(candidates, display_name, resource_identifier)
        .map(Lookup::Owned)
        .unwrap_or(Lookup::Missing))
}

/// Runs a delete call, a resource that is already gone counts as deleted.
pub async fn delete_ignoring_missing(
    kind: &'static str,
    call: impl Future<Output = CloudResult<()>>,
) -> Result<(), ReconcilerError> {
    optional(call.await)
        .map(|_| ())
        .map_err(ReconcilerError::cloud(format!("delete {kind}")))
}
