//! Contracts of the cloud services the reconcilers talk to.
//!
//! Every service is an object safe async trait, concrete SDK bindings live outside of this
//! workspace and are handed over through a client factory. Models only carry the fields the
//! reconcilers read or write.

use std::borrow::Cow;

use log::warn;
use thiserror::Error;

use crate::tags::{is_created_by_cluster_api, FreeformTags};

macro_rules! impl_tagged {
    ($($model:ty),+ $(,)?) => {
        $(
            impl $crate::cloud::Tagged for $model {
                fn id(&self) -> &str {
                    &self.id
                }

                fn display_name(&self) -> &str {
                    &self.display_name
                }

                fn freeform_tags(&self) -> &$crate::tags::FreeformTags {
                    &self.freeform_tags
                }
            }
        )+
    };
}

pub mod compute;
pub mod container_engine;
pub mod identity;
pub mod load_balancer;
pub mod network;
pub mod token;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CloudError {
    #[error("{} '{}' doesn't exist!", .kind, .id)]
    NotFound { kind: Cow<'static, str>, id: String },
    #[error("Service returned {} ({}): {}", .status, .code, .message)]
    Service {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Couldn't sign the request! Reason: {}", .0)]
    Signing(String),
    #[error("Couldn't reach the service! Reason: {}", .0)]
    Transport(String),
}

impl CloudError {
    pub fn not_found(kind: impl Into<Cow<'static, str>>, id: impl Into<String>) -> Self {
        CloudError::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            CloudError::NotFound { .. } => true,
            CloudError::Service { status, .. } => *status == 404,
            _ => false,
        }
    }
}

pub type CloudResult<T> = Result<T, CloudError>;

/// cloud resources that can be adopted by their display name and provenance tags
pub trait Tagged {
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn freeform_tags(&self) -> &FreeformTags;
}

/// Picks the resource named `display_name` that carries the cluster's provenance tags.
///
/// Same named resources without the tags are skipped and reported, they were created by
/// someone else and must never be reused.
pub fn find_owned<T: Tagged>(
    candidates: Vec<T>,
    display_name: &str,
    resource_identifier: &str,
) -> Option<T> {
    candidates
        .into_iter()
        .filter(|candidate| candidate.display_name() == display_name)
        .find(|candidate| {
            let owned = is_created_by_cluster_api(resource_identifier, candidate.freeform_tags());
            if !owned {
                warn!(
                    "Ignoring '{}' ({}), it isn't tagged as a resource of this cluster!",
                    candidate.display_name(),
                    candidate.id()
                );
            }

            owned
        })
}

/// Converts a not found error into `None`, other errors are kept.
pub fn optional<T>(result: CloudResult<T>) -> CloudResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_not_found() => Ok(None),
        Err(error) => Err(error),
    }
}
