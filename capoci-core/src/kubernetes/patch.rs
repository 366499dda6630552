//! Field level patching of reconciled resources.
//!
//! Reconcilers mutate their resource in memory, the helper turns the difference from the last
//! persisted snapshot into JSON merge patches (RFC 7386). Object fields and status are patched
//! separately since the status lives behind its own subresource.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// metadata fields owned by the reconcilers, everything else is left to the API server
const PATCHED_METADATA_FIELDS: [&str; 4] =
    ["labels", "annotations", "finalizers", "ownerReferences"];

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Couldn't serialize the resource! Reason: {}", .0)]
    Serialization(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingPatch {
    /// merge patch of metadata and spec
    pub object: Option<Value>,
    /// merge patch of the status subresource
    pub status: Option<Value>,
}

impl PendingPatch {
    pub fn is_empty(&self) -> bool {
        self.object.is_none() && self.status.is_none()
    }
}

pub struct PatchHelper<K> {
    object: Value,
    status: Value,
    _resource: PhantomData<fn(&K)>,
}

/// Empty baseline, every field of the first resource passed to `changes` counts as changed.
impl<K> Default for PatchHelper<K> {
    fn default() -> Self {
        Self {
            object: Value::Object(Map::new()),
            status: Value::Object(Map::new()),
            _resource: PhantomData,
        }
    }
}

impl<K: Serialize> PatchHelper<K> {
    pub fn new(resource: &K) -> Result<Self, PatchError> {
        let (object, status) = snapshot(resource)?;

        Ok(Self {
            object,
            status,
            _resource: PhantomData,
        })
    }

    pub fn changes(&self, resource: &K) -> Result<PendingPatch, PatchError> {
        let (object, status) = snapshot(resource)?;

        Ok(PendingPatch {
            object: merge_patch_diff(&self.object, &object),
            status: merge_patch_diff(&self.status, &status),
        })
    }

    /// Takes `resource` as the new baseline once its changes were written.
    pub fn mark_persisted(&mut self, resource: &K) -> Result<(), PatchError> {
        let (object, status) = snapshot(resource)?;
        self.object = object;
        self.status = status;

        Ok(())
    }
}

fn snapshot<K: Serialize>(resource: &K) -> Result<(Value, Value), PatchError> {
    let mut value = serde_json::to_value(resource).map_err(PatchError::Serialization)?;

    let mut metadata = Map::new();
    if let Some(source) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in PATCHED_METADATA_FIELDS {
            if let Some(field_value) = source.remove(field) {
                metadata.insert(field.to_owned(), field_value);
            }
        }
    }

    let mut object = Map::new();
    object.insert("metadata".to_owned(), Value::Object(metadata));
    if let Some(spec) = value.get_mut("spec").map(Value::take) {
        object.insert("spec".to_owned(), spec);
    }

    let mut status = Map::new();
    if let Some(status_value) = value.get_mut("status").map(Value::take) {
        status.insert("status".to_owned(), status_value);
    }

    Ok((Value::Object(object), Value::Object(status)))
}

/// Merge patch turning `original` into `modified`, `None` when they are equal.
///
/// Removed object members are patched to `null`, arrays and scalars are replaced as a whole.
pub fn merge_patch_diff(original: &Value, modified: &Value) -> Option<Value> {
    match (original, modified) {
        (Value::Object(original), Value::Object(modified)) => {
            let mut patch = Map::new();

            for (key, modified_value) in modified {
                match original.get(key) {
                    Some(original_value) => {
                        if let Some(diff) = merge_patch_diff(original_value, modified_value) {
                            patch.insert(key.clone(), diff);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), modified_value.clone());
                    }
                }
            }

            for key in original.keys() {
                if !modified.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }

            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        (original, modified) if original == modified => None,
        (_, modified) => Some(modified.clone()),
    }
}
