use std::collections::BTreeMap;

pub type FreeformTags = BTreeMap<String, String>;
pub type DefinedTags = BTreeMap<String, BTreeMap<String, String>>;

pub const CREATED_BY: &str = "CreatedBy";
pub const OCI_CLUSTER_API_PROVIDER: &str = "OCIClusterAPIProvider";
pub const CLUSTER_RESOURCE_IDENTIFIER: &str = "ClusterResourceIdentifier";

/// provenance tags stamped on every cloud resource created for a cluster
pub fn build_cluster_tags(resource_identifier: &str) -> FreeformTags {
    BTreeMap::from([
        (CREATED_BY.to_owned(), OCI_CLUSTER_API_PROVIDER.to_owned()),
        (
            CLUSTER_RESOURCE_IDENTIFIER.to_owned(),
            resource_identifier.to_owned(),
        ),
    ])
}

/// Checks whether a cloud resource carries the complete provenance tag set of the cluster.
///
/// Every system key has to be present with the exact system value, extra user tags are
/// ignored. An empty resource identifier never matches.
pub fn is_created_by_cluster_api(resource_identifier: &str, tags: &FreeformTags) -> bool {
    if resource_identifier.is_empty() {
        return false;
    }

    build_cluster_tags(resource_identifier)
        .iter()
        .all(|(key, value)| tags.get(key) == Some(value))
}

/// user tags merged with provenance tags, the latter win on conflicting keys
pub fn merge_with_cluster_tags(
    base: Option<&FreeformTags>,
    resource_identifier: &str,
) -> FreeformTags {
    let mut tags = base.cloned().unwrap_or_default();
    tags.extend(build_cluster_tags(resource_identifier));

    tags
}

pub fn copy_defined_tags(tags: Option<&DefinedTags>) -> DefinedTags {
    tags.cloned().unwrap_or_default()
}
