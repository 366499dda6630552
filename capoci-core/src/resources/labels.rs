use std::collections::BTreeMap;

pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// marks infrastructure that is managed outside of this provider
pub const MANAGED_BY_ANNOTATION: &str = "cluster.x-k8s.io/managed-by";
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";

pub fn get_cluster_labels(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(CLUSTER_NAME_LABEL.to_owned(), cluster_name.to_owned())])
}

pub fn has_annotation(annotations: Option<&BTreeMap<String, String>>, key: &str) -> bool {
    annotations.map(|a| a.contains_key(key)).unwrap_or(false)
}
