pub mod cloud;
pub mod conditions;
pub mod defaults;
pub mod helpers;
pub mod kubeconfig;
pub mod kubernetes;
pub mod lifecycle;
pub mod resources;
pub mod tags;

pub const RESOURCE_GROUP: &str = "infrastructure.cluster.x-k8s.io";
pub const CLUSTER_API_GROUP: &str = "cluster.x-k8s.io";

/// port the API server listens on unless the owner cluster overrides it
pub const DEFAULT_API_SERVER_PORT: i32 = 6443;
