use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KubeConfigError {
    #[error("Couldn't parse the kubeconfig! Reason: {}", .0)]
    Parse(#[source] serde_yaml::Error),
    #[error("Couldn't serialize the kubeconfig! Reason: {}", .0)]
    Serialize(#[source] serde_yaml::Error),
    #[error("Kubeconfig doesn't contain any cluster!")]
    MissingCluster,
    #[error("Kubeconfig doesn't contain user '{}'!", .0)]
    MissingUser(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
    #[serde(default)]
    pub current_context: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterInfo,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterInfo {
    pub server: String,
    pub certificate_authority_data: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextInfo,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ContextInfo {
    pub cluster: String,
    pub user: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: UserInfo,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct UserInfo {
    pub token: Option<String>,
}

fn default_api_version() -> String {
    "v1".to_owned()
}

fn default_kind() -> String {
    "Config".to_owned()
}

impl KubeConfig {
    /// Single context config for `user_name` authenticating with a bearer token.
    ///
    /// Server and CA are taken from the current context of `self`, the context and cluster
    /// names are kept.
    pub fn to_token_config(&self, user_name: &str, token: String) -> Result<Self, KubeConfigError> {
        let cluster = self.current_cluster()?.clone();
        let cluster_name = self
            .current_context()
            .map(|context| context.context.cluster.clone())
            .or_else(|| self.clusters.first().map(|named| named.name.clone()))
            .ok_or(KubeConfigError::MissingCluster)?;
        let context_name = if self.current_context.is_empty() {
            format!("{user_name}@{cluster_name}")
        } else {
            self.current_context.clone()
        };

        Ok(Self {
            api_version: default_api_version(),
            kind: default_kind(),
            clusters: vec![NamedCluster {
                name: cluster_name.clone(),
                cluster,
            }],
            contexts: vec![NamedContext {
                name: context_name.clone(),
                context: ContextInfo {
                    cluster: cluster_name,
                    user: user_name.to_owned(),
                },
            }],
            users: vec![NamedUser {
                name: user_name.to_owned(),
                user: UserInfo { token: Some(token) },
            }],
            current_context: context_name,
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, KubeConfigError> {
        serde_yaml::from_str(yaml).map_err(KubeConfigError::Parse)
    }

    pub fn to_yaml(&self) -> Result<String, KubeConfigError> {
        serde_yaml::to_string(self).map_err(KubeConfigError::Serialize)
    }

    fn current_context(&self) -> Option<&NamedContext> {
        self.contexts
            .iter()
            .find(|context| context.name == self.current_context)
    }

    /// Cluster of the current context, or the first one when the context doesn't resolve.
    pub fn current_cluster(&self) -> Result<&ClusterInfo, KubeConfigError> {
        let current = self.current_context().and_then(|context| {
            self.clusters
                .iter()
                .find(|cluster| cluster.name == context.context.cluster)
        });

        current
            .or_else(|| self.clusters.first())
            .map(|named| &named.cluster)
            .ok_or(KubeConfigError::MissingCluster)
    }

    /// Replaces the token of `user_name`, nothing else in the document changes.
    pub fn set_user_token(&mut self, user_name: &str, token: String) -> Result<(), KubeConfigError> {
        let user = self
            .users
            .iter_mut()
            .find(|user| user.name == user_name)
            .ok_or_else(|| KubeConfigError::MissingUser(user_name.to_owned()))?;

        user.user.token = Some(token);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OKE_KUBECONFIG: &str = r#"
apiVersion: v1
kind: ""
clusters:
- name: cluster-c4daylfgvrg
  cluster:
    server: https://10.0.0.10:6443
    certificate-authority-data: Y2EtZGF0YQ==
contexts:
- name: context-c4daylfgvrg
  context:
    cluster: cluster-c4daylfgvrg
    user: user-c4daylfgvrg
current-context: context-c4daylfgvrg
users:
- name: user-c4daylfgvrg
  user:
    exec:
      apiVersion: client.authentication.k8s.io/v1beta1
      command: oci
"#;

    #[test]
    fn cluster_info_is_read_from_the_current_context() {
        let config = KubeConfig::from_yaml(OKE_KUBECONFIG).unwrap();
        let cluster = config.current_cluster().unwrap();

        assert_eq!(cluster.server, "https://10.0.0.10:6443");
        assert_eq!(cluster.certificate_authority_data.as_deref(), Some("Y2EtZGF0YQ=="));
    }

    #[test]
    fn token_config_keeps_the_current_context() {
        let source = KubeConfig::from_yaml(OKE_KUBECONFIG).unwrap();
        let config = source
            .to_token_config("test-capi-admin", "token".to_owned())
            .unwrap();

        let yaml = config.to_yaml().unwrap();
        let parsed = KubeConfig::from_yaml(&yaml).unwrap();

        assert!(yaml.contains("current-context: context-c4daylfgvrg"));
        assert!(yaml.contains("certificate-authority-data"));
        assert_eq!(parsed, config);
        assert_eq!(parsed.contexts[0].context.cluster, "cluster-c4daylfgvrg");
        assert_eq!(parsed.contexts[0].context.user, "test-capi-admin");
        assert_eq!(parsed.users[0].user.token.as_deref(), Some("token"));
    }

    #[test]
    fn only_the_token_is_replaced() {
        let original = KubeConfig::from_yaml(OKE_KUBECONFIG)
            .unwrap()
            .to_token_config("test-capi-admin", "old".to_owned())
            .unwrap();
        let mut updated = original.clone();

        updated.set_user_token("test-capi-admin", "new".to_owned()).unwrap();

        assert_eq!(updated.users[0].user.token.as_deref(), Some("new"));
        assert_eq!(updated.clusters, original.clusters);
        assert_eq!(updated.contexts, original.contexts);
        assert!(matches!(
            updated.set_user_token("someone-else", "new".to_owned()),
            Err(KubeConfigError::MissingUser(_))
        ));
    }

    #[test]
    fn config_without_clusters_is_rejected() {
        let config = KubeConfig::from_yaml("apiVersion: v1\nkind: Config\n").unwrap();

        assert!(matches!(
            config.current_cluster(),
            Err(KubeConfigError::MissingCluster)
        ));
    }
}
